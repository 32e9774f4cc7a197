use chrono::{DateTime, Utc};

use crate::config::ConfigError;

/// Failures raised while computing a transition, before anything is committed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComputeError {
    #[error("timestamp out of range while adding {what}")]
    TimestampOverflow { what: &'static str },
}

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("invalid argument {name}: {reason}")]
    InvalidArgument { name: &'static str, reason: String },
    #[error("invalid scheduling policy: {0}")]
    InvalidPolicy(#[from] ConfigError),
    #[error("review at {reviewed_at} precedes last review at {last_reviewed_at}")]
    ReviewBeforeLastReview {
        reviewed_at: DateTime<Utc>,
        last_reviewed_at: DateTime<Utc>,
    },
    #[error("unknown review feedback: {0}")]
    InvalidFeedback(String),
    #[error("{operation} failed: {source}")]
    Processing {
        operation: &'static str,
        #[source]
        source: ComputeError,
    },
}

impl ScheduleError {
    pub(crate) fn invalid_argument(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }

    /// Precondition failures are raised before any computation starts.
    pub fn is_precondition(&self) -> bool {
        !matches!(self, Self::Processing { .. })
    }
}
