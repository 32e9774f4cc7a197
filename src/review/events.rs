use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::{DifficultyLevel, EaseFactor, ReviewFeedback, ReviewInterval};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ReviewEvent {
    #[serde(rename = "REVIEW_COMPLETED")]
    ReviewCompleted(ReviewCompletedPayload),

    #[serde(rename = "REVIEW_SCHEDULED")]
    ReviewScheduled(ReviewScheduledPayload),

    #[serde(rename = "REVIEW_NOTIFICATION_SCHEDULED")]
    ReviewNotificationScheduled(ReviewNotificationPayload),
}

impl ReviewEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ReviewEvent::ReviewCompleted(_) => "REVIEW_COMPLETED",
            ReviewEvent::ReviewScheduled(_) => "REVIEW_SCHEDULED",
            ReviewEvent::ReviewNotificationScheduled(_) => "REVIEW_NOTIFICATION_SCHEDULED",
        }
    }

    pub fn schedule_id(&self) -> Uuid {
        match self {
            ReviewEvent::ReviewCompleted(p) => p.schedule_id,
            ReviewEvent::ReviewScheduled(p) => p.schedule_id,
            ReviewEvent::ReviewNotificationScheduled(p) => p.schedule_id,
        }
    }

    pub fn student_id(&self) -> &str {
        match self {
            ReviewEvent::ReviewCompleted(p) => &p.student_id,
            ReviewEvent::ReviewScheduled(p) => &p.student_id,
            ReviewEvent::ReviewNotificationScheduled(p) => &p.student_id,
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ReviewEvent::ReviewCompleted(p) => p.reviewed_at,
            ReviewEvent::ReviewScheduled(p) => p.scheduled_at,
            ReviewEvent::ReviewNotificationScheduled(p) => p.created_at,
        }
    }

    pub fn as_notification(&self) -> Option<&ReviewNotificationPayload> {
        match self {
            ReviewEvent::ReviewNotificationScheduled(p) => Some(p),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewCompletedPayload {
    pub schedule_id: Uuid,
    pub student_id: String,
    pub problem_id: String,
    pub feedback: ReviewFeedback,
    pub is_correct: bool,
    pub response_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_content: Option<serde_json::Value>,
    pub previous_interval: ReviewInterval,
    pub new_interval: ReviewInterval,
    pub previous_ease_factor: EaseFactor,
    pub new_ease_factor: EaseFactor,
    pub previous_review_count: u32,
    pub new_review_count: u32,
    pub previous_next_review_at: DateTime<Utc>,
    pub next_review_at: DateTime<Utc>,
    pub previous_consecutive_failures: u32,
    pub consecutive_failures: u32,
    pub interval_reset: bool,
    pub reviewed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewScheduledPayload {
    pub schedule_id: Uuid,
    pub student_id: String,
    pub problem_id: String,
    pub interval: ReviewInterval,
    pub ease_factor: EaseFactor,
    pub next_review_at: DateTime<Utc>,
    pub scheduled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    /// Routine reminder shortly before the due date.
    UpcomingReview,
    /// Earlier, louder reminder for items the learner keeps struggling with.
    EarlyReminder,
    /// Immediate alert for an item past its due date.
    Overdue,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UpcomingReview => "UPCOMING_REVIEW",
            Self::EarlyReminder => "EARLY_REMINDER",
            Self::Overdue => "OVERDUE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationPriority {
    Normal,
    High,
    Urgent,
}

impl NotificationPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::High => "HIGH",
            Self::Urgent => "URGENT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewNotificationPayload {
    pub schedule_id: Uuid,
    pub student_id: String,
    pub problem_id: String,
    pub kind: NotificationKind,
    pub priority: NotificationPriority,
    /// When the delivery layer should send it.
    pub send_at: DateTime<Utc>,
    pub next_review_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overdue_hours: Option<f64>,
    pub difficulty_level: DifficultyLevel,
    pub ease_factor: EaseFactor,
    pub consecutive_failures: u32,
    pub created_at: DateTime<Utc>,
}
