//! # danci-review - spaced-repetition review scheduling
//!
//! Decides when a learner should next see an item, based on how they rated
//! their last attempt:
//!
//! - **SM-2 policy** - ease factor and interval updates per rating
//! - **Failure recovery** - consecutive-failure tracking with interval reset
//! - **Late reviews** - proportional penalty for answering long after due
//! - **Reminders** - routine, early and overdue notification events
//!
//! ## Modules
//!
//! - [`review`] - value types, the `ReviewSchedule` aggregate, policy, events
//! - [`core`](crate::core) - clock abstraction and the in-process event bus
//! - [`services`] - repositories and the `ReviewService` application layer
//! - [`workers`] - the periodic overdue scanner
//! - [`config`] - tunable scheduling constants
//! - [`logging`] - tracing subscriber setup for embedding hosts
//!
//! ## Example
//!
//! ```rust
//! use danci_review::{ManualClock, ReviewAttempt, ReviewFeedback, ReviewSchedule, Sm2Policy};
//! use chrono::{Duration, Utc};
//!
//! let clock = ManualClock::new(Utc::now());
//! let policy = Sm2Policy::default();
//! let mut schedule = ReviewSchedule::create("student-1", "problem-42", &policy, &clock).unwrap();
//!
//! clock.advance(Duration::days(1));
//! let outcome = schedule
//!     .process_review_feedback(ReviewAttempt::new(ReviewFeedback::Good), &policy, &clock)
//!     .unwrap();
//! assert_eq!(outcome.new_state.interval().days(), 3);
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod config;
pub mod core;
pub mod logging;
pub mod review;
pub mod services;
pub mod workers;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::{ConfigError, SchedulingConfig};
pub use crate::core::{Clock, EventBus, EventEnvelope, EventSink, ManualClock, SinkError, SystemClock};
pub use review::{
    DifficultyLevel, EaseFactor, NotificationKind, NotificationPriority, ReviewAttempt, ReviewEvent,
    ReviewFeedback, ReviewInterval, ReviewOutcome, ReviewSchedule, ReviewState, ScheduleError,
    Sm2Policy, SpacedRepetitionPolicy, StudyRecord,
};
pub use services::{
    InMemoryScheduleRepository, InMemoryStudyRecordRepository, RepositoryError, ReviewService,
    ServiceError,
};
pub use workers::{OverdueScanConfig, OverdueScanner, ScanStats};
