pub mod error;
pub mod events;
pub mod notifications;
pub mod policy;
pub mod record;
pub mod schedule;
pub mod state;
pub mod types;

pub use error::{ComputeError, ScheduleError};
pub use events::{
    NotificationKind, NotificationPriority, ReviewCompletedPayload, ReviewEvent,
    ReviewNotificationPayload, ReviewScheduledPayload,
};
pub use notifications::{is_difficult, overdue_alert, plan_review_reminders, NotificationTarget};
pub use policy::{IntervalUpdate, Sm2Policy, SpacedRepetitionPolicy};
pub use record::{StudyPattern, StudyPatternKind, StudyRecord};
pub use schedule::{ReviewAttempt, ReviewOutcome, ReviewSchedule};
pub use state::ReviewState;
pub use types::{DifficultyLevel, EaseFactor, ReviewFeedback, ReviewInterval};
