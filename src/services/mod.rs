mod repository;
mod review;

pub use repository::{
    InMemoryScheduleRepository, InMemoryStudyRecordRepository, RepositoryError, ScheduleRepository,
    StudyRecordRepository,
};
pub use review::{FeedbackReceipt, ReviewService, ServiceError};
