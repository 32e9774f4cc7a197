use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::{Clock, EventSink, SinkError};
use crate::review::{
    ReviewAttempt, ReviewEvent, ReviewInterval, ReviewOutcome, ReviewSchedule, ScheduleError,
    SpacedRepetitionPolicy, StudyRecord,
};

use super::repository::{RepositoryError, ScheduleRepository, StudyRecordRepository};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    /// The state change is saved; `events` are the ones the sink refused and
    /// can be handed to [`ReviewService::redeliver`].
    #[error("{} review events undelivered: {source}", .events.len())]
    Undelivered {
        #[source]
        source: SinkError,
        events: Vec<ReviewEvent>,
    },
    #[error("feedback on schedule {schedule_id} produced no completion event")]
    MissingCompletion { schedule_id: Uuid },
}

impl ServiceError {
    /// Events still owed to the sink, if this error carries any.
    pub fn into_undelivered(self) -> Option<Vec<ReviewEvent>> {
        match self {
            Self::Undelivered { events, .. } => Some(events),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackReceipt {
    pub outcome: ReviewOutcome,
    pub record: StudyRecord,
}

/// Application layer wiring the aggregate to storage and event delivery.
///
/// Events leave an aggregate only after it has been saved.
pub struct ReviewService {
    schedules: Arc<dyn ScheduleRepository>,
    records: Arc<dyn StudyRecordRepository>,
    sink: Arc<dyn EventSink>,
    policy: Arc<dyn SpacedRepetitionPolicy>,
    clock: Arc<dyn Clock>,
}

impl ReviewService {
    pub fn new(
        schedules: Arc<dyn ScheduleRepository>,
        records: Arc<dyn StudyRecordRepository>,
        sink: Arc<dyn EventSink>,
        policy: Arc<dyn SpacedRepetitionPolicy>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            schedules,
            records,
            sink,
            policy,
            clock,
        }
    }

    pub fn policy(&self) -> &dyn SpacedRepetitionPolicy {
        &*self.policy
    }

    /// Returns the pair's schedule, creating and announcing it on first use.
    pub fn schedule_item(&self, student_id: &str, problem_id: &str) -> Result<ReviewSchedule, ServiceError> {
        if let Some(existing) = self.schedules.find_by_student_and_problem(student_id, problem_id)? {
            debug!(schedule_id = %existing.id(), "Schedule already exists");
            return Ok(existing);
        }

        let mut schedule = ReviewSchedule::create(student_id, problem_id, &*self.policy, &*self.clock)?;
        self.schedules.save(&schedule)?;

        let events = schedule.drain_events();
        info!(
            schedule_id = %schedule.id(),
            student_id = student_id,
            problem_id = problem_id,
            next_review_at = %schedule.review_state().next_review_at(),
            "Review schedule created"
        );
        self.dispatch(schedule.id(), events)?;

        Ok(schedule)
    }

    pub fn submit_feedback(&self, schedule_id: Uuid, attempt: ReviewAttempt) -> Result<FeedbackReceipt, ServiceError> {
        let mut schedule = self.load(schedule_id)?;
        let feedback = attempt.feedback;

        let outcome = match schedule.process_review_feedback(attempt, &*self.policy, &*self.clock) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(schedule_id = %schedule_id, error = %err, "Review feedback rejected");
                return Err(err.into());
            }
        };

        // Nothing is stored until the record can be built from the completion event.
        let events = schedule.drain_events();
        let record = match events.first() {
            Some(ReviewEvent::ReviewCompleted(payload)) => StudyRecord::from_review_completed(payload, Uuid::new_v4()),
            _ => return Err(ServiceError::MissingCompletion { schedule_id }),
        };

        self.schedules.save(&schedule)?;
        let recorded = self.records.save(&record);
        if let Err(ref err) = recorded {
            warn!(schedule_id = %schedule_id, error = %err, "Study record not saved");
        }

        info!(
            schedule_id = %schedule_id,
            feedback = %feedback,
            interval_days = outcome.new_state.interval().days(),
            ease_factor = %outcome.new_state.ease_factor(),
            consecutive_failures = outcome.consecutive_failures,
            interval_reset = outcome.interval_reset,
            reminders = outcome.reminders_scheduled,
            "Review feedback processed"
        );

        self.dispatch(schedule_id, events)?;
        recorded?;

        Ok(FeedbackReceipt { outcome, record })
    }

    /// Retries events returned in [`ServiceError::Undelivered`].
    pub fn redeliver(&self, events: Vec<ReviewEvent>) -> Result<(), ServiceError> {
        match events.first().map(ReviewEvent::schedule_id) {
            Some(schedule_id) => self.dispatch(schedule_id, events),
            None => Ok(()),
        }
    }

    /// Due schedules of a student, earliest due first.
    pub fn due_reviews(&self, student_id: &str) -> Result<Vec<ReviewSchedule>, ServiceError> {
        let clock = &*self.clock;
        let mut due: Vec<_> = self
            .schedules
            .find_by_student_id(student_id)?
            .into_iter()
            .filter(|schedule| schedule.is_due(clock))
            .collect();
        due.sort_by_key(|schedule| schedule.review_state().next_review_at());
        Ok(due)
    }

    /// Intervals each rating would produce for the schedule's current state.
    pub fn preview_intervals(&self, schedule_id: Uuid) -> Result<[ReviewInterval; 4], ServiceError> {
        let schedule = self.load(schedule_id)?;
        Ok(self.policy.preview_intervals(schedule.review_state()))
    }

    fn load(&self, schedule_id: Uuid) -> Result<ReviewSchedule, ServiceError> {
        self.schedules
            .find_by_id(schedule_id)?
            .ok_or_else(|| RepositoryError::NotFound(format!("schedule {schedule_id}")).into())
    }

    fn dispatch(&self, schedule_id: Uuid, events: Vec<ReviewEvent>) -> Result<(), ServiceError> {
        let count = events.len();
        // The sink consumes its input, so keep a copy to hand back on failure.
        if let Err(source) = self.sink.publish(events.clone()) {
            warn!(schedule_id = %schedule_id, count, error = %source, "Failed to dispatch review events");
            return Err(ServiceError::Undelivered { source, events });
        }
        debug!(schedule_id = %schedule_id, count, "Review events dispatched");
        Ok(())
    }
}
