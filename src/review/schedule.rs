use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SchedulingConfig;
use crate::core::clock::Clock;

use super::error::{ComputeError, ScheduleError};
use super::events::{ReviewCompletedPayload, ReviewEvent, ReviewScheduledPayload};
use super::notifications::{overdue_alert, plan_review_reminders, NotificationTarget};
use super::policy::SpacedRepetitionPolicy;
use super::state::ReviewState;
use super::types::{DifficultyLevel, EaseFactor, ReviewFeedback};

const CREATE_OPERATION: &str = "create_review_schedule";
const PROCESS_OPERATION: &str = "process_review_feedback";
const MAX_RESPONSE_TIME_MS: u64 = 24 * 60 * 60 * 1000;

/// One learner's answer to a scheduled item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewAttempt {
    pub feedback: ReviewFeedback,
    pub is_correct: bool,
    pub response_time_ms: Option<u64>,
    pub answer_content: Option<serde_json::Value>,
}

impl ReviewAttempt {
    pub fn new(feedback: ReviewFeedback) -> Self {
        Self {
            feedback,
            is_correct: feedback.is_correct(),
            response_time_ms: None,
            answer_content: None,
        }
    }

    /// Attempt for a checked answer; the rating is derived from correctness and speed.
    pub fn from_answer(is_correct: bool, response_time_ms: Option<u64>) -> Self {
        Self {
            feedback: ReviewFeedback::from_answer(is_correct, response_time_ms),
            is_correct,
            response_time_ms,
            answer_content: None,
        }
    }

    pub fn with_response_time(mut self, response_time_ms: u64) -> Self {
        self.response_time_ms = Some(response_time_ms);
        self
    }

    pub fn with_answer(mut self, answer_content: serde_json::Value) -> Self {
        self.answer_content = Some(answer_content);
        self
    }

    pub fn with_correctness(mut self, is_correct: bool) -> Self {
        self.is_correct = is_correct;
        self
    }
}

/// What a successful feedback submission changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewOutcome {
    pub previous_state: ReviewState,
    pub new_state: ReviewState,
    pub previous_failures: u32,
    pub consecutive_failures: u32,
    pub interval_reset: bool,
    pub reminders_scheduled: usize,
}

struct Transition {
    state: ReviewState,
    consecutive_failures: u32,
    interval_reset: bool,
    events: Vec<ReviewEvent>,
    reminders_scheduled: usize,
}

/// Scheduling aggregate for one (student, problem) pair.
///
/// Policy and clock are supplied per call and never stored, so the aggregate
/// stays plain data. Events accumulate in an internal buffer until the caller
/// drains them after persisting the schedule.
///
/// Not safe to process two submissions for the same pair concurrently; callers
/// serialize writes per pair (repositories reject stale versions).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSchedule {
    id: Uuid,
    student_id: String,
    problem_id: String,
    review_state: ReviewState,
    consecutive_failures: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: u64,
    #[serde(skip)]
    pending_events: Vec<ReviewEvent>,
}

impl ReviewSchedule {
    /// Schedules an item for the first time and records a `REVIEW_SCHEDULED` event.
    pub fn create<P, C>(
        student_id: impl Into<String>,
        problem_id: impl Into<String>,
        policy: &P,
        clock: &C,
    ) -> Result<Self, ScheduleError>
    where
        P: SpacedRepetitionPolicy + ?Sized,
        C: Clock + ?Sized,
    {
        let student_id = student_id.into();
        let problem_id = problem_id.into();
        if student_id.trim().is_empty() {
            return Err(ScheduleError::invalid_argument("student_id", "must not be blank"));
        }
        if problem_id.trim().is_empty() {
            return Err(ScheduleError::invalid_argument("problem_id", "must not be blank"));
        }
        policy.config().validate()?;

        let now = clock.now();
        let review_state = policy
            .create_initial_state(now)
            .map_err(|source| ScheduleError::Processing {
                operation: CREATE_OPERATION,
                source,
            })?;

        let id = Uuid::new_v4();
        let scheduled = ReviewEvent::ReviewScheduled(ReviewScheduledPayload {
            schedule_id: id,
            student_id: student_id.clone(),
            problem_id: problem_id.clone(),
            interval: review_state.interval(),
            ease_factor: review_state.ease_factor(),
            next_review_at: review_state.next_review_at(),
            scheduled_at: now,
        });

        Ok(Self {
            id,
            student_id,
            problem_id,
            review_state,
            consecutive_failures: 0,
            created_at: now,
            updated_at: now,
            version: 1,
            pending_events: vec![scheduled],
        })
    }

    /// Rebuilds a schedule from storage. Performs no validation and emits no
    /// events; only persistence adapters holding trusted data should call it.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: Uuid,
        student_id: String,
        problem_id: String,
        review_state: ReviewState,
        consecutive_failures: u32,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        version: u64,
    ) -> Self {
        Self {
            id,
            student_id,
            problem_id,
            review_state,
            consecutive_failures,
            created_at,
            updated_at,
            version,
            pending_events: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn student_id(&self) -> &str {
        &self.student_id
    }

    pub fn problem_id(&self) -> &str {
        &self.problem_id
    }

    pub fn review_state(&self) -> &ReviewState {
        &self.review_state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Bumped on every committed change; repositories use it to reject stale writes.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn pending_events(&self) -> &[ReviewEvent] {
        &self.pending_events
    }

    /// Hands buffered events to the caller and clears the buffer.
    pub fn drain_events(&mut self) -> Vec<ReviewEvent> {
        std::mem::take(&mut self.pending_events)
    }

    pub fn process_review_feedback<P, C>(
        &mut self,
        attempt: ReviewAttempt,
        policy: &P,
        clock: &C,
    ) -> Result<ReviewOutcome, ScheduleError>
    where
        P: SpacedRepetitionPolicy + ?Sized,
        C: Clock + ?Sized,
    {
        let now = clock.now();
        self.validate_submission(&attempt, policy, now)?;

        let previous_state = self.review_state.clone();
        let previous_failures = self.consecutive_failures;

        let transition = self
            .compute_transition(&attempt, policy, now)
            .map_err(|source| ScheduleError::Processing {
                operation: PROCESS_OPERATION,
                source,
            })?;

        // Nothing above touched `self`; a failure leaves the aggregate as it was.
        self.review_state = transition.state.clone();
        self.consecutive_failures = transition.consecutive_failures;
        self.updated_at = now;
        self.version += 1;
        self.pending_events.extend(transition.events);

        Ok(ReviewOutcome {
            previous_state,
            new_state: transition.state,
            previous_failures,
            consecutive_failures: transition.consecutive_failures,
            interval_reset: transition.interval_reset,
            reminders_scheduled: transition.reminders_scheduled,
        })
    }

    fn validate_submission<P>(
        &self,
        attempt: &ReviewAttempt,
        policy: &P,
        now: DateTime<Utc>,
    ) -> Result<(), ScheduleError>
    where
        P: SpacedRepetitionPolicy + ?Sized,
    {
        policy.config().validate()?;

        if let Some(last_reviewed_at) = self.review_state.last_reviewed_at() {
            if now < last_reviewed_at {
                return Err(ScheduleError::ReviewBeforeLastReview {
                    reviewed_at: now,
                    last_reviewed_at,
                });
            }
        }

        if matches!(attempt.response_time_ms, Some(ms) if ms > MAX_RESPONSE_TIME_MS) {
            return Err(ScheduleError::invalid_argument(
                "response_time_ms",
                "must not exceed 24 hours",
            ));
        }

        Ok(())
    }

    fn compute_transition<P>(
        &self,
        attempt: &ReviewAttempt,
        policy: &P,
        now: DateTime<Utc>,
    ) -> Result<Transition, ComputeError>
    where
        P: SpacedRepetitionPolicy + ?Sized,
    {
        let config = policy.config();
        let current = &self.review_state;
        let feedback = attempt.feedback;

        // Lateness is applied first so a late answer can never beat an on-time one.
        let late = policy.adjust_for_late_review(current, now);
        let adjusted = current.with_new_review(late.interval, late.ease_factor, now)?;
        let mut update = policy.calculate_next_interval(&adjusted, feedback);

        let consecutive_failures = if feedback.is_again() {
            self.consecutive_failures.saturating_add(1)
        } else {
            0
        };

        let interval_reset = policy.should_reset_interval(current, consecutive_failures);
        if interval_reset {
            if current.interval().days() > config.interval.min_days {
                update.interval = current.interval();
            }
            update.ease_factor = EaseFactor::minimum(&config.ease);
        }

        let state = match config.feedback.again_relearn_minutes {
            Some(minutes) if feedback.is_again() => {
                let delay = Duration::try_minutes(minutes).ok_or(ComputeError::TimestampOverflow {
                    what: "relearning step",
                })?;
                current.with_relearning_step(update.interval, update.ease_factor, now, delay)?
            }
            _ => current.with_new_review(update.interval, update.ease_factor, now)?,
        };

        let mut events = vec![ReviewEvent::ReviewCompleted(ReviewCompletedPayload {
            schedule_id: self.id,
            student_id: self.student_id.clone(),
            problem_id: self.problem_id.clone(),
            feedback,
            is_correct: attempt.is_correct,
            response_time_ms: attempt.response_time_ms,
            answer_content: attempt.answer_content.clone(),
            previous_interval: current.interval(),
            new_interval: state.interval(),
            previous_ease_factor: current.ease_factor(),
            new_ease_factor: state.ease_factor(),
            previous_review_count: current.review_count(),
            new_review_count: state.review_count(),
            previous_next_review_at: current.next_review_at(),
            next_review_at: state.next_review_at(),
            previous_consecutive_failures: self.consecutive_failures,
            consecutive_failures,
            interval_reset,
            reviewed_at: now,
        })];

        let target = NotificationTarget {
            schedule_id: self.id,
            student_id: &self.student_id,
            problem_id: &self.problem_id,
            state: &state,
            consecutive_failures,
        };
        let reminders = plan_review_reminders(&target, now, config);
        let reminders_scheduled = reminders.len();
        events.extend(reminders.into_iter().map(ReviewEvent::ReviewNotificationScheduled));

        Ok(Transition {
            state,
            consecutive_failures,
            interval_reset,
            events,
            reminders_scheduled,
        })
    }

    /// Emits an immediate overdue alert when the item is overdue and returns
    /// whether one was emitted. Scheduling state is left untouched.
    ///
    /// Repeated calls emit repeated alerts; deduplication belongs to the caller.
    pub fn trigger_overdue_notification<C>(&mut self, clock: &C, config: &SchedulingConfig) -> bool
    where
        C: Clock + ?Sized,
    {
        let now = clock.now();
        let target = NotificationTarget {
            schedule_id: self.id,
            student_id: &self.student_id,
            problem_id: &self.problem_id,
            state: &self.review_state,
            consecutive_failures: self.consecutive_failures,
        };
        match overdue_alert(&target, now, config) {
            Some(alert) => {
                self.pending_events
                    .push(ReviewEvent::ReviewNotificationScheduled(alert));
                true
            }
            None => false,
        }
    }

    pub fn is_due<C: Clock + ?Sized>(&self, clock: &C) -> bool {
        self.review_state.is_due(clock.now())
    }

    pub fn is_overdue<C: Clock + ?Sized>(&self, clock: &C, config: &SchedulingConfig) -> bool {
        self.review_state
            .is_overdue(clock.now(), config.reminder.overdue_grace())
    }

    pub fn minutes_until_due<C: Clock + ?Sized>(&self, clock: &C) -> i64 {
        self.review_state.minutes_until_due(clock.now())
    }

    pub fn overdue_hours<C: Clock + ?Sized>(&self, clock: &C) -> f64 {
        self.review_state.overdue_hours(clock.now())
    }

    pub fn difficulty_level(&self, config: &SchedulingConfig) -> DifficultyLevel {
        DifficultyLevel::from_ease(self.review_state.ease_factor(), &config.difficulty)
    }

    pub fn retention_probability<C: Clock + ?Sized>(&self, clock: &C) -> f64 {
        self.review_state.retention_probability(clock.now())
    }
}
