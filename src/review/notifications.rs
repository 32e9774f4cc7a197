//! Reminder planning for freshly rescheduled items and overdue alerts.
//!
//! Reminders whose send time has already passed are dropped, never backfilled.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::config::SchedulingConfig;

use super::events::{NotificationKind, NotificationPriority, ReviewNotificationPayload};
use super::state::ReviewState;
use super::types::DifficultyLevel;

/// The schedule a notification is about.
#[derive(Debug, Clone, Copy)]
pub struct NotificationTarget<'a> {
    pub schedule_id: Uuid,
    pub student_id: &'a str,
    pub problem_id: &'a str,
    pub state: &'a ReviewState,
    pub consecutive_failures: u32,
}

impl NotificationTarget<'_> {
    fn difficulty(&self, config: &SchedulingConfig) -> DifficultyLevel {
        DifficultyLevel::from_ease(self.state.ease_factor(), &config.difficulty)
    }

    fn payload(
        &self,
        kind: NotificationKind,
        priority: NotificationPriority,
        send_at: DateTime<Utc>,
        overdue_hours: Option<f64>,
        now: DateTime<Utc>,
        config: &SchedulingConfig,
    ) -> ReviewNotificationPayload {
        ReviewNotificationPayload {
            schedule_id: self.schedule_id,
            student_id: self.student_id.to_string(),
            problem_id: self.problem_id.to_string(),
            kind,
            priority,
            send_at,
            next_review_at: self.state.next_review_at(),
            overdue_hours,
            difficulty_level: self.difficulty(config),
            ease_factor: self.state.ease_factor(),
            consecutive_failures: self.consecutive_failures,
            created_at: now,
        }
    }
}

/// An item needs the extra early reminder when the learner keeps failing it,
/// its ease factor has collapsed, or it sits in the advanced tier.
pub fn is_difficult(target: &NotificationTarget<'_>, config: &SchedulingConfig) -> bool {
    let reminder = &config.reminder;
    target.consecutive_failures >= reminder.extra_failure_threshold
        || target.state.ease_factor().value() <= reminder.extra_ease_threshold
        || target.difficulty(config) == DifficultyLevel::Advanced
}

pub fn plan_review_reminders(
    target: &NotificationTarget<'_>,
    now: DateTime<Utc>,
    config: &SchedulingConfig,
) -> Vec<ReviewNotificationPayload> {
    let mut planned = Vec::with_capacity(2);
    let due = target.state.next_review_at();

    if let Some(send_at) = lead_time(due, config.reminder.default_minutes).filter(|at| *at > now) {
        planned.push(target.payload(
            NotificationKind::UpcomingReview,
            NotificationPriority::Normal,
            send_at,
            None,
            now,
            config,
        ));
    }

    if is_difficult(target, config) {
        if let Some(send_at) = lead_time(due, config.reminder.early_minutes).filter(|at| *at > now) {
            planned.push(target.payload(
                NotificationKind::EarlyReminder,
                NotificationPriority::High,
                send_at,
                None,
                now,
                config,
            ));
        }
    }

    planned
}

/// Immediate alert for an overdue item; `None` while it is not overdue.
pub fn overdue_alert(
    target: &NotificationTarget<'_>,
    now: DateTime<Utc>,
    config: &SchedulingConfig,
) -> Option<ReviewNotificationPayload> {
    if !target.state.is_overdue(now, config.reminder.overdue_grace()) {
        return None;
    }
    Some(target.payload(
        NotificationKind::Overdue,
        NotificationPriority::Urgent,
        now,
        Some(target.state.overdue_hours(now)),
        now,
        config,
    ))
}

fn lead_time(due: DateTime<Utc>, minutes_before: i64) -> Option<DateTime<Utc>> {
    Duration::try_minutes(minutes_before).and_then(|lead| due.checked_sub_signed(lead))
}
