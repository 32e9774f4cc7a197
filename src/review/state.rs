use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::error::ComputeError;
use super::types::{EaseFactor, ReviewInterval};

const SECONDS_PER_DAY: f64 = 86_400.0;
const MIN_RETENTION: f64 = 0.1;

/// Scheduling snapshot of one learning item.
///
/// Immutable: every review produces a new value via [`ReviewState::with_new_review`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewState {
    interval: ReviewInterval,
    ease_factor: EaseFactor,
    review_count: u32,
    last_reviewed_at: Option<DateTime<Utc>>,
    next_review_at: DateTime<Utc>,
}

impl ReviewState {
    /// State of an item that has never been reviewed, due one interval after `base`.
    pub fn initial(
        interval: ReviewInterval,
        ease_factor: EaseFactor,
        base: DateTime<Utc>,
    ) -> Result<Self, ComputeError> {
        Ok(Self {
            interval,
            ease_factor,
            review_count: 0,
            last_reviewed_at: None,
            next_review_at: add(base, interval.as_duration(), "initial interval")?,
        })
    }

    /// Rebuilds a persisted state without re-checking it.
    pub fn restore(
        interval: ReviewInterval,
        ease_factor: EaseFactor,
        review_count: u32,
        last_reviewed_at: Option<DateTime<Utc>>,
        next_review_at: DateTime<Utc>,
    ) -> Self {
        Self {
            interval,
            ease_factor,
            review_count,
            last_reviewed_at,
            next_review_at,
        }
    }

    pub fn interval(&self) -> ReviewInterval {
        self.interval
    }

    pub fn ease_factor(&self) -> EaseFactor {
        self.ease_factor
    }

    pub fn review_count(&self) -> u32 {
        self.review_count
    }

    pub fn last_reviewed_at(&self) -> Option<DateTime<Utc>> {
        self.last_reviewed_at
    }

    pub fn next_review_at(&self) -> DateTime<Utc> {
        self.next_review_at
    }

    pub fn with_new_review(
        &self,
        interval: ReviewInterval,
        ease_factor: EaseFactor,
        reviewed_at: DateTime<Utc>,
    ) -> Result<Self, ComputeError> {
        self.with_review_due_after(interval, ease_factor, reviewed_at, interval.as_duration())
    }

    /// Like [`ReviewState::with_new_review`] but due after `delay` rather than
    /// after the interval; used for short relearning steps.
    pub fn with_relearning_step(
        &self,
        interval: ReviewInterval,
        ease_factor: EaseFactor,
        reviewed_at: DateTime<Utc>,
        delay: Duration,
    ) -> Result<Self, ComputeError> {
        self.with_review_due_after(interval, ease_factor, reviewed_at, delay)
    }

    fn with_review_due_after(
        &self,
        interval: ReviewInterval,
        ease_factor: EaseFactor,
        reviewed_at: DateTime<Utc>,
        delay: Duration,
    ) -> Result<Self, ComputeError> {
        Ok(Self {
            interval,
            ease_factor,
            review_count: self.review_count.saturating_add(1),
            last_reviewed_at: Some(reviewed_at),
            next_review_at: add(reviewed_at, delay, "review interval")?,
        })
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.next_review_at
    }

    pub fn is_overdue(&self, now: DateTime<Utc>, grace: Duration) -> bool {
        match self.next_review_at.checked_add_signed(grace) {
            Some(threshold) => self.is_due(now) && now >= threshold,
            None => false,
        }
    }

    pub fn minutes_until_due(&self, now: DateTime<Utc>) -> i64 {
        (self.next_review_at - now).num_minutes().max(0)
    }

    pub fn overdue_hours(&self, now: DateTime<Utc>) -> f64 {
        let late = now - self.next_review_at;
        (late.num_seconds() as f64 / 3_600.0).max(0.0)
    }

    /// Days since the last review, or since the item was first scheduled
    /// when it has never been reviewed.
    pub fn days_since_last_review(&self, now: DateTime<Utc>) -> f64 {
        let anchor = self.last_reviewed_at.unwrap_or_else(|| {
            self.next_review_at
                .checked_sub_signed(self.interval.as_duration())
                .unwrap_or(self.next_review_at)
        });
        (now - anchor).num_seconds() as f64 / SECONDS_PER_DAY
    }

    /// Forgetting-curve estimate `exp(-t / interval)`, floored at 0.1.
    pub fn retention_probability(&self, now: DateTime<Utc>) -> f64 {
        let elapsed_days = self.days_since_last_review(now);
        if elapsed_days <= 0.0 {
            return 1.0;
        }
        let interval_days = f64::from(self.interval.days().max(1));
        (-elapsed_days / interval_days).exp().clamp(MIN_RETENTION, 1.0)
    }
}

fn add(at: DateTime<Utc>, by: Duration, what: &'static str) -> Result<DateTime<Utc>, ComputeError> {
    at.checked_add_signed(by)
        .ok_or(ComputeError::TimestampOverflow { what })
}
