//! SM-2 family scheduling policy.
//!
//! Rating effects (defaults in parentheses):
//! - AGAIN: interval falls to the minimum, ease factor drops (-0.8)
//! - HARD: interval shrinks (x0.8), ease factor drops (-0.15)
//! - GOOD: interval grows by the ease factor, ease factor unchanged
//! - EASY: GOOD growth times a bonus (x1.3), ease factor rises (+0.15)
//!
//! GOOD always grows the interval by at least one day and EASY always lands
//! at least one day past GOOD, before saturating at the configured maximum.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SchedulingConfig;

use super::error::ComputeError;
use super::state::ReviewState;
use super::types::{EaseFactor, ReviewFeedback, ReviewInterval};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Interval and ease factor proposed for the next state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntervalUpdate {
    pub interval: ReviewInterval,
    pub ease_factor: EaseFactor,
}

impl IntervalUpdate {
    pub fn of(state: &ReviewState) -> Self {
        Self {
            interval: state.interval(),
            ease_factor: state.ease_factor(),
        }
    }
}

/// Scheduling algorithm, passed to the aggregate per call so variants can be
/// swapped without touching persisted schedules.
pub trait SpacedRepetitionPolicy: Send + Sync {
    fn config(&self) -> &SchedulingConfig;

    fn create_initial_state(&self, base: DateTime<Utc>) -> Result<ReviewState, ComputeError>;

    fn calculate_next_interval(&self, state: &ReviewState, feedback: ReviewFeedback) -> IntervalUpdate;

    fn should_reset_interval(&self, state: &ReviewState, consecutive_failures: u32) -> bool;

    /// Penalty for reviewing well after the due date. Never yields a longer
    /// interval or a higher ease factor than `state` already has.
    fn adjust_for_late_review(&self, state: &ReviewState, now: DateTime<Utc>) -> IntervalUpdate;

    /// Interval each rating would produce, in [`ReviewFeedback::ALL`] order.
    fn preview_intervals(&self, state: &ReviewState) -> [ReviewInterval; 4] {
        ReviewFeedback::ALL.map(|feedback| self.calculate_next_interval(state, feedback).interval)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Sm2Policy {
    config: SchedulingConfig,
}

impl Sm2Policy {
    pub fn new(config: SchedulingConfig) -> Self {
        Self { config }
    }

    fn good_days(&self, state: &ReviewState) -> (f64, u32) {
        let current = state.interval().days();
        let raw = f64::from(current) * state.ease_factor().value();
        let grown = (raw.round() as u32).max(current.saturating_add(1));
        (raw, grown)
    }
}

impl SpacedRepetitionPolicy for Sm2Policy {
    fn config(&self) -> &SchedulingConfig {
        &self.config
    }

    fn create_initial_state(&self, base: DateTime<Utc>) -> Result<ReviewState, ComputeError> {
        ReviewState::initial(
            ReviewInterval::within(self.config.interval.initial_days, &self.config.interval),
            EaseFactor::within(self.config.ease.default, &self.config.ease),
            base,
        )
    }

    fn calculate_next_interval(&self, state: &ReviewState, feedback: ReviewFeedback) -> IntervalUpdate {
        let bounds = &self.config.interval;
        let ease_bounds = &self.config.ease;
        let rules = &self.config.feedback;
        let ease = state.ease_factor();

        match feedback {
            ReviewFeedback::Again => IntervalUpdate {
                interval: ReviewInterval::minimum(bounds),
                ease_factor: ease.adjusted(-rules.again_ease_penalty, ease_bounds),
            },
            ReviewFeedback::Hard => IntervalUpdate {
                interval: ReviewInterval::from_days_f64(
                    f64::from(state.interval().days()) * rules.hard_interval_multiplier,
                    bounds,
                ),
                ease_factor: ease.adjusted(-rules.hard_ease_penalty, ease_bounds),
            },
            ReviewFeedback::Good => {
                let (_, good) = self.good_days(state);
                IntervalUpdate {
                    interval: ReviewInterval::within(good, bounds),
                    ease_factor: EaseFactor::within(ease.value(), ease_bounds),
                }
            }
            ReviewFeedback::Easy => {
                let (raw_good, good) = self.good_days(state);
                let boosted = (raw_good * rules.easy_interval_bonus_multiplier).round() as u32;
                IntervalUpdate {
                    interval: ReviewInterval::within(boosted.max(good.saturating_add(1)), bounds),
                    ease_factor: ease.adjusted(rules.easy_ease_bonus, ease_bounds),
                }
            }
        }
    }

    fn should_reset_interval(&self, _state: &ReviewState, consecutive_failures: u32) -> bool {
        consecutive_failures >= self.config.failure.reset_threshold
    }

    fn adjust_for_late_review(&self, state: &ReviewState, now: DateTime<Utc>) -> IntervalUpdate {
        let unchanged = IntervalUpdate::of(state);
        let late = &self.config.late_review;

        let overdue = now - state.next_review_at();
        if overdue <= Duration::try_hours(late.grace_hours).unwrap_or(Duration::MAX) {
            return unchanged;
        }

        let interval_days = f64::from(state.interval().days().max(1));
        let overdue_days = overdue.num_seconds() as f64 / SECONDS_PER_DAY;
        let ratio = (overdue_days / interval_days).min(1.0);

        let shrunk = ReviewInterval::from_days_f64(
            interval_days * (1.0 - late.interval_penalty * ratio),
            &self.config.interval,
        );
        let penalized = state
            .ease_factor()
            .adjusted(-late.ease_penalty * ratio, &self.config.ease);

        IntervalUpdate {
            interval: shrunk.min(unchanged.interval),
            ease_factor: if penalized < unchanged.ease_factor {
                penalized
            } else {
                unchanged.ease_factor
            },
        }
    }
}
