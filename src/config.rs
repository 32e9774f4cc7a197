use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::review::types::{
    DEFAULT_EASE_FACTOR, INITIAL_INTERVAL_DAYS, MAX_EASE_FACTOR, MAX_INTERVAL_DAYS, MIN_EASE_FACTOR,
    MIN_INTERVAL_DAYS,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config field {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("config json error: {0}")]
    Json(#[from] serde_json::Error),
}

const MAX_RELEARN_MINUTES: i64 = 24 * 60;
const MAX_LEAD_MINUTES: i64 = 7 * 24 * 60;
const MAX_WINDOW_HOURS: i64 = 365 * 24;

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IntervalConfig {
    pub min_days: u32,
    pub max_days: u32,
    pub initial_days: u32,
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            min_days: MIN_INTERVAL_DAYS,
            max_days: MAX_INTERVAL_DAYS,
            initial_days: INITIAL_INTERVAL_DAYS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EaseConfig {
    pub min: f64,
    pub max: f64,
    pub default: f64,
}

impl Default for EaseConfig {
    fn default() -> Self {
        Self {
            min: MIN_EASE_FACTOR,
            max: MAX_EASE_FACTOR,
            default: DEFAULT_EASE_FACTOR,
        }
    }
}

/// Per-rating adjustments applied by the SM-2 update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeedbackConfig {
    pub again_ease_penalty: f64,
    pub hard_interval_multiplier: f64,
    pub hard_ease_penalty: f64,
    pub easy_interval_bonus_multiplier: f64,
    pub easy_ease_bonus: f64,
    /// When set, AGAIN schedules a relearning step this many minutes out
    /// instead of the one-day minimum interval.
    pub again_relearn_minutes: Option<i64>,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            again_ease_penalty: 0.8,
            hard_interval_multiplier: 0.8,
            hard_ease_penalty: 0.15,
            easy_interval_bonus_multiplier: 1.3,
            easy_ease_bonus: 0.15,
            again_relearn_minutes: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LateReviewConfig {
    pub grace_hours: i64,
    pub interval_penalty: f64,
    pub ease_penalty: f64,
}

impl Default for LateReviewConfig {
    fn default() -> Self {
        Self {
            grace_hours: 24,
            interval_penalty: 0.5,
            ease_penalty: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FailureConfig {
    pub reset_threshold: u32,
}

impl Default for FailureConfig {
    fn default() -> Self {
        Self { reset_threshold: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReminderConfig {
    pub default_minutes: i64,
    pub early_minutes: i64,
    pub extra_failure_threshold: u32,
    pub extra_ease_threshold: f64,
    pub overdue_after_hours: i64,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            default_minutes: 30,
            early_minutes: 120,
            extra_failure_threshold: 2,
            extra_ease_threshold: 1.8,
            overdue_after_hours: 24,
        }
    }
}

impl ReminderConfig {
    /// How long past due an item may sit before it counts as overdue.
    pub fn overdue_grace(&self) -> Duration {
        Duration::try_hours(self.overdue_after_hours).unwrap_or(Duration::MAX)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DifficultyConfig {
    pub beginner_ease_threshold: f64,
    pub intermediate_ease_threshold: f64,
}

impl Default for DifficultyConfig {
    fn default() -> Self {
        Self {
            beginner_ease_threshold: 2.8,
            intermediate_ease_threshold: 2.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SchedulingConfig {
    pub interval: IntervalConfig,
    pub ease: EaseConfig,
    pub feedback: FeedbackConfig,
    pub late_review: LateReviewConfig,
    pub failure: FailureConfig,
    pub reminder: ReminderConfig,
    pub difficulty: DifficultyConfig,
}

impl SchedulingConfig {
    /// Parses a (possibly partial) JSON document; omitted fields keep their defaults.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();

        config.interval.max_days = env_parse("REVIEW_MAX_INTERVAL_DAYS").unwrap_or(config.interval.max_days);
        config.failure.reset_threshold =
            env_parse("REVIEW_RESET_THRESHOLD").unwrap_or(config.failure.reset_threshold);
        config.reminder.default_minutes =
            env_parse("REVIEW_REMINDER_MINUTES").unwrap_or(config.reminder.default_minutes);
        config.reminder.early_minutes =
            env_parse("REVIEW_EARLY_REMINDER_MINUTES").unwrap_or(config.reminder.early_minutes);
        config.reminder.overdue_after_hours =
            env_parse("REVIEW_OVERDUE_AFTER_HOURS").unwrap_or(config.reminder.overdue_after_hours);
        config.feedback.again_relearn_minutes = env_parse("REVIEW_AGAIN_RELEARN_MINUTES")
            .filter(|minutes: &i64| *minutes > 0)
            .or(config.feedback.again_relearn_minutes);

        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let interval = &self.interval;
        if interval.min_days == 0 {
            return Err(invalid("interval.minDays", "must be at least 1"));
        }
        if interval.min_days > interval.max_days {
            return Err(invalid("interval.maxDays", "must not be below minDays"));
        }
        if !(interval.min_days..=interval.max_days).contains(&interval.initial_days) {
            return Err(invalid("interval.initialDays", "must lie within [minDays, maxDays]"));
        }

        let ease = &self.ease;
        if !(ease.min.is_finite() && ease.max.is_finite() && ease.default.is_finite()) {
            return Err(invalid("ease", "bounds must be finite"));
        }
        if ease.min <= 0.0 || ease.min > ease.max {
            return Err(invalid("ease.min", "must be positive and not above ease.max"));
        }
        if ease.default < ease.min || ease.default > ease.max {
            return Err(invalid("ease.default", "must lie within [min, max]"));
        }

        let feedback = &self.feedback;
        check_non_negative("feedback.againEasePenalty", feedback.again_ease_penalty)?;
        check_non_negative("feedback.hardEasePenalty", feedback.hard_ease_penalty)?;
        check_non_negative("feedback.easyEaseBonus", feedback.easy_ease_bonus)?;
        if !(feedback.hard_interval_multiplier > 0.0 && feedback.hard_interval_multiplier <= 1.0) {
            return Err(invalid("feedback.hardIntervalMultiplier", "must be in (0, 1]"));
        }
        if !(feedback.easy_interval_bonus_multiplier >= 1.0) {
            return Err(invalid("feedback.easyIntervalBonusMultiplier", "must be at least 1"));
        }
        if matches!(feedback.again_relearn_minutes, Some(minutes) if !(1..=MAX_RELEARN_MINUTES).contains(&minutes)) {
            return Err(invalid("feedback.againRelearnMinutes", "must be between 1 and 1440 when set"));
        }

        let late = &self.late_review;
        if !(0..=MAX_WINDOW_HOURS).contains(&late.grace_hours) {
            return Err(invalid("lateReview.graceHours", "must be between 0 and 8760"));
        }
        if !(0.0..=1.0).contains(&late.interval_penalty) {
            return Err(invalid("lateReview.intervalPenalty", "must be in [0, 1]"));
        }
        check_non_negative("lateReview.easePenalty", late.ease_penalty)?;

        if self.failure.reset_threshold == 0 {
            return Err(invalid("failure.resetThreshold", "must be at least 1"));
        }

        let reminder = &self.reminder;
        let lead_times = 0..=MAX_LEAD_MINUTES;
        if !lead_times.contains(&reminder.default_minutes) || !lead_times.contains(&reminder.early_minutes) {
            return Err(invalid("reminder", "lead times must be between 0 and 10080 minutes"));
        }
        if !(0..=MAX_WINDOW_HOURS).contains(&reminder.overdue_after_hours) {
            return Err(invalid("reminder.overdueAfterHours", "must be between 0 and 8760"));
        }

        let difficulty = &self.difficulty;
        if difficulty.intermediate_ease_threshold > difficulty.beginner_ease_threshold {
            return Err(invalid(
                "difficulty.intermediateEaseThreshold",
                "must not exceed beginnerEaseThreshold",
            ));
        }

        Ok(())
    }
}

fn check_non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(field, "must be a finite non-negative number"))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|value| value.trim().parse::<T>().ok())
}
