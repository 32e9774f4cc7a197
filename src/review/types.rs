use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::config::{DifficultyConfig, EaseConfig, IntervalConfig};

use super::error::ScheduleError;

// ==================== Constants ====================

pub const MIN_EASE_FACTOR: f64 = 1.3;
pub const MAX_EASE_FACTOR: f64 = 4.0;
pub const DEFAULT_EASE_FACTOR: f64 = 2.5;

pub const MIN_INTERVAL_DAYS: u32 = 1;
pub const MAX_INTERVAL_DAYS: u32 = 30;
pub const INITIAL_INTERVAL_DAYS: u32 = 1;

/// Answers at or under this are "instant" and rate as EASY.
pub const INSTANT_RESPONSE_MS: u64 = 3_000;
/// Answers above this count as struggling.
pub const STRUGGLING_RESPONSE_MS: u64 = 15_000;
/// Upper bound of a normal answer; anything slower was likely interrupted.
pub const NORMAL_RESPONSE_MAX_MS: u64 = 30_000;

// ==================== EaseFactor ====================

/// Growth multiplier of an item's review interval.
///
/// Construction and arithmetic saturate at the bounds instead of failing.
/// Persisted values are trusted as-is when deserialized.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EaseFactor(f64);

impl EaseFactor {
    pub fn new(value: f64) -> Self {
        Self::clamp_to(value, MIN_EASE_FACTOR, MAX_EASE_FACTOR)
    }

    pub fn within(value: f64, bounds: &EaseConfig) -> Self {
        Self::clamp_to(value, bounds.min, bounds.max)
    }

    pub fn minimum(bounds: &EaseConfig) -> Self {
        Self(bounds.min)
    }

    fn clamp_to(value: f64, min: f64, max: f64) -> Self {
        if value.is_nan() {
            return Self(min);
        }
        Self(value.clamp(min, max))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Adds `delta` (negative to penalize) and saturates at the configured bounds.
    pub fn adjusted(self, delta: f64, bounds: &EaseConfig) -> Self {
        Self::within(self.0 + delta, bounds)
    }

    pub fn is_at_minimum(self, bounds: &EaseConfig) -> bool {
        self.0 <= bounds.min
    }
}

impl Default for EaseFactor {
    fn default() -> Self {
        Self(DEFAULT_EASE_FACTOR)
    }
}

impl fmt::Display for EaseFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

// ==================== ReviewInterval ====================

/// Whole days between two reviews.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewInterval(u32);

impl ReviewInterval {
    pub fn new(days: u32) -> Self {
        Self(days.clamp(MIN_INTERVAL_DAYS, MAX_INTERVAL_DAYS))
    }

    pub fn within(days: u32, bounds: &IntervalConfig) -> Self {
        Self(days.clamp(bounds.min_days, bounds.max_days))
    }

    /// Rounds a fractional day count to the nearest day, then saturates.
    pub fn from_days_f64(days: f64, bounds: &IntervalConfig) -> Self {
        if !days.is_finite() {
            return if days == f64::INFINITY {
                Self(bounds.max_days)
            } else {
                Self(bounds.min_days)
            };
        }
        let rounded = days.round().clamp(0.0, u32::MAX as f64) as u32;
        Self::within(rounded, bounds)
    }

    pub fn minimum(bounds: &IntervalConfig) -> Self {
        Self(bounds.min_days)
    }

    pub fn days(self) -> u32 {
        self.0
    }

    pub fn as_duration(self) -> Duration {
        Duration::days(i64::from(self.0))
    }
}

impl Default for ReviewInterval {
    fn default() -> Self {
        Self(INITIAL_INTERVAL_DAYS)
    }
}

impl fmt::Display for ReviewInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d", self.0)
    }
}

// ==================== ReviewFeedback ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewFeedback {
    Again,
    Hard,
    Good,
    Easy,
}

impl ReviewFeedback {
    pub const ALL: [ReviewFeedback; 4] = [Self::Again, Self::Hard, Self::Good, Self::Easy];

    pub fn is_again(self) -> bool {
        self == Self::Again
    }

    pub fn is_easy(self) -> bool {
        self == Self::Easy
    }

    /// Any rating other than AGAIN means the learner recalled the item.
    pub fn is_correct(self) -> bool {
        !self.is_again()
    }

    /// Derives a rating from a bare answer for callers that do not ask the
    /// learner to self-grade.
    pub fn from_answer(is_correct: bool, response_time_ms: Option<u64>) -> Self {
        if !is_correct {
            return Self::Again;
        }
        match response_time_ms {
            Some(ms) if ms < INSTANT_RESPONSE_MS => Self::Easy,
            Some(ms) if ms > STRUGGLING_RESPONSE_MS => Self::Hard,
            _ => Self::Good,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Again => "AGAIN",
            Self::Hard => "HARD",
            Self::Good => "GOOD",
            Self::Easy => "EASY",
        }
    }
}

impl FromStr for ReviewFeedback {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "AGAIN" => Ok(Self::Again),
            "HARD" => Ok(Self::Hard),
            "GOOD" => Ok(Self::Good),
            "EASY" => Ok(Self::Easy),
            _ => Err(ScheduleError::InvalidFeedback(s.to_string())),
        }
    }
}

impl fmt::Display for ReviewFeedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==================== DifficultyLevel ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl DifficultyLevel {
    pub fn from_ease(ease: EaseFactor, thresholds: &DifficultyConfig) -> Self {
        let value = ease.value();
        if value >= thresholds.beginner_ease_threshold {
            Self::Beginner
        } else if value >= thresholds.intermediate_ease_threshold {
            Self::Intermediate
        } else {
            Self::Advanced
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}
