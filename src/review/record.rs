use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::ScheduleError;
use super::events::ReviewCompletedPayload;
use super::schedule::ReviewAttempt;
use super::types::{ReviewFeedback, INSTANT_RESPONSE_MS, NORMAL_RESPONSE_MAX_MS, STRUGGLING_RESPONSE_MS};

const CORRECTNESS_WEIGHT: f64 = 70.0;
const SPEED_WEIGHT: f64 = 30.0;
const UNKNOWN_SPEED: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudyPatternKind {
    QuickCorrect,
    SlowCorrect,
    QuickIncorrect,
    SlowIncorrect,
}

impl StudyPatternKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuickCorrect => "quick_correct",
            Self::SlowCorrect => "slow_correct",
            Self::QuickIncorrect => "quick_incorrect",
            Self::SlowIncorrect => "slow_incorrect",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StudyPattern {
    pub kind: StudyPatternKind,
    /// 0.5 right at the quick/slow boundary, rising to 1.0 far from it.
    pub confidence: f64,
}

/// One answered review, kept for analytics. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyRecord {
    id: Uuid,
    student_id: String,
    problem_id: String,
    feedback: ReviewFeedback,
    is_correct: bool,
    response_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    answer_content: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
}

impl StudyRecord {
    pub fn create(
        student_id: impl Into<String>,
        problem_id: impl Into<String>,
        attempt: ReviewAttempt,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ScheduleError> {
        let student_id = student_id.into();
        let problem_id = problem_id.into();
        if student_id.trim().is_empty() {
            return Err(ScheduleError::invalid_argument("student_id", "must not be blank"));
        }
        if problem_id.trim().is_empty() {
            return Err(ScheduleError::invalid_argument("problem_id", "must not be blank"));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            student_id,
            problem_id,
            feedback: attempt.feedback,
            is_correct: attempt.is_correct,
            response_time_ms: attempt.response_time_ms,
            answer_content: attempt.answer_content,
            created_at,
        })
    }

    /// Builds the record for a completed review from its event payload.
    pub fn from_review_completed(payload: &ReviewCompletedPayload, id: Uuid) -> Self {
        Self {
            id,
            student_id: payload.student_id.clone(),
            problem_id: payload.problem_id.clone(),
            feedback: payload.feedback,
            is_correct: payload.is_correct,
            response_time_ms: payload.response_time_ms,
            answer_content: payload.answer_content.clone(),
            created_at: payload.reviewed_at,
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

    pub fn feedback(&self) -> ReviewFeedback {
        self.feedback
    }

    pub fn is_correct(&self) -> bool {
        self.is_correct
    }

    pub fn response_time_ms(&self) -> Option<u64> {
        self.response_time_ms
    }

    pub fn answer_content(&self) -> Option<&serde_json::Value> {
        self.answer_content.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_normal_response_time(&self) -> bool {
        matches!(self.response_time_ms, Some(ms) if ms <= NORMAL_RESPONSE_MAX_MS)
    }

    pub fn is_instant_response(&self) -> bool {
        matches!(self.response_time_ms, Some(ms) if ms < INSTANT_RESPONSE_MS)
    }

    pub fn is_struggling(&self) -> bool {
        !self.is_correct || matches!(self.response_time_ms, Some(ms) if ms > STRUGGLING_RESPONSE_MS)
    }

    /// 0-100 blend of correctness (70%) and answer speed (30%).
    pub fn performance_score(&self) -> u8 {
        let correctness = if self.is_correct { 1.0 } else { 0.0 };
        let speed = match self.response_time_ms {
            Some(ms) => 1.0 - (ms as f64 / NORMAL_RESPONSE_MAX_MS as f64).min(1.0),
            None => UNKNOWN_SPEED,
        };
        (CORRECTNESS_WEIGHT * correctness + SPEED_WEIGHT * speed)
            .round()
            .clamp(0.0, 100.0) as u8
    }

    pub fn study_pattern(&self) -> Option<StudyPattern> {
        let ms = self.response_time_ms?;
        let quick = ms < STRUGGLING_RESPONSE_MS;
        let kind = match (quick, self.is_correct) {
            (true, true) => StudyPatternKind::QuickCorrect,
            (false, true) => StudyPatternKind::SlowCorrect,
            (true, false) => StudyPatternKind::QuickIncorrect,
            (false, false) => StudyPatternKind::SlowIncorrect,
        };
        let boundary = STRUGGLING_RESPONSE_MS as f64;
        let distance = (ms as f64 - boundary).abs() / boundary;
        Some(StudyPattern {
            kind,
            confidence: 0.5 + 0.5 * distance.min(1.0),
        })
    }
}
