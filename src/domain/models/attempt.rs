//! Finished assessment attempts and the learning paths they trigger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::assessment::{AssessmentState, Difficulty};

/// Accuracy reported when a session ends before any question was answered.
pub const NEUTRAL_ACCURACY: f64 = 0.5;

/// Fraction of questions answered correctly, or `fallback` when none were.
pub fn accuracy(correct_total: u32, question_total: u32, fallback: f64) -> f64 {
    if question_total == 0 {
        fallback
    } else {
        f64::from(correct_total) / f64::from(question_total)
    }
}

/// Persisted record of one finished assessment session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentAttempt {
    pub id: Uuid,
    /// Deduplicates repeated finish calls for the same logical session
    pub attempt_key: String,
    pub user_id: String,
    pub subject: String,
    pub course: String,
    pub final_difficulty: Difficulty,
    pub steps_taken: u32,
    pub mistakes: u32,
    pub correct_total: u32,
    pub question_total: u32,
    pub accuracy: f64,
    pub created_at: DateTime<Utc>,
}

impl AssessmentAttempt {
    pub fn new(
        user_id: impl Into<String>,
        state: &AssessmentState,
        correct_total: u32,
        question_total: u32,
        fallback_accuracy: f64,
    ) -> Self {
        let user_id = user_id.into();
        Self {
            id: Uuid::new_v4(),
            attempt_key: attempt_key(&user_id, state, correct_total, question_total),
            subject: state.subject.clone(),
            course: state.course.clone(),
            final_difficulty: state.difficulty,
            steps_taken: state.step.saturating_sub(1),
            mistakes: state.mistakes,
            correct_total,
            question_total,
            accuracy: accuracy(correct_total, question_total, fallback_accuracy),
            created_at: Utc::now(),
            user_id,
        }
    }

    /// Accuracy as a whole percentage, the unit the path builder expects.
    pub fn accuracy_pct(&self) -> u32 {
        // accuracy is clamped to [0, 1] so the cast cannot truncate meaningfully
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let pct = (self.accuracy.clamp(0.0, 1.0) * 100.0).round() as u32;
        pct
    }

    /// Free-text notes handed to the path builder.
    pub fn notes(&self) -> String {
        format!(
            "reached {} difficulty; {} mistake(s); {}/{} correct over {} step(s)",
            self.final_difficulty,
            self.mistakes,
            self.correct_total,
            self.question_total,
            self.steps_taken
        )
    }
}

/// Idempotency key for a finished session.
///
/// Sessions bootstrapped by this server carry a session id. States built
/// elsewhere fall back to a key derived from everything the finish call knows.
pub fn attempt_key(
    user_id: &str,
    state: &AssessmentState,
    correct_total: u32,
    question_total: u32,
) -> String {
    match state.session_id {
        Some(id) => format!("session:{id}"),
        None => format!(
            "derived:{}|{}|{}|{}|{}|{}|{}|{}",
            user_id,
            state.subject,
            state.course,
            state.step,
            state.mistakes,
            state.difficulty,
            correct_total,
            question_total
        ),
    }
}

/// Learning path returned by the downstream path builder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningPath {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub lessons: Vec<String>,
}

/// Everything the path builder is told about a finished attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathRequest {
    pub user_id: String,
    pub subject: String,
    pub course: String,
    pub accuracy_pct: u32,
    pub notes: String,
}

impl From<&AssessmentAttempt> for PathRequest {
    fn from(attempt: &AssessmentAttempt) -> Self {
        Self {
            user_id: attempt.user_id.clone(),
            subject: attempt.subject.clone(),
            course: attempt.course.clone(),
            accuracy_pct: attempt.accuracy_pct(),
            notes: attempt.notes(),
        }
    }
}
