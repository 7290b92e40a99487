//! Item generator adapter.
//!
//! Turns the opaque generator's raw output into a validated
//! [`AssessmentItem`], or into "no item". Nothing in here returns an error:
//! every failure is logged and becomes `None`, and the caller retries by
//! reissuing the same state.

use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::models::{AssessmentItem, AssessmentState};
use crate::domain::ports::ItemGenerator;
use crate::services::safety_filter::{SafetyFilter, SafetyVerdict};

/// Why a candidate was discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    GeneratorError(String),
    Malformed(String),
    Invalid(String),
    Unsafe(String),
}

/// Generator output shape, tolerant of the field names models tend to use.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawItem {
    #[serde(alias = "question")]
    prompt: String,
    #[serde(alias = "options")]
    choices: Vec<String>,
    #[serde(alias = "correct_index", alias = "answerIndex", alias = "answer_index")]
    correct_index: i64,
    #[serde(default)]
    explanation: Option<String>,
}

/// Wraps an [`ItemGenerator`] with parsing, safety filtering, normalization
/// and validation.
pub struct ItemAdapter {
    generator: Arc<dyn ItemGenerator>,
    filter: SafetyFilter,
}

impl ItemAdapter {
    pub fn new(generator: Arc<dyn ItemGenerator>, filter: SafetyFilter) -> Self {
        Self { generator, filter }
    }

    /// Generate an item for `state`, or `None`.
    ///
    /// Terminal states never reach the generator.
    pub async fn generate(&self, state: &AssessmentState) -> Option<AssessmentItem> {
        if state.done {
            return None;
        }

        match self.try_generate(state).await {
            Ok(item) => Some(item),
            Err(rejection) => {
                warn!(
                    generator = self.generator.name(),
                    subject = %state.subject,
                    step = state.step,
                    difficulty = %state.difficulty,
                    ?rejection,
                    "discarding generated item"
                );
                None
            }
        }
    }

    async fn try_generate(&self, state: &AssessmentState) -> Result<AssessmentItem, Rejection> {
        let raw = self
            .generator
            .generate(state)
            .await
            .map_err(|e| Rejection::GeneratorError(e.to_string()))?;

        let item = parse_item(&raw, state)?;

        if let SafetyVerdict::Blocked(pattern) = self.filter.check_item(&item) {
            return Err(Rejection::Unsafe(pattern));
        }

        debug!(
            generator = self.generator.name(),
            step = state.step,
            difficulty = %item.difficulty,
            "generated item"
        );
        Ok(item)
    }
}

/// Parse raw generator output into an item normalized to `state`.
pub fn parse_item(raw: &str, state: &AssessmentState) -> Result<AssessmentItem, Rejection> {
    let json = extract_json_object(raw)
        .ok_or_else(|| Rejection::Malformed("no JSON object in generator output".to_string()))?;

    let parsed: RawItem =
        serde_json::from_str(json).map_err(|e| Rejection::Malformed(e.to_string()))?;

    let correct_index = usize::try_from(parsed.correct_index)
        .map_err(|_| Rejection::Invalid(format!("negative correctIndex {}", parsed.correct_index)))?;

    // subject/course/difficulty always come from the requesting state
    let item = AssessmentItem {
        subject: state.subject.clone(),
        course: state.course.clone(),
        difficulty: state.difficulty,
        prompt: parsed.prompt.trim().to_string(),
        choices: parsed.choices.iter().map(|c| c.trim().to_string()).collect(),
        correct_index,
        explanation: parsed.explanation.unwrap_or_default().trim().to_string(),
    };

    item.validate().map_err(|e| Rejection::Invalid(e.to_string()))?;
    Ok(item)
}

/// The outermost `{...}` span, ignoring code fences and surrounding prose.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}
