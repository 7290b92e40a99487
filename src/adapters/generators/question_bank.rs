//! Offline item generator backed by a YAML question bank.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AssessmentState, Difficulty};
use crate::domain::ports::ItemGenerator;

const EMBEDDED_BANK: &str = include_str!("../../../data/question_bank.yaml");

#[derive(Debug, Clone, Deserialize)]
struct BankFile {
    items: Vec<BankItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BankItem {
    #[serde(skip_serializing)]
    subject: String,
    #[serde(skip_serializing)]
    course: String,
    #[serde(skip_serializing)]
    difficulty: Difficulty,
    prompt: String,
    choices: Vec<String>,
    #[serde(alias = "correct_index")]
    correct_index: i64,
    #[serde(default)]
    explanation: String,
}

impl BankItem {
    fn matches(&self, state: &AssessmentState) -> bool {
        self.difficulty == state.difficulty
            && self.subject.eq_ignore_ascii_case(&state.subject)
            && self.course.eq_ignore_ascii_case(&state.course)
    }
}

/// Serves items from a fixed bank.
///
/// Selection is deterministic: the matching items for a subject, course and
/// difficulty are rotated by step, so repeating a request repeats the item.
#[derive(Debug, Clone)]
pub struct QuestionBankGenerator {
    items: Vec<BankItem>,
}

impl QuestionBankGenerator {
    /// Load the bank compiled into the binary.
    pub fn embedded() -> DomainResult<Self> {
        Self::from_yaml(EMBEDDED_BANK)
    }

    pub fn from_path(path: impl AsRef<Path>) -> DomainResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            DomainError::ValidationFailed(format!(
                "cannot read question bank {}: {e}",
                path.display()
            ))
        })?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> DomainResult<Self> {
        let bank: BankFile = serde_yaml::from_str(contents)
            .map_err(|e| DomainError::SerializationError(format!("invalid question bank: {e}")))?;
        Ok(Self { items: bank.items })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn select(&self, state: &AssessmentState) -> Option<&BankItem> {
        let matching: Vec<&BankItem> = self.items.iter().filter(|i| i.matches(state)).collect();
        if matching.is_empty() {
            return None;
        }
        let slot = (state.step.saturating_sub(1) as usize) % matching.len();
        matching.get(slot).copied()
    }
}

#[async_trait]
impl ItemGenerator for QuestionBankGenerator {
    fn name(&self) -> &'static str {
        "question-bank"
    }

    async fn generate(&self, state: &AssessmentState) -> DomainResult<String> {
        let item = self.select(state).ok_or_else(|| {
            DomainError::GenerationFailed(format!(
                "no {} items for {}/{}",
                state.difficulty, state.subject, state.course
            ))
        })?;
        Ok(serde_json::to_string(item)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::SubjectCourse;
    use crate::services::item_adapter::parse_item;

    fn state_at(subject: &str, course: &str, difficulty: Difficulty, step: u32) -> AssessmentState {
        let mut state = AssessmentState::new(SubjectCourse::new(subject, course), 6, difficulty, vec![]);
        state.step = step;
        state
    }

    #[test]
    fn test_embedded_bank_items_are_valid() {
        let bank = QuestionBankGenerator::embedded().unwrap();
        assert!(!bank.is_empty());
        for item in &bank.items {
            let state = state_at(&item.subject, &item.course, item.difficulty, 1);
            let raw = serde_json::to_string(item).unwrap();
            assert!(parse_item(&raw, &state).is_ok(), "invalid bank item: {}", item.prompt);
        }
    }

    #[test]
    fn test_embedded_bank_covers_default_ladder() {
        let bank = QuestionBankGenerator::embedded().unwrap();
        for difficulty in Difficulty::LADDER {
            let state = state_at("Math", "Algebra 1", difficulty, 1);
            assert!(bank.select(&state).is_some(), "no items at {difficulty}");
        }
    }

    #[tokio::test]
    async fn test_selection_is_deterministic_and_rotates() {
        let bank = QuestionBankGenerator::embedded().unwrap();
        let a = bank.generate(&state_at("Math", "Algebra 1", Difficulty::Easy, 2)).await.unwrap();
        let b = bank.generate(&state_at("Math", "Algebra 1", Difficulty::Easy, 2)).await.unwrap();
        let c = bank.generate(&state_at("Math", "Algebra 1", Difficulty::Easy, 3)).await.unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_matching_ignores_case() {
        let bank = QuestionBankGenerator::embedded().unwrap();
        let raw = bank
            .generate(&state_at("math", "ALGEBRA 1", Difficulty::Hard, 1))
            .await
            .unwrap();
        assert!(raw.contains("correctIndex"));
        assert!(!raw.contains("subject"));
    }

    #[tokio::test]
    async fn test_unknown_course_is_error() {
        let bank = QuestionBankGenerator::embedded().unwrap();
        let err = bank
            .generate(&state_at("Art", "Pottery", Difficulty::Easy, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::GenerationFailed(_)));
    }

    #[test]
    fn test_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bank.yaml");
        std::fs::write(
            &path,
            "items:\n  - subject: Art\n    course: Color\n    difficulty: intro\n    prompt: Primary color?\n    choices: [Red, Green]\n    correct_index: 0\n",
        )
        .unwrap();

        let bank = QuestionBankGenerator::from_path(&path).unwrap();
        assert_eq!(bank.len(), 1);
        assert!(QuestionBankGenerator::from_path(dir.path().join("missing.yaml")).is_err());
    }
}
