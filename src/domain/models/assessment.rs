//! Assessment domain model.
//!
//! An [`AssessmentState`] is one learner's position in one subject/course
//! diagnostic. It travels in every request and response body, so every
//! inbound copy is validated before it is trusted.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};

/// Minimum number of choices an item may carry.
pub const MIN_CHOICES: usize = 2;

/// Maximum number of choices an item may carry.
pub const MAX_CHOICES: usize = 4;

/// Largest step budget a session may be started with.
pub const MAX_STEPS_LIMIT: u32 = 1000;

/// Difficulty ladder, ordered `intro < easy < medium < hard`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Intro,
    Easy,
    Medium,
    Hard,
}

impl Default for Difficulty {
    fn default() -> Self {
        Self::Easy
    }
}

impl Difficulty {
    /// All rungs from lowest to highest.
    pub const LADDER: [Self; 4] = [Self::Intro, Self::Easy, Self::Medium, Self::Hard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Intro => "intro",
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "intro" => Some(Self::Intro),
            "easy" => Some(Self::Easy),
            "medium" => Some(Self::Medium),
            "hard" => Some(Self::Hard),
            _ => None,
        }
    }

    /// One rung up, clamped at `hard`.
    pub fn promote(self) -> Self {
        match self {
            Self::Intro => Self::Easy,
            Self::Easy => Self::Medium,
            Self::Medium | Self::Hard => Self::Hard,
        }
    }

    /// One rung down, clamped at `intro`.
    pub fn demote(self) -> Self {
        match self {
            Self::Intro | Self::Easy => Self::Intro,
            Self::Medium => Self::Easy,
            Self::Hard => Self::Medium,
        }
    }

    /// Position on the ladder, `intro` is 0.
    pub fn rung(self) -> u8 {
        match self {
            Self::Intro => 0,
            Self::Easy => 1,
            Self::Medium => 2,
            Self::Hard => 3,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A subject/course pair, used for bootstrap and for the `remaining` flow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectCourse {
    pub subject: String,
    pub course: String,
}

impl SubjectCourse {
    pub fn new(subject: impl Into<String>, course: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            course: course.into(),
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.subject.trim().is_empty() {
            return Err(DomainError::ValidationFailed("subject cannot be empty".to_string()));
        }
        if self.course.trim().is_empty() {
            return Err(DomainError::ValidationFailed("course cannot be empty".to_string()));
        }
        Ok(())
    }
}

/// One learner's position in one subject/course assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentState {
    pub subject: String,
    pub course: String,
    /// 1-based turn counter
    pub step: u32,
    pub max_steps: u32,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub correct_streak: u32,
    #[serde(default)]
    pub mistakes: u32,
    #[serde(default)]
    pub done: bool,
    /// Further subject/course pairs to assess in the same flow
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remaining: Vec<SubjectCourse>,
    /// Assigned at bootstrap; idempotency key of the finished attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
}

impl AssessmentState {
    /// Fresh state at step 1 with a new session id.
    pub fn new(
        target: SubjectCourse,
        max_steps: u32,
        difficulty: Difficulty,
        remaining: Vec<SubjectCourse>,
    ) -> Self {
        Self {
            subject: target.subject,
            course: target.course,
            step: 1,
            max_steps,
            difficulty,
            correct_streak: 0,
            mistakes: 0,
            done: false,
            remaining,
            session_id: Some(Uuid::new_v4()),
        }
    }

    pub fn target(&self) -> SubjectCourse {
        SubjectCourse::new(self.subject.clone(), self.course.clone())
    }

    /// The bootstrap target for the next subject in the flow, with the tail
    /// of the flow still queued behind it.
    pub fn next_in_flow(&self) -> Option<(SubjectCourse, Vec<SubjectCourse>)> {
        let (head, tail) = self.remaining.split_first()?;
        Some((head.clone(), tail.to_vec()))
    }

    /// Reject shapes that could not have come out of the transition function.
    pub fn validate(&self) -> DomainResult<()> {
        self.target().validate()?;
        if self.step == 0 {
            return Err(DomainError::ValidationFailed("step is 1-based".to_string()));
        }
        if self.max_steps == 0 || self.max_steps > MAX_STEPS_LIMIT {
            return Err(DomainError::ValidationFailed(format!(
                "maxSteps must be between 1 and {MAX_STEPS_LIMIT}"
            )));
        }
        // Terminal states stop one step past the limit.
        if self.step > self.max_steps + 1 {
            return Err(DomainError::ValidationFailed(format!(
                "step {} is past the end of a {}-step session",
                self.step, self.max_steps
            )));
        }
        // A live state can be at most one step past the limit before it is marked done.
        if !self.done && self.step > self.max_steps {
            return Err(DomainError::ValidationFailed(format!(
                "step {} exceeds maxSteps {} on a live state",
                self.step, self.max_steps
            )));
        }
        if self.mistakes >= self.step {
            return Err(DomainError::ValidationFailed(format!(
                "{} mistakes cannot have been made in {} steps",
                self.mistakes, self.step
            )));
        }
        for entry in &self.remaining {
            entry.validate()?;
        }
        Ok(())
    }
}

/// One multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentItem {
    pub subject: String,
    pub course: String,
    pub difficulty: Difficulty,
    pub prompt: String,
    pub choices: Vec<String>,
    pub correct_index: usize,
    #[serde(default)]
    pub explanation: String,
}

impl AssessmentItem {
    pub fn is_correct(&self, answer: usize) -> bool {
        answer == self.correct_index
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.prompt.trim().is_empty() {
            return Err(DomainError::ValidationFailed("item prompt is empty".to_string()));
        }
        if self.choices.len() < MIN_CHOICES || self.choices.len() > MAX_CHOICES {
            return Err(DomainError::ValidationFailed(format!(
                "item has {} choices, expected {MIN_CHOICES}-{MAX_CHOICES}",
                self.choices.len()
            )));
        }
        if self.correct_index >= self.choices.len() {
            return Err(DomainError::ValidationFailed(format!(
                "correctIndex {} out of bounds for {} choices",
                self.correct_index,
                self.choices.len()
            )));
        }
        let mut seen = HashSet::new();
        for choice in &self.choices {
            let normalized = choice.trim().to_lowercase();
            if normalized.is_empty() {
                return Err(DomainError::ValidationFailed("item has a blank choice".to_string()));
            }
            if !seen.insert(normalized) {
                return Err(DomainError::ValidationFailed(format!(
                    "duplicate choice: {choice}"
                )));
            }
        }
        Ok(())
    }

    /// Whether this item was generated for the given state's subject/course.
    pub fn belongs_to(&self, state: &AssessmentState) -> bool {
        self.subject == state.subject && self.course == state.course
    }
}
