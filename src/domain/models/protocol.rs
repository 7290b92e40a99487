//! Wire messages of the stateless assessment protocol.
//!
//! All session state travels in these bodies; the server keeps nothing
//! between calls.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::assessment::{AssessmentItem, AssessmentState, SubjectCourse};
use crate::domain::errors::{DomainError, DomainResult};

/// Body of `POST /assessment/next`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<AssessmentState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_answer: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_item: Option<AssessmentItem>,
    /// Explicit bootstrap subject, used only when `state` is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Explicit bootstrap course, used only when `state` is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<String>,
    /// Flow queue for a bootstrapped state
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remaining: Vec<SubjectCourse>,
}

impl NextRequest {
    /// Request the item for an existing state without answering anything.
    pub fn resume(state: AssessmentState) -> Self {
        Self {
            state: Some(state),
            ..Default::default()
        }
    }

    /// Request the successor of `state` given the learner's answer to `item`.
    pub fn answered(state: AssessmentState, answer: usize, item: AssessmentItem) -> Self {
        Self {
            state: Some(state),
            last_answer: Some(answer),
            last_item: Some(item),
            ..Default::default()
        }
    }

    /// Bootstrap a new session for an explicit target.
    pub fn bootstrap(target: SubjectCourse, remaining: Vec<SubjectCourse>) -> Self {
        Self {
            subject: Some(target.subject),
            course: Some(target.course),
            remaining,
            ..Default::default()
        }
    }

    /// Explicit bootstrap target, if both halves were supplied.
    pub fn explicit_target(&self) -> DomainResult<Option<SubjectCourse>> {
        match (&self.subject, &self.course) {
            (Some(subject), Some(course)) => {
                let target = SubjectCourse::new(subject.clone(), course.clone());
                target.validate()?;
                Ok(Some(target))
            }
            (None, None) => Ok(None),
            _ => Err(DomainError::ValidationFailed(
                "subject and course must be supplied together".to_string(),
            )),
        }
    }
}

/// One precomputed hypothetical turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub state: AssessmentState,
    pub item: Option<AssessmentItem>,
}

impl Branch {
    /// A branch can be taken without a round trip when it has an item to show,
    /// or when it ends the session and needs none.
    pub fn is_ready(&self) -> bool {
        self.item.is_some() || self.state.done
    }
}

/// Both speculative successors of the current turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branches {
    pub right: Branch,
    pub wrong: Branch,
}

impl Branches {
    pub fn for_outcome(&self, correct: bool) -> &Branch {
        if correct {
            &self.right
        } else {
            &self.wrong
        }
    }
}

/// Response of `POST /assessment/next`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextResponse {
    pub state: AssessmentState,
    pub item: Option<AssessmentItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branches: Option<Branches>,
}

impl NextResponse {
    pub fn terminal(state: AssessmentState) -> Self {
        Self {
            state,
            item: None,
            branches: None,
        }
    }
}

/// Body of `POST /assessment/finish`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishRequest {
    pub state: AssessmentState,
    pub correct_total: u32,
    pub question_total: u32,
}

impl FinishRequest {
    pub fn validate(&self) -> DomainResult<()> {
        self.state.validate()?;
        if self.correct_total > self.question_total {
            return Err(DomainError::ValidationFailed(format!(
                "correctTotal {} exceeds questionTotal {}",
                self.correct_total, self.question_total
            )));
        }
        Ok(())
    }
}

/// Response of `POST /assessment/finish`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishResponse {
    pub ok: bool,
}

/// Identity of one speculative prefetch: the turn it was issued from and the
/// answer that led away from it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpeculationKey {
    pub subject: String,
    pub course: String,
    pub step: u32,
    pub answer: usize,
}

impl SpeculationKey {
    pub fn new(state: &AssessmentState, answer: usize) -> Self {
        Self {
            subject: state.subject.clone(),
            course: state.course.clone(),
            step: state.step,
            answer,
        }
    }
}

impl fmt::Display for SpeculationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}|{}", self.subject, self.course, self.step, self.answer)
    }
}
