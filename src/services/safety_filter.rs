//! Content safety filter for generated items.
//!
//! A deny-list of case-insensitive regular expressions. Any match in the
//! text learners will see discards the whole item.

use regex::{Regex, RegexBuilder};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::AssessmentItem;

/// Result of a safety check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafetyVerdict {
    /// Content may be shown.
    Allowed,
    /// Content matched the named pattern.
    Blocked(String),
}

impl SafetyVerdict {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked(_))
    }
}

/// Compiled deny-list.
#[derive(Debug, Clone, Default)]
pub struct SafetyFilter {
    patterns: Vec<Regex>,
}

impl SafetyFilter {
    /// Compile the deny-list.
    ///
    /// # Errors
    /// Returns `ValidationFailed` naming the first pattern that does not compile.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> DomainResult<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                RegexBuilder::new(p.as_ref())
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| {
                        DomainError::ValidationFailed(format!(
                            "invalid deny pattern '{}': {e}",
                            p.as_ref()
                        ))
                    })
            })
            .collect::<DomainResult<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// A filter that allows everything.
    pub fn permissive() -> Self {
        Self::default()
    }

    pub fn check_text(&self, text: &str) -> SafetyVerdict {
        self.patterns
            .iter()
            .find(|p| p.is_match(text))
            .map_or(SafetyVerdict::Allowed, |p| {
                SafetyVerdict::Blocked(p.as_str().to_string())
            })
    }

    /// Check the prompt and every choice.
    pub fn check_item(&self, item: &AssessmentItem) -> SafetyVerdict {
        std::iter::once(item.prompt.as_str())
            .chain(item.choices.iter().map(String::as_str))
            .map(|text| self.check_text(text))
            .find(SafetyVerdict::is_blocked)
            .unwrap_or(SafetyVerdict::Allowed)
    }
}
