//! Path builder port - downstream learning path generation.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{LearningPath, PathRequest};

/// Builds a learning path from a finished assessment.
#[async_trait]
pub trait PathBuilder: Send + Sync {
    async fn generate(&self, request: &PathRequest) -> DomainResult<LearningPath>;
}

/// A path builder that builds nothing.
///
/// Use this when no downstream path service is configured.
#[derive(Debug, Clone, Default)]
pub struct NullPathBuilder;

impl NullPathBuilder {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PathBuilder for NullPathBuilder {
    async fn generate(&self, request: &PathRequest) -> DomainResult<LearningPath> {
        tracing::debug!(
            user_id = %request.user_id,
            subject = %request.subject,
            accuracy_pct = request.accuracy_pct,
            "no path builder configured; skipping path generation"
        );
        Ok(LearningPath::default())
    }
}
