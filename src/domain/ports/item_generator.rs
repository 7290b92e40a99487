//! Item generator port - the opaque question-producing capability.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::AssessmentState;

/// Produces raw candidate question text for a state.
///
/// Implementations return whatever their backend emitted; parsing, safety
/// filtering and validation belong to the item adapter, so a generator never
/// has to guarantee well-formed output.
#[async_trait]
pub trait ItemGenerator: Send + Sync {
    /// Get the generator type name.
    fn name(&self) -> &'static str;

    /// Generate one raw candidate item for `state`.
    ///
    /// # Errors
    /// Returns `GenerationFailed` when the backend could not produce output.
    async fn generate(&self, state: &AssessmentState) -> DomainResult<String>;
}
