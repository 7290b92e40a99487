//! Attempt repository port - persisted finished sessions.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::AssessmentAttempt;

/// Repository trait for finished assessment attempts.
///
/// Implementations must make `record` atomic with respect to the attempt key:
/// of any number of concurrent calls with the same key, exactly one reports
/// that it inserted.
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Insert the attempt unless one with the same key exists.
    ///
    /// # Returns
    /// - `true` if the attempt was inserted
    /// - `false` if an attempt with the same key was already recorded
    async fn record(&self, attempt: &AssessmentAttempt) -> DomainResult<bool>;

    /// Most recent attempts for a learner, newest first.
    async fn list_for_user(&self, user_id: &str, limit: u32) -> DomainResult<Vec<AssessmentAttempt>>;

    /// Look up an attempt by its idempotency key.
    async fn get_by_key(&self, attempt_key: &str) -> DomainResult<Option<AssessmentAttempt>>;
}
