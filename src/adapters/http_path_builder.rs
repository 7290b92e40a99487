//! HTTP client for the downstream learning path builder.
//!
//! Transient failures (connect errors, timeouts, 429 and 5xx) are retried
//! with exponential backoff; other 4xx responses fail immediately.

use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::warn;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{LearningPath, PathBuilderConfig, PathRequest, RetryConfig};
use crate::domain::ports::PathBuilder;

pub struct HttpPathBuilder {
    url: String,
    client: Client,
    retry: RetryConfig,
}

impl HttpPathBuilder {
    pub fn new(url: impl Into<String>, config: &PathBuilderConfig, retry: RetryConfig) -> DomainResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DomainError::ValidationFailed(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            url: url.into(),
            client,
            retry,
        })
    }

    async fn send_once(&self, request: &PathRequest) -> Result<LearningPath, backoff::Error<DomainError>> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| backoff::Error::transient(DomainError::PathBuilderFailed(e.to_string())))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = DomainError::PathBuilderFailed(format!("{status}: {body}"));
            return Err(if is_transient(status) {
                warn!(%status, "path builder unavailable, retrying");
                backoff::Error::transient(err)
            } else {
                backoff::Error::permanent(err)
            });
        }

        response
            .json()
            .await
            .map_err(|e| backoff::Error::permanent(DomainError::PathBuilderFailed(e.to_string())))
    }
}

fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[async_trait]
impl PathBuilder for HttpPathBuilder {
    async fn generate(&self, request: &PathRequest) -> DomainResult<LearningPath> {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.retry.initial_backoff_ms))
            .with_max_interval(Duration::from_millis(self.retry.max_backoff_ms))
            .with_max_elapsed_time(Some(Duration::from_millis(self.retry.max_elapsed_ms)))
            .build();

        backoff::future::retry(policy, || async move { self.send_once(request).await }).await
    }
}
