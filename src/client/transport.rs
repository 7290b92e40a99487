//! Transports carrying the assessment protocol from a client to the engine.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::domain::errors::DomainError;
use crate::domain::models::{FinishRequest, FinishResponse, NextRequest, NextResponse};
use crate::services::{SessionFinalizer, SpeculationCoordinator};

/// Header naming the calling learner.
const USER_ID_HEADER: &str = "x-user-id";

/// Client-side failures, split by what the caller should do next.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// Generation did not finish in time; reissue the same state.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The engine refused the request; retrying it unchanged will not help.
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),
}

impl ClientError {
    /// Whether reissuing the identical request may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }
}

impl From<DomainError> for ClientError {
    fn from(err: DomainError) -> Self {
        let message = err.to_string();
        match err {
            DomainError::GenerationTimeout(_) => Self::Timeout(message),
            DomainError::ValidationFailed(_)
            | DomainError::InvalidStateTransition { .. }
            | DomainError::SerializationError(_) => Self::Rejected {
                status: 400,
                message,
            },
            DomainError::ProfileUnavailable(_) => Self::Server {
                status: 502,
                message,
            },
            _ => Self::Server {
                status: 500,
                message,
            },
        }
    }
}

/// The two protocol operations as seen by a client.
#[async_trait]
pub trait AssessmentTransport: Send + Sync + 'static {
    async fn next(&self, request: NextRequest) -> Result<NextResponse, ClientError>;

    async fn finish(&self, request: FinishRequest) -> Result<FinishResponse, ClientError>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Talks to an `assessor serve` instance over HTTP.
pub struct HttpTransport {
    base_url: String,
    user_id: String,
    client: Client,
}

impl HttpTransport {
    pub fn new(
        base_url: impl Into<String>,
        user_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_id: user_id.into(),
            client,
        })
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, ClientError>
    where
        B: serde::Serialize + Sync,
        R: serde::de::DeserializeOwned,
    {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .header(USER_ID_HEADER, &self.user_id)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClientError::Timeout(e.to_string())
                } else {
                    ClientError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| ClientError::Transport(format!("Failed to parse response: {e}")));
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text).map_or(text, |body| body.error);
        Err(match status {
            StatusCode::GATEWAY_TIMEOUT => ClientError::Timeout(message),
            s if s.is_client_error() => ClientError::Rejected {
                status: s.as_u16(),
                message,
            },
            s => ClientError::Server {
                status: s.as_u16(),
                message,
            },
        })
    }
}

#[async_trait]
impl AssessmentTransport for HttpTransport {
    async fn next(&self, request: NextRequest) -> Result<NextResponse, ClientError> {
        self.post("/assessment/next", &request).await
    }

    async fn finish(&self, request: FinishRequest) -> Result<FinishResponse, ClientError> {
        self.post("/assessment/finish", &request).await
    }
}

/// Calls the engine's services directly, without a server.
pub struct InProcessTransport {
    coordinator: Arc<SpeculationCoordinator>,
    finalizer: Arc<SessionFinalizer>,
    user_id: String,
}

impl InProcessTransport {
    pub fn new(
        coordinator: Arc<SpeculationCoordinator>,
        finalizer: Arc<SessionFinalizer>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            coordinator,
            finalizer,
            user_id: user_id.into(),
        }
    }
}

#[async_trait]
impl AssessmentTransport for InProcessTransport {
    async fn next(&self, request: NextRequest) -> Result<NextResponse, ClientError> {
        Ok(self.coordinator.next(&self.user_id, request).await?)
    }

    async fn finish(&self, request: FinishRequest) -> Result<FinishResponse, ClientError> {
        // Path generation keeps running detached, as it would behind the server.
        self.finalizer.finish(&self.user_id, &request).await?;
        Ok(FinishResponse { ok: true })
    }
}
