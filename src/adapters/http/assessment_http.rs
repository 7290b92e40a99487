//! Assessment HTTP server.
//!
//! Exposes the stateless `next` and `finish` operations. Every request
//! carries the full session state; the server keeps nothing between calls.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::domain::errors::DomainError;
use crate::domain::models::{FinishRequest, FinishResponse, NextRequest, NextResponse, ServerConfig};
use crate::services::{SessionFinalizer, SpeculationCoordinator};

/// Header naming the calling learner.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Learner id used when the header is absent.
pub const ANONYMOUS_USER: &str = "anonymous";

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Shared state for the assessment HTTP server.
pub struct AppState {
    pub coordinator: Arc<SpeculationCoordinator>,
    pub finalizer: Arc<SessionFinalizer>,
}

/// Assessment HTTP server.
pub struct AssessmentHttpServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl AssessmentHttpServer {
    pub fn new(state: AppState, config: ServerConfig) -> Self {
        Self {
            config,
            state: Arc::new(state),
        }
    }

    /// Start the server with a shutdown signal.
    pub async fn serve_with_shutdown<F>(
        self,
        shutdown: F,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port).parse()?;
        let router = build_router(self.state, self.config.enable_cors);

        tracing::info!("Assessment HTTP server listening on {}", addr);

        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

/// Build the router.
pub fn build_router(state: Arc<AppState>, enable_cors: bool) -> Router {
    let app = Router::new()
        .route("/assessment/next", post(next_turn))
        .route("/assessment/finish", post(finish_session))
        .route("/health", get(health_check))
        .with_state(state);

    if enable_cors {
        app.layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
            .layer(TraceLayer::new_for_http())
    } else {
        app.layer(TraceLayer::new_for_http())
    }
}

// Handler functions

async fn health_check() -> &'static str {
    "OK"
}

async fn next_turn(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<NextRequest>, JsonRejection>,
) -> Result<Json<NextResponse>, ApiError> {
    let Json(request) = body.map_err(rejection_error)?;
    let user_id = user_id(&headers);

    state
        .coordinator
        .next(&user_id, request)
        .await
        .map(Json)
        .map_err(domain_error)
}

async fn finish_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<FinishRequest>, JsonRejection>,
) -> Result<Json<FinishResponse>, ApiError> {
    let Json(request) = body.map_err(rejection_error)?;
    let user_id = user_id(&headers);

    // Storage outcomes are the server's concern; the learner only needs an ack.
    state
        .finalizer
        .finish(&user_id, &request)
        .await
        .map_err(domain_error)?;

    Ok(Json(FinishResponse { ok: true }))
}

fn user_id(headers: &HeaderMap) -> String {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(ANONYMOUS_USER)
        .to_string()
}

fn error_response(status: StatusCode, code: &str, error: String) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error,
            code: code.to_string(),
        }),
    )
}

fn rejection_error(rejection: JsonRejection) -> ApiError {
    error_response(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", rejection.body_text())
}

fn domain_error(err: DomainError) -> ApiError {
    let (status, code) = match &err {
        DomainError::ValidationFailed(_) | DomainError::SerializationError(_) => {
            (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
        }
        DomainError::InvalidStateTransition { .. } => (StatusCode::BAD_REQUEST, "INVALID_TRANSITION"),
        DomainError::GenerationTimeout(_) => (StatusCode::GATEWAY_TIMEOUT, "GENERATION_TIMEOUT"),
        DomainError::ProfileUnavailable(_) => (StatusCode::BAD_GATEWAY, "PROFILE_UNAVAILABLE"),
        _ => {
            tracing::error!(error = %err, "request failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
        }
    };
    error_response(status, code, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_user_id_defaults_to_anonymous() {
        let mut headers = HeaderMap::new();
        assert_eq!(user_id(&headers), ANONYMOUS_USER);

        headers.insert(USER_ID_HEADER, "  ".parse().unwrap());
        assert_eq!(user_id(&headers), ANONYMOUS_USER);

        headers.insert(USER_ID_HEADER, "learner-7".parse().unwrap());
        assert_eq!(user_id(&headers), "learner-7");
    }

    #[test]
    fn test_domain_error_status_mapping() {
        let cases = [
            (DomainError::ValidationFailed("x".into()), StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            (
                DomainError::InvalidStateTransition { reason: "done".into() },
                StatusCode::BAD_REQUEST,
                "INVALID_TRANSITION",
            ),
            (
                DomainError::GenerationTimeout(Duration::from_secs(10)),
                StatusCode::GATEWAY_TIMEOUT,
                "GENERATION_TIMEOUT",
            ),
            (DomainError::ProfileUnavailable("db".into()), StatusCode::BAD_GATEWAY, "PROFILE_UNAVAILABLE"),
            (DomainError::DatabaseError("db".into()), StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        ];

        for (err, status, code) in cases {
            let (actual_status, Json(body)) = domain_error(err);
            assert_eq!(actual_status, status);
            assert_eq!(body.code, code);
        }
    }
}
