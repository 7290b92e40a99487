//! Common test utilities for integration tests
//!
//! Provides an engine wired on an in-memory database and helpers for
//! driving its HTTP router without binding a socket.

use adaptive_assessor::adapters::http::{build_router, USER_ID_HEADER};
use adaptive_assessor::adapters::sqlite::create_migrated_test_pool;
use adaptive_assessor::cli::Engine;
use adaptive_assessor::domain::models::Config;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
#[allow(dead_code)]
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Engine with the default configuration on a fresh in-memory database.
pub async fn test_engine() -> Engine {
    test_engine_with(Config::default()).await
}

#[allow(dead_code)]
pub async fn test_engine_with(config: Config) -> Engine {
    let pool = create_migrated_test_pool()
        .await
        .expect("Failed to create test database");
    Engine::with_pool(&config, pool).expect("Failed to wire engine")
}

#[allow(dead_code)]
pub fn router(engine: &Engine) -> Router {
    build_router(std::sync::Arc::new(engine.app_state()), false)
}

/// POST a JSON body and return the status with the parsed response body.
#[allow(dead_code)]
pub async fn post_json(router: &Router, path: &str, user: Option<&str>, body: &Value) -> (StatusCode, Value) {
    post_raw(router, path, user, body.to_string()).await
}

#[allow(dead_code)]
pub async fn post_raw(router: &Router, path: &str, user: Option<&str>, body: String) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json");
    if let Some(user) = user {
        request = request.header(USER_ID_HEADER, user);
    }
    let request = request.body(Body::from(body)).expect("Failed to build request");

    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("Router is infallible");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}
