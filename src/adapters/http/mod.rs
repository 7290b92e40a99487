//! HTTP surface of the assessment engine.

pub mod assessment_http;

pub use assessment_http::{
    build_router, AppState, AssessmentHttpServer, ErrorResponse, ANONYMOUS_USER, USER_ID_HEADER,
};
