//! Client side of the speculation protocol.
//!
//! [`PrefetchController`] keeps one session's state and a background
//! prefetch of the next turn's branches; [`AssessmentTransport`] carries its
//! requests either over HTTP or straight into the engine's services.

pub mod controller;
pub mod transport;

pub use controller::{
    BranchReadiness, ControllerError, PrefetchController, ProceedOutcome, SessionSummary,
};
pub use transport::{AssessmentTransport, ClientError, HttpTransport, InProcessTransport};
