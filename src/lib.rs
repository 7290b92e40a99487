//! Adaptive Assessor - adaptive diagnostic assessments with speculative
//! branch prefetching.
//!
//! A learner answers multiple-choice questions whose difficulty climbs or
//! drops with each answer. Every turn the engine also generates the items
//! for both possible outcomes of the current question, so a client can move
//! on without waiting for a round trip. The protocol is stateless: the whole
//! session state travels in each request.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): the state machine, wire messages and ports
//! - **Service Layer** (`services`): speculation fan-out, item adaptation,
//!   session finalization
//! - **Adapters** (`adapters`): SQLite persistence, item generators, the
//!   HTTP server and the learning path client
//! - **Client** (`client`): the prefetch controller and its transports
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use adaptive_assessor::cli::Engine;
//! use adaptive_assessor::client::{InProcessTransport, PrefetchController};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = adaptive_assessor::ConfigLoader::load()?;
//!     let engine = Engine::build(&config).await?;
//!     let transport = InProcessTransport::new(engine.coordinator, engine.finalizer, "ada");
//!     let mut controller = PrefetchController::new(std::sync::Arc::new(transport));
//!     controller.start(Default::default()).await?;
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod client;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    advance, AssessmentItem, AssessmentState, Config, Difficulty, FinishRequest, NextRequest,
    NextResponse, SubjectCourse,
};
pub use domain::ports::{AttemptRepository, ItemGenerator, PathBuilder, ProfileStore};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{SessionFinalizer, SpeculationCoordinator};
