//! Port trait definitions (Hexagonal Architecture)
//!
//! Async trait interfaces that adapters must implement:
//! - ItemGenerator: raw question generation
//! - ProfileStore: learner profile lookup for bootstrap
//! - AttemptRepository: finished attempt persistence
//! - PathBuilder: downstream learning path trigger

pub mod attempt_repository;
pub mod item_generator;
pub mod path_builder;
pub mod profile_store;

pub use attempt_repository::AttemptRepository;
pub use item_generator::ItemGenerator;
pub use path_builder::{NullPathBuilder, PathBuilder};
pub use profile_store::{LearnerProfile, ProfileStore};
