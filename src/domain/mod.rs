//! Domain layer for the assessment engine
//!
//! Pure models, the transition function, errors and port traits.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
