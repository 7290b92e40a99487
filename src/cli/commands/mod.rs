//! CLI command implementations.

pub mod attempts;
pub mod profile;
pub mod quiz;
pub mod serve;
