//! Infrastructure adapters for external systems.

pub mod generators;
pub mod http;
pub mod http_path_builder;
pub mod sqlite;

pub use http_path_builder::HttpPathBuilder;
