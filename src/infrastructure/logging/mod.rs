//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber:
//! - JSON or pretty console output
//! - Rolling JSON log files with retention cleanup

pub mod logger;
pub mod retention;

pub use logger::{LoggerImpl, LOG_FILE_PREFIX};
pub use retention::prune_old_logs;
