use serde::{Deserialize, Serialize};

use super::assessment::Difficulty;
use super::attempt::NEUTRAL_ACCURACY;

/// Main configuration structure for the assessor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Assessment session defaults
    #[serde(default)]
    pub assessment: AssessmentConfig,

    /// Item generator configuration
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Rate limit applied to outbound generator calls
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Downstream path builder configuration
    #[serde(default)]
    pub path_builder: PathBuilderConfig,

    /// Retry policy for path builder calls
    #[serde(default)]
    pub retry: RetryConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    9180
}

const fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            enable_cors: true,
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".assessor/assessor.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    pub fn url(&self) -> String {
        if self.path.starts_with("sqlite:") {
            self.path.clone()
        } else {
            format!("sqlite:{}", self.path)
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Log file rotation policy
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    #[default]
    Daily,
    Hourly,
    Never,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: LogFormat,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    #[serde(default)]
    pub rotation: RotationPolicy,

    /// Number of days to retain logs
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    #[serde(default = "default_true")]
    pub enable_console: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

const fn default_retention_days() -> u32 {
    30
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: RotationPolicy::default(),
            retention_days: default_retention_days(),
            enable_console: true,
        }
    }
}

/// Assessment session defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AssessmentConfig {
    /// Questions per session
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    #[serde(default)]
    pub starting_difficulty: Difficulty,

    /// Used when neither the request nor the learner profile names a subject
    #[serde(default = "default_subject")]
    pub default_subject: String,

    #[serde(default = "default_course")]
    pub default_course: String,

    /// Bound on the three-way generation fan-in
    #[serde(default = "default_fan_in_timeout_secs")]
    pub fan_in_timeout_secs: u64,

    /// Accuracy recorded for a session that answered nothing
    #[serde(default = "default_neutral_accuracy")]
    pub neutral_accuracy: f64,
}

const fn default_max_steps() -> u32 {
    6
}

fn default_subject() -> String {
    "Math".to_string()
}

fn default_course() -> String {
    "Algebra 1".to_string()
}

const fn default_fan_in_timeout_secs() -> u64 {
    10
}

const fn default_neutral_accuracy() -> f64 {
    NEUTRAL_ACCURACY
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            starting_difficulty: Difficulty::default(),
            default_subject: default_subject(),
            default_course: default_course(),
            fan_in_timeout_secs: default_fan_in_timeout_secs(),
            neutral_accuracy: default_neutral_accuracy(),
        }
    }
}

/// Which item generator backs the adapter
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorKind {
    /// Offline YAML question bank
    #[default]
    Bank,
    /// Anthropic Messages API
    Anthropic,
}

impl GeneratorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bank => "bank",
            Self::Anthropic => "anthropic",
        }
    }
}

/// Item generator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GeneratorConfig {
    #[serde(default)]
    pub kind: GeneratorKind,

    /// Question bank file; the embedded bank is used when unset
    #[serde(default)]
    pub bank_path: Option<String>,

    #[serde(default)]
    pub anthropic: AnthropicGeneratorConfig,

    /// Case-insensitive regular expressions; a match discards the item
    #[serde(default = "default_deny_patterns")]
    pub deny_patterns: Vec<String>,
}

fn default_deny_patterns() -> Vec<String> {
    vec![
        r"\b(kill|suicide|self[- ]harm)\b".to_string(),
        r"\b(porn|sexual)\b".to_string(),
        r"\b(bomb|explosive|firearm)s?\b".to_string(),
        r"ignore (all )?previous instructions".to_string(),
    ]
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            kind: GeneratorKind::default(),
            bank_path: None,
            anthropic: AnthropicGeneratorConfig::default(),
            deny_patterns: default_deny_patterns(),
        }
    }
}

/// Anthropic Messages API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AnthropicGeneratorConfig {
    /// Read from `ANTHROPIC_API_KEY` when unset
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_anthropic_base_url")]
    pub base_url: String,

    #[serde(default = "default_anthropic_model")]
    pub model: String,

    #[serde(default = "default_anthropic_version")]
    pub api_version: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_generator_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-5-haiku-20241022".to_string()
}

fn default_anthropic_version() -> String {
    "2023-06-01".to_string()
}

const fn default_max_tokens() -> u32 {
    600
}

const fn default_generator_timeout_secs() -> u64 {
    20
}

impl Default for AnthropicGeneratorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_anthropic_base_url(),
            model: default_anthropic_model(),
            api_version: default_anthropic_version(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_generator_timeout_secs(),
        }
    }
}

impl AnthropicGeneratorConfig {
    /// Get API key from config or environment.
    pub fn get_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RateLimitConfig {
    /// Requests per second allowed
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: f64,

    /// Burst size for token bucket
    #[serde(default = "default_burst_size")]
    pub burst_size: u32,
}

const fn default_requests_per_second() -> f64 {
    10.0
}

const fn default_burst_size() -> u32 {
    6
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_requests_per_second(),
            burst_size: default_burst_size(),
        }
    }
}

/// Downstream path builder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PathBuilderConfig {
    /// Endpoint receiving path requests; paths are not built when unset
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_path_timeout_secs")]
    pub timeout_secs: u64,
}

const fn default_path_timeout_secs() -> u64 {
    30
}

impl Default for PathBuilderConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: default_path_timeout_secs(),
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Initial backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Give up after this much total retrying
    #[serde(default = "default_max_elapsed_ms")]
    pub max_elapsed_ms: u64,
}

const fn default_initial_backoff_ms() -> u64 {
    500
}

const fn default_max_backoff_ms() -> u64 {
    10_000
}

const fn default_max_elapsed_ms() -> u64 {
    60_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            max_elapsed_ms: default_max_elapsed_ms(),
        }
    }
}
