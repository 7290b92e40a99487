//! Domain models for the assessment engine.

pub mod assessment;
pub mod attempt;
pub mod config;
pub mod protocol;
pub mod transition;

pub use assessment::{AssessmentItem, AssessmentState, Difficulty, SubjectCourse};
pub use attempt::{accuracy, AssessmentAttempt, LearningPath, PathRequest, NEUTRAL_ACCURACY};
pub use config::{
    AnthropicGeneratorConfig, AssessmentConfig, Config, DatabaseConfig, GeneratorConfig,
    GeneratorKind, LogFormat, LoggingConfig, PathBuilderConfig, RateLimitConfig, RetryConfig,
    RotationPolicy, ServerConfig,
};
pub use protocol::{
    Branch, Branches, FinishRequest, FinishResponse, NextRequest, NextResponse, SpeculationKey,
};
pub use transition::{advance, branch_states};
