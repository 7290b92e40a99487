//! Item generator implementations.

pub mod anthropic;
pub mod question_bank;

pub use anthropic::AnthropicItemGenerator;
pub use question_bank::QuestionBankGenerator;

use std::sync::Arc;

use crate::domain::errors::DomainResult;
use crate::domain::models::{GeneratorConfig, GeneratorKind, RateLimitConfig};
use crate::domain::ports::ItemGenerator;

/// Build the configured generator.
pub fn build_generator(
    config: &GeneratorConfig,
    rate_limit: &RateLimitConfig,
) -> DomainResult<Arc<dyn ItemGenerator>> {
    let generator: Arc<dyn ItemGenerator> = match config.kind {
        GeneratorKind::Bank => match &config.bank_path {
            Some(path) => Arc::new(QuestionBankGenerator::from_path(path)?),
            None => Arc::new(QuestionBankGenerator::embedded()?),
        },
        GeneratorKind::Anthropic => Arc::new(AnthropicItemGenerator::new(
            config.anthropic.clone(),
            rate_limit,
        )?),
    };
    tracing::info!(generator = generator.name(), "item generator ready");
    Ok(generator)
}
