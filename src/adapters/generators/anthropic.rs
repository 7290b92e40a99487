//! Item generator backed by the Anthropic Messages API.
//!
//! Outbound calls share one token-bucket limiter, since every `next` call
//! fans out to three generations at once.

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AnthropicGeneratorConfig, AssessmentState, RateLimitConfig};
use crate::domain::ports::ItemGenerator;

const SYSTEM_PROMPT: &str = "You write multiple-choice assessment questions for learners. \
Respond with a single JSON object and nothing else, using exactly these fields: \
\"prompt\" (string), \"choices\" (array of 2 to 4 distinct strings), \
\"correctIndex\" (zero-based integer), \"explanation\" (one short sentence). \
Keep content age-appropriate.";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

/// Anthropic-backed [`ItemGenerator`].
pub struct AnthropicItemGenerator {
    config: AnthropicGeneratorConfig,
    api_key: String,
    client: Client,
    limiter: DefaultDirectRateLimiter,
}

impl AnthropicItemGenerator {
    /// # Errors
    /// `ValidationFailed` when no API key is available or the rate limit is
    /// not positive.
    pub fn new(config: AnthropicGeneratorConfig, rate_limit: &RateLimitConfig) -> DomainResult<Self> {
        let api_key = config
            .get_api_key()
            .ok_or_else(|| DomainError::ValidationFailed("ANTHROPIC_API_KEY not set".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DomainError::ValidationFailed(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            config,
            api_key,
            client,
            limiter: RateLimiter::direct(build_quota(rate_limit)?),
        })
    }

    fn user_prompt(state: &AssessmentState) -> String {
        format!(
            "Write one {} question for the {} course in {}. This is question {} of {}.",
            state.difficulty, state.course, state.subject, state.step, state.max_steps
        )
    }
}

fn build_quota(rate_limit: &RateLimitConfig) -> DomainResult<Quota> {
    let invalid = || {
        DomainError::ValidationFailed(format!(
            "invalid rate limit: {} requests/s, burst {}",
            rate_limit.requests_per_second, rate_limit.burst_size
        ))
    };
    if !(rate_limit.requests_per_second.is_finite() && rate_limit.requests_per_second > 0.0) {
        return Err(invalid());
    }
    let burst = NonZeroU32::new(rate_limit.burst_size).ok_or_else(invalid)?;
    Quota::with_period(Duration::from_secs_f64(1.0 / rate_limit.requests_per_second))
        .map(|quota| quota.allow_burst(burst))
        .ok_or_else(invalid)
}

#[async_trait]
impl ItemGenerator for AnthropicItemGenerator {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn generate(&self, state: &AssessmentState) -> DomainResult<String> {
        self.limiter.until_ready().await;

        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            system: SYSTEM_PROMPT,
            messages: vec![Message {
                role: "user",
                content: Self::user_prompt(state),
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.base_url.trim_end_matches('/')))
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.config.api_version)
            .json(&request)
            .send()
            .await
            .map_err(|e| DomainError::GenerationFailed(format!("API request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DomainError::GenerationFailed(format!("API error {status}: {body}")));
        }

        let result: MessagesResponse = response
            .json()
            .await
            .map_err(|e| DomainError::GenerationFailed(format!("Failed to parse response: {e}")))?;

        let text = result
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        debug!(step = state.step, difficulty = %state.difficulty, bytes = text.len(), "anthropic item received");
        Ok(text)
    }
}
