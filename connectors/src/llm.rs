//! Language model client.
//!
//! Structured completions only: every call asks the model for a JSON
//! document and parses it, tolerating markdown code fences. Requests are
//! rate limited client-side.

use std::num::NonZeroU32;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use serde::de::DeserializeOwned;
use tracing::debug;

use common::config::LlmConfig;

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// One structured completion: the reply must be a single JSON value.
    async fn complete_json(&self, system: &str, user: &str) -> Result<serde_json::Value>;
}

/// Deserialize a structured completion into a target schema.
pub async fn structured<T: DeserializeOwned>(
    model: &dyn LanguageModel,
    system: &str,
    user: &str,
) -> Result<T> {
    let value = model.complete_json(system, user).await?;
    serde_json::from_value(value).context("LLM output did not match the expected schema")
}

#[derive(Clone)]
pub struct OpenAiModel {
    client: Client<OpenAIConfig>,
    cfg: LlmConfig,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl OpenAiModel {
    pub fn new(cfg: LlmConfig) -> Self {
        let rpm = NonZeroU32::new(cfg.rate_limit_rpm).unwrap_or(NonZeroU32::new(1).unwrap());
        let limiter = Arc::new(RateLimiter::direct(Quota::per_minute(rpm)));

        let openai_config = OpenAIConfig::new()
            .with_api_key(&cfg.api_key)
            .with_api_base(&cfg.base_url);
        let client = Client::with_config(openai_config);

        Self {
            client,
            cfg,
            limiter,
        }
    }

    pub fn model(&self) -> &str {
        &self.cfg.model
    }
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    async fn complete_json(&self, system: &str, user: &str) -> Result<serde_json::Value> {
        self.limiter.until_ready().await;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.cfg.model)
            .messages([
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system)
                    .build()?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user)
                    .build()?
                    .into(),
            ])
            .build()?;

        debug!("calling {} with model {}", self.cfg.base_url, self.cfg.model);

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .context("LLM request failed")?;

        let choice = response
            .choices
            .first()
            .context("no choices in LLM response")?;
        let content = choice
            .message
            .content
            .as_ref()
            .context("no content in LLM response")?;

        parse_json_content(content)
    }
}

/// Parse a model reply as JSON, stripping markdown code fences.
pub fn parse_json_content(raw: &str) -> Result<serde_json::Value> {
    let clean = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    serde_json::from_str(clean).with_context(|| format!("failed to parse LLM JSON: {}", clean))
}
