use std::time::Duration;

use async_trait::async_trait;
use restock_core::config::{LlmConfig, LlmProvider};
use restock_core::errors::PlanError;
use restock_core::policy::ToolDefinition;
use serde_json::Value;
use thiserror::Error;

use crate::providers::{AnthropicGateway, OpenAiCompatibleGateway};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

/// Everything the engine sees for one invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct GatewayRequest {
    pub system_instruction: String,
    /// Opaque calendar annex; rendered verbatim next to the request text.
    pub context_annex: Value,
    pub user_prompt: String,
    pub tool: ToolDefinition,
}

impl GatewayRequest {
    pub fn user_message(&self) -> String {
        format!("CALENDAR CONTEXT ANNEX:\n{}\n\n{}", self.context_annex, self.user_prompt)
    }
}

/// The single structured call the engine made, still untyped.
#[derive(Clone, Debug, PartialEq)]
pub struct StructuredInvocation {
    pub tool_name: String,
    pub arguments: Value,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("{0}")]
    Transport(String),
    #[error("{0}")]
    NoStructuredOutput(String),
}

impl From<GatewayError> for PlanError {
    fn from(error: GatewayError) -> Self {
        match error {
            GatewayError::Transport(message) => PlanError::Transport(message),
            GatewayError::NoStructuredOutput(message) => PlanError::NoStructuredOutput(message),
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Transport(format!("reasoning engine timed out: {error}"))
        } else {
            Self::Transport(format!("reasoning engine request failed: {error}"))
        }
    }
}

/// Boundary to the external reasoning engine. One call per invocation, no retries.
#[async_trait]
pub trait ReasoningGateway: Send + Sync {
    fn name(&self) -> &'static str;
    async fn submit(&self, request: &GatewayRequest) -> Result<StructuredInvocation, GatewayError>;
}

pub fn build_http_client(timeout_secs: u64) -> Result<reqwest::Client, GatewayError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .build()
        .map_err(|error| GatewayError::Transport(format!("failed to build HTTP client: {error}")))
}

pub fn build_gateway(config: &LlmConfig) -> Result<Box<dyn ReasoningGateway>, GatewayError> {
    let client = build_http_client(config.timeout_secs)?;

    let gateway: Box<dyn ReasoningGateway> = match config.provider {
        LlmProvider::OpenAi => Box::new(OpenAiCompatibleGateway::new(
            client,
            config.base_url.as_deref().unwrap_or(DEFAULT_OPENAI_BASE_URL),
            config.api_key.clone(),
            &config.model,
            config.max_output_tokens,
        )),
        LlmProvider::Ollama => Box::new(OpenAiCompatibleGateway::new(
            client,
            config.base_url.as_deref().unwrap_or("http://localhost:11434/v1"),
            config.api_key.clone(),
            &config.model,
            config.max_output_tokens,
        )),
        LlmProvider::Anthropic => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                GatewayError::Transport("anthropic provider requires llm.api_key".to_string())
            })?;
            Box::new(AnthropicGateway::new(
                client,
                config.base_url.as_deref().unwrap_or(DEFAULT_ANTHROPIC_BASE_URL),
                api_key,
                &config.model,
                config.max_output_tokens,
            ))
        }
    };

    Ok(gateway)
}

pub(crate) fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let mut truncated: String = value.chars().take(max_chars).collect();
    truncated.push_str("...");
    truncated
}
