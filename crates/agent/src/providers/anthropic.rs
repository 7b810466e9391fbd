use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::llm::{truncate, GatewayError, GatewayRequest, ReasoningGateway, StructuredInvocation};
use crate::tools::{select_single_invocation, RawToolCall, ToolArguments};

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Other,
}

pub struct AnthropicGateway {
    client: Client,
    endpoint: String,
    api_key: SecretString,
    model: String,
    max_output_tokens: u32,
}

impl AnthropicGateway {
    pub fn new(
        client: Client,
        base_url: &str,
        api_key: SecretString,
        model: &str,
        max_output_tokens: u32,
    ) -> Self {
        Self {
            client,
            endpoint: format!("{}/v1/messages", base_url.trim_end_matches('/')),
            api_key,
            model: model.to_string(),
            max_output_tokens,
        }
    }
}

#[async_trait]
impl ReasoningGateway for AnthropicGateway {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn submit(&self, request: &GatewayRequest) -> Result<StructuredInvocation, GatewayError> {
        let payload = build_payload(request, &self.model, self.max_output_tokens);

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(GatewayError::Transport(format!(
                "reasoning engine error {status}: {}",
                truncate(&body, 320)
            )));
        }

        parse_response(&body, &request.tool.name)
    }
}

pub fn build_payload(request: &GatewayRequest, model: &str, max_output_tokens: u32) -> Value {
    json!({
        "model": model,
        "max_tokens": max_output_tokens,
        "temperature": 0,
        "system": request.system_instruction,
        "messages": [{ "role": "user", "content": request.user_message() }],
        "tools": [{
            "name": request.tool.name,
            "description": request.tool.description,
            "input_schema": request.tool.parameters,
        }],
        "tool_choice": { "type": "tool", "name": request.tool.name },
    })
}

pub fn parse_response(body: &str, expected_tool: &str) -> Result<StructuredInvocation, GatewayError> {
    let response: MessagesResponse = serde_json::from_str(body).map_err(|error| {
        GatewayError::Transport(format!("reasoning engine returned an unreadable body: {error}"))
    })?;

    let mut calls = Vec::new();
    let mut text = String::new();
    for block in response.content {
        match block {
            ContentBlock::ToolUse { name, input } => {
                calls.push(RawToolCall { name, arguments: ToolArguments::Inline(input) });
            }
            ContentBlock::Text { text: fragment } => text.push_str(&fragment),
            ContentBlock::Other => {}
        }
    }

    select_single_invocation(calls, expected_tool, Some(&text))
}
