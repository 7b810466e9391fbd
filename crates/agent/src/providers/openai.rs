//! Chat-completions adapter for OpenAI and OpenAI-compatible servers (Ollama).

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::llm::{truncate, GatewayError, GatewayRequest, ReasoningGateway, StructuredInvocation};
use crate::tools::{select_single_invocation, RawToolCall, ToolArguments};

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ChatToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ChatToolCall {
    function: ChatFunctionCall,
}

#[derive(Debug, Deserialize)]
struct ChatFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

pub struct OpenAiCompatibleGateway {
    client: Client,
    endpoint: String,
    api_key: Option<SecretString>,
    model: String,
    max_output_tokens: u32,
}

impl OpenAiCompatibleGateway {
    pub fn new(
        client: Client,
        base_url: &str,
        api_key: Option<SecretString>,
        model: &str,
        max_output_tokens: u32,
    ) -> Self {
        Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            model: model.to_string(),
            max_output_tokens,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ReasoningGateway for OpenAiCompatibleGateway {
    fn name(&self) -> &'static str {
        "openai_compatible"
    }

    async fn submit(&self, request: &GatewayRequest) -> Result<StructuredInvocation, GatewayError> {
        let payload = build_payload(request, &self.model, self.max_output_tokens);

        let mut builder = self.client.post(&self.endpoint).json(&payload);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key.expose_secret());
        }

        let response = builder.send().await?;
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
        "messages": [
            { "role": "system", "content": request.system_instruction },
            { "role": "user", "content": request.user_message() },
        ],
        "tools": [{
            "type": "function",
            "function": {
                "name": request.tool.name,
                "description": request.tool.description,
                "parameters": request.tool.parameters,
            }
        }],
        "tool_choice": { "type": "function", "function": { "name": request.tool.name } },
    })
}

pub fn parse_response(body: &str, expected_tool: &str) -> Result<StructuredInvocation, GatewayError> {
    let response: ChatResponse = serde_json::from_str(body).map_err(|error| {
        GatewayError::Transport(format!("reasoning engine returned an unreadable body: {error}"))
    })?;

    let Some(choice) = response.choices.into_iter().next() else {
        return Err(GatewayError::NoStructuredOutput("engine reply contained no choices".to_string()));
    };

    let calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| RawToolCall {
            name: call.function.name,
            arguments: ToolArguments::Encoded(call.function.arguments),
        })
        .collect();

    select_single_invocation(calls, expected_tool, choice.message.content.as_deref())
}
