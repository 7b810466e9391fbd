use serde_json::Value;

use crate::llm::{GatewayError, StructuredInvocation};

/// Tool call as reported by a provider, before selection.
#[derive(Clone, Debug, PartialEq)]
pub struct RawToolCall {
    pub name: String,
    pub arguments: ToolArguments,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ToolArguments {
    /// OpenAI-style JSON encoded string.
    Encoded(String),
    /// Anthropic-style inline object.
    Inline(Value),
}

/// Accepts exactly one call to `expected` whose arguments are a JSON object.
/// Anything else, including free text alongside no call, is a failed request.
pub fn select_single_invocation(
    calls: Vec<RawToolCall>,
    expected: &str,
    text_reply: Option<&str>,
) -> Result<StructuredInvocation, GatewayError> {
    let mut calls = calls.into_iter();
    let Some(call) = calls.next() else {
        let detail = match text_reply.map(str::trim).filter(|text| !text.is_empty()) {
            Some(text) => format!(
                "engine replied with free text instead of calling `{expected}`: {}",
                crate::llm::truncate(text, 160)
            ),
            None => format!("engine reply contained no call to `{expected}`"),
        };
        return Err(GatewayError::NoStructuredOutput(detail));
    };

    let extra = calls.count();
    if extra > 0 {
        return Err(GatewayError::NoStructuredOutput(format!(
            "engine made {} tool calls; exactly one call to `{expected}` is accepted",
            extra + 1
        )));
    }

    if call.name != expected {
        return Err(GatewayError::NoStructuredOutput(format!(
            "engine called `{}` instead of `{expected}`",
            call.name
        )));
    }

    let arguments = match call.arguments {
        ToolArguments::Encoded(raw) => serde_json::from_str::<Value>(&raw).map_err(|error| {
            GatewayError::NoStructuredOutput(format!(
                "arguments of `{expected}` are not valid JSON: {error}"
            ))
        })?,
        ToolArguments::Inline(value) => value,
    };

    if !arguments.is_object() {
        return Err(GatewayError::NoStructuredOutput(format!(
            "arguments of `{expected}` must be a JSON object"
        )));
    }

    Ok(StructuredInvocation { tool_name: call.name, arguments })
}
