//! Complete backend response → client response

use serde_json::{Map, Value};

use crate::error::AdapterError;
use crate::ids;
use crate::mapper::to_client_stop_reason;
use crate::protocol::anthropic::{MessagesResponse, ResponseBlock, Role, StopReason, Usage};
use crate::protocol::openai::{ChatResponse, ResponseToolCall};
use crate::tokens;

/// Request-side facts the assembler needs
#[derive(Debug, Clone)]
pub struct AssembleContext {
    /// Model name the client asked for, echoed back
    pub client_model: String,
    /// Estimated input tokens, used when the backend omits usage
    pub estimated_input_tokens: u32,
}

/// Build a client response from one complete backend response
///
/// # Errors
///
/// Returns `AdapterError::Decode` when the backend response has no choices.
pub fn assemble(response: ChatResponse, context: &AssembleContext) -> Result<MessagesResponse, AdapterError> {
    let ChatResponse {
        id, choices, usage, ..
    } = response;

    let Some(choice) = choices.into_iter().next() else {
        return Err(AdapterError::Decode("backend response contained no choices".to_owned()));
    };

    let mut content = Vec::new();

    let text = choice
        .message
        .content
        .filter(|text| !text.is_empty())
        .or_else(|| choice.message.reasoning_content.filter(|text| !text.is_empty()));
    if let Some(text) = text {
        content.push(ResponseBlock::Text { text });
    }

    content.extend(choice.message.tool_calls.into_iter().flatten().map(tool_block));
    if let Some(function) = choice.message.function_call {
        content.push(tool_block(ResponseToolCall { id: None, function }));
    }

    let stop_reason = choice
        .finish_reason
        .as_deref()
        .map_or(StopReason::EndTurn, to_client_stop_reason);

    // Each count falls back to its estimate independently
    let reported = usage.unwrap_or_default();
    let usage = Usage {
        input_tokens: if reported.prompt_tokens > 0 {
            reported.prompt_tokens
        } else {
            context.estimated_input_tokens
        },
        output_tokens: if reported.completion_tokens > 0 {
            reported.completion_tokens
        } else {
            tokens::estimate_blocks(&content)
        },
    };

    Ok(MessagesResponse {
        id: ids::from_backend(id.as_deref()),
        response_type: "message".to_owned(),
        role: Role::Assistant,
        content,
        model: context.client_model.clone(),
        stop_reason: Some(stop_reason),
        stop_sequence: None,
        usage,
    })
}

fn tool_block(call: ResponseToolCall) -> ResponseBlock {
    let id = call
        .id
        .filter(|id| !ids::is_degenerate(id))
        .unwrap_or_else(ids::tool_use_id);

    let input = parse_arguments(&call.function.name, call.function.arguments);

    ResponseBlock::ToolUse {
        id,
        name: call.function.name,
        input,
    }
}

/// Parse tool arguments into a JSON object, degrading to `{}`
pub(crate) fn parse_arguments(tool: &str, arguments: Option<Value>) -> Value {
    let parsed = match arguments {
        None | Some(Value::Null) => return Value::Object(Map::new()),
        Some(Value::String(raw)) if raw.trim().is_empty() => return Value::Object(Map::new()),
        Some(Value::String(raw)) => serde_json::from_str::<Value>(&raw),
        Some(other) => Ok(other),
    };

    match parsed {
        Ok(value @ Value::Object(_)) => value,
        Ok(other) => {
            tracing::warn!(tool, kind = %json_kind(&other), "tool arguments are not an object, using empty input");
            Value::Object(Map::new())
        }
        Err(e) => {
            tracing::warn!(tool, error = %e, "unparseable tool arguments, using empty input");
            Value::Object(Map::new())
        }
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
