//! Client request → backend request mapping
//!
//! Pure and stateless. Text and tool-call round trips are lossless: a
//! `tool_use` the assistant made earlier comes back as a `tool_calls`
//! entry, and its `tool_result` as a `tool` message with the same id.

use std::collections::HashSet;

use serde_json::{Value, json};
use switchboard_config::ModelsConfig;

use crate::error::AdapterError;
use crate::protocol::anthropic::{
    ContentPart, ImageSource, InputMessage, MessageContent, MessagesRequest, Role, StopReason, ToolChoice,
    ToolDefinition,
};
use crate::protocol::openai::{
    ChatContent, ChatContentPart, ChatMessage, ChatRequest, FunctionCall, FunctionDefinition, ImageUrl,
    StreamOptions, Tool, ToolCall,
};

/// Settings that shape the backend request
#[derive(Debug, Clone, Copy)]
pub struct MappingOptions<'a> {
    /// Model name translation
    pub models: &'a ModelsConfig,
    /// Output bound used when the client omits `max_tokens`
    pub default_max_tokens: u32,
    /// Request a trailing usage chunk on streams
    pub stream_usage: bool,
}

/// Map a backend finish reason onto the client stop-reason vocabulary
///
/// Total: unknown reasons map to `end_turn`.
pub fn to_client_stop_reason(reason: &str) -> StopReason {
    match reason {
        "length" => StopReason::MaxTokens,
        "content_filter" => StopReason::StopSequence,
        "tool_calls" | "function_call" => StopReason::ToolUse,
        _ => StopReason::EndTurn,
    }
}

/// Check request invariants before any backend call
///
/// # Errors
///
/// Returns `AdapterError::InvalidRequest` for an empty message list,
/// duplicate tool names, or a zero output bound.
pub fn validate(request: &MessagesRequest) -> Result<(), AdapterError> {
    if request.messages.is_empty() {
        return Err(AdapterError::InvalidRequest("messages: at least one message is required".to_owned()));
    }

    if request.max_tokens == Some(0) {
        return Err(AdapterError::InvalidRequest("max_tokens: must be greater than 0".to_owned()));
    }

    let mut names = HashSet::new();
    for tool in request.tools.iter().flatten() {
        if tool.name.trim().is_empty() {
            return Err(AdapterError::InvalidRequest("tools: tool name must not be empty".to_owned()));
        }
        if !names.insert(tool.name.as_str()) {
            return Err(AdapterError::InvalidRequest(format!(
                "tools: tool names must be unique, '{}' is repeated",
                tool.name
            )));
        }
    }

    if let Some(ToolChoice::Tool { name }) = &request.tool_choice
        && !names.contains(name.as_str())
    {
        return Err(AdapterError::InvalidRequest(format!(
            "tool_choice: tool '{name}' is not defined"
        )));
    }

    Ok(())
}

/// Translate a client request into a backend request
///
/// # Errors
///
/// Returns `AdapterError::InvalidRequest` when the request violates an
/// invariant or no backend model can be determined.
pub fn to_backend_request(
    request: &MessagesRequest,
    options: &MappingOptions<'_>,
) -> Result<ChatRequest, AdapterError> {
    validate(request)?;

    let model = options.models.resolve(&request.model);
    if model.trim().is_empty() {
        return Err(AdapterError::InvalidRequest("model: a model name is required".to_owned()));
    }

    let mut messages = Vec::with_capacity(request.messages.len() + 1);

    if let Some(system) = &request.system {
        let text = system.text();
        if !text.is_empty() {
            messages.push(ChatMessage::text("system", text));
        }
    }

    for message in &request.messages {
        map_message(message, &mut messages);
    }

    let stream = request.is_stream();

    Ok(ChatRequest {
        model: model.to_owned(),
        messages,
        max_tokens: Some(request.max_tokens.unwrap_or(options.default_max_tokens)),
        temperature: request.temperature,
        top_p: request.top_p,
        stop: request.stop_sequences.clone().filter(|stop| !stop.is_empty()),
        stream: stream.then_some(true),
        stream_options: (stream && options.stream_usage).then_some(StreamOptions { include_usage: true }),
        tools: request
            .tools
            .as_ref()
            .filter(|tools| !tools.is_empty())
            .map(|tools| tools.iter().map(map_tool).collect()),
        tool_choice: request.tool_choice.as_ref().map(map_tool_choice),
    })
}

fn map_message(message: &InputMessage, out: &mut Vec<ChatMessage>) {
    let parts = match &message.content {
        MessageContent::Text(text) => {
            out.push(ChatMessage::text(role_name(message.role), text.clone()));
            return;
        }
        MessageContent::Parts(parts) => parts,
    };

    match message.role {
        Role::Assistant => map_assistant_parts(parts, out),
        Role::User => map_user_parts(parts, out),
        Role::System => {
            let text = joined_text(parts);
            if !text.is_empty() {
                out.push(ChatMessage::text("system", text));
            }
        }
    }
}

const fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
    }
}

fn joined_text(parts: &[ContentPart]) -> String {
    parts
        .iter()
        .filter_map(|part| match part {
            ContentPart::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn map_assistant_parts(parts: &[ContentPart], out: &mut Vec<ChatMessage>) {
    let text = joined_text(parts);

    let tool_calls: Vec<ToolCall> = parts
        .iter()
        .filter_map(|part| match part {
            ContentPart::ToolUse { id, name, input } => Some(ToolCall {
                id: id.clone(),
                tool_type: "function".to_owned(),
                function: FunctionCall {
                    name: name.clone(),
                    arguments: tool_arguments(input),
                },
            }),
            _ => None,
        })
        .collect();

    if text.is_empty() && tool_calls.is_empty() {
        return;
    }

    out.push(ChatMessage {
        role: "assistant".to_owned(),
        content: (!text.is_empty() || tool_calls.is_empty()).then_some(ChatContent::Text(text)),
        tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
        tool_call_id: None,
    });
}

fn tool_arguments(input: &Value) -> String {
    match input {
        Value::Null => "{}".to_owned(),
        other => other.to_string(),
    }
}

fn map_user_parts(parts: &[ContentPart], out: &mut Vec<ChatMessage>) {
    for part in parts {
        if let ContentPart::ToolResult {
            tool_use_id,
            content,
            is_error,
        } = part
        {
            let mut text = tool_result_text(content.as_ref());
            if is_error.unwrap_or(false) && !text.starts_with("Error") {
                text = format!("Error: {text}");
            }

            out.push(ChatMessage {
                role: "tool".to_owned(),
                content: Some(ChatContent::Text(text)),
                tool_calls: None,
                tool_call_id: Some(tool_use_id.clone()),
            });
        }
    }

    let rest: Vec<ChatContentPart> = parts
        .iter()
        .filter_map(|part| match part {
            ContentPart::Text { text } => Some(ChatContentPart::Text { text: text.clone() }),
            ContentPart::Image { source } => image_part(source),
            ContentPart::ToolUse { .. } | ContentPart::ToolResult { .. } => None,
            ContentPart::Unsupported => {
                tracing::debug!("dropping unsupported user content part");
                None
            }
        })
        .collect();

    if rest.is_empty() {
        return;
    }

    let has_images = rest.iter().any(|part| matches!(part, ChatContentPart::ImageUrl { .. }));
    let content = if has_images {
        ChatContent::Parts(rest)
    } else {
        ChatContent::Text(joined_text(parts))
    };

    out.push(ChatMessage {
        role: "user".to_owned(),
        content: Some(content),
        tool_calls: None,
        tool_call_id: None,
    });
}

/// Flatten a tool result into the string a `tool` message carries
fn tool_result_text(content: Option<&Value>) -> String {
    match content {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(items)) => {
            let texts: Option<Vec<&str>> = items
                .iter()
                .map(|item| {
                    (item.get("type").and_then(Value::as_str) == Some("text"))
                        .then(|| item.get("text").and_then(Value::as_str))
                        .flatten()
                })
                .collect();

            texts.map_or_else(|| Value::Array(items.clone()).to_string(), |texts| texts.join("\n"))
        }
        Some(other) => other.to_string(),
    }
}

fn image_part(source: &ImageSource) -> Option<ChatContentPart> {
    let url = match source.source_type.as_str() {
        "base64" => {
            let media_type = source.media_type.as_deref().unwrap_or("image/png");
            format!("data:{media_type};base64,{}", source.data.as_deref()?)
        }
        "url" => source.url.clone()?,
        other => {
            tracing::debug!(source_type = other, "dropping image with unsupported source type");
            return None;
        }
    };

    Some(ChatContentPart::ImageUrl {
        image_url: ImageUrl { url },
    })
}

fn map_tool(tool: &ToolDefinition) -> Tool {
    let parameters = if tool.input_schema.is_null() {
        json!({"type": "object", "properties": {}})
    } else {
        tool.input_schema.clone()
    };

    Tool {
        tool_type: "function".to_owned(),
        function: FunctionDefinition {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters,
        },
    }
}

fn map_tool_choice(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!("auto"),
        ToolChoice::Any => json!("required"),
        ToolChoice::None => json!("none"),
        ToolChoice::Tool { name } => json!({"type": "function", "function": {"name": name}}),
    }
}
