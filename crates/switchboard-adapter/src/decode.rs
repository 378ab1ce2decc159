//! Backend stream payload decoding
//!
//! Turns each `data:` payload of a chat-completions stream into backend
//! delta events for the re-framer. Also recognizes in-band error objects
//! and complete (non-streaming) responses sent in place of a stream.

use serde_json::Value;

use crate::classify;
use crate::error::ErrorEnvelope;
use crate::protocol::openai::{ChatResponse, ChatUsage, ResponseFunctionCall, StreamChunk};
use crate::reframe::BackendEvent;

/// Backend index for calls in the single `function_call` format
const FUNCTION_CALL_INDEX: u32 = 0;

/// One decoded backend payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Delta events, in backend order
    Events(Vec<BackendEvent>),
    /// Backend end-of-stream marker
    Done,
    /// In-band error object
    Failure(ErrorEnvelope),
    /// Payload carried nothing usable
    Skip,
}

/// Decode one SSE `data:` payload (or a whole non-SSE body)
pub fn decode_data(data: &str) -> Frame {
    let data = data.trim();
    if data.is_empty() {
        return Frame::Skip;
    }
    if data == "[DONE]" {
        return Frame::Done;
    }

    let payload: Value = match serde_json::from_str(data) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::debug!(error = %e, data = %data, "skipping unparseable backend payload");
            return Frame::Skip;
        }
    };

    if classify::is_error_payload(&payload) {
        return Frame::Failure(classify::classify(200, data.as_bytes()));
    }

    if is_complete_response(&payload) {
        return match serde_json::from_value::<ChatResponse>(payload) {
            Ok(response) => Frame::Events(response_events(&response)),
            Err(e) => {
                tracing::debug!(error = %e, "skipping malformed complete response in stream");
                Frame::Skip
            }
        };
    }

    match serde_json::from_value::<StreamChunk>(payload) {
        Ok(chunk) => Frame::Events(chunk_events(&chunk)),
        Err(e) => {
            tracing::debug!(error = %e, data = %data, "skipping malformed stream chunk");
            Frame::Skip
        }
    }
}

/// A complete response carries `message` in its choices instead of `delta`
fn is_complete_response(payload: &Value) -> bool {
    payload
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .is_some_and(|choice| choice.get("message").is_some() && choice.get("delta").is_none())
}

/// Decode one streaming chunk into backend events
///
/// Per chunk: usage, then per choice text, tool-call starts and argument
/// fragments, then the finish reason. Only the first choice is used.
pub fn chunk_events(chunk: &StreamChunk) -> Vec<BackendEvent> {
    let mut events = Vec::new();

    if let Some(usage) = chunk.usage {
        events.push(usage_event(usage));
    }

    let Some(choice) = chunk.choices.iter().find(|choice| choice.index == 0) else {
        return events;
    };

    let text = choice
        .delta
        .content
        .as_deref()
        .filter(|text| !text.is_empty())
        .or_else(|| choice.delta.reasoning_content.as_deref().filter(|text| !text.is_empty()));
    if let Some(text) = text {
        events.push(BackendEvent::TextDelta(text.to_owned()));
    }

    for call in choice.delta.tool_calls.iter().flatten() {
        let function = call.function.as_ref();
        let name = function.and_then(|f| f.name.as_deref()).filter(|name| !name.is_empty());

        if let Some(name) = name {
            events.push(BackendEvent::ToolCallStart {
                backend_index: call.index,
                id: call.id.clone().unwrap_or_default(),
                name: name.to_owned(),
            });
        }

        if let Some(fragment) = function.and_then(|f| f.arguments.as_deref()).filter(|a| !a.is_empty()) {
            events.push(BackendEvent::ToolCallArgs {
                backend_index: call.index,
                fragment: fragment.to_owned(),
            });
        }
    }

    if let Some(call) = &choice.delta.function_call {
        if let Some(name) = call.name.as_deref().filter(|name| !name.is_empty()) {
            events.push(BackendEvent::ToolCallStart {
                backend_index: FUNCTION_CALL_INDEX,
                id: String::new(),
                name: name.to_owned(),
            });
        }
        if let Some(fragment) = call.arguments.as_deref().filter(|a| !a.is_empty()) {
            events.push(BackendEvent::ToolCallArgs {
                backend_index: FUNCTION_CALL_INDEX,
                fragment: fragment.to_owned(),
            });
        }
    }

    if let Some(reason) = &choice.finish_reason {
        events.push(BackendEvent::Finish(reason.clone()));
    }

    events
}

/// Expand a complete response into the events a stream would have carried
pub fn response_events(response: &ChatResponse) -> Vec<BackendEvent> {
    let mut events = Vec::new();

    if let Some(choice) = response.choices.first() {
        let message = &choice.message;
        let text = message
            .content
            .as_deref()
            .filter(|text| !text.is_empty())
            .or_else(|| message.reasoning_content.as_deref().filter(|text| !text.is_empty()));
        if let Some(text) = text {
            events.push(BackendEvent::TextDelta(text.to_owned()));
        }

        for (position, call) in message.tool_calls.iter().flatten().enumerate() {
            let backend_index = u32::try_from(position).unwrap_or(u32::MAX);
            push_call(&mut events, backend_index, call.id.clone().unwrap_or_default(), &call.function);
        }

        if let Some(function) = &message.function_call {
            push_call(&mut events, FUNCTION_CALL_INDEX, String::new(), function);
        }
    }

    if let Some(usage) = response.usage {
        events.push(usage_event(usage));
    }

    let reason = response
        .choices
        .first()
        .and_then(|choice| choice.finish_reason.clone())
        .unwrap_or_else(|| "stop".to_owned());
    events.push(BackendEvent::Finish(reason));

    events
}

fn push_call(events: &mut Vec<BackendEvent>, backend_index: u32, id: String, function: &ResponseFunctionCall) {
    events.push(BackendEvent::ToolCallStart {
        backend_index,
        id,
        name: function.name.clone(),
    });

    let fragment = match &function.arguments {
        Some(Value::String(raw)) => raw.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    if !fragment.is_empty() {
        events.push(BackendEvent::ToolCallArgs { backend_index, fragment });
    }
}

const fn usage_event(usage: ChatUsage) -> BackendEvent {
    BackendEvent::Usage {
        input_tokens: usage.prompt_tokens,
        output_tokens: usage.completion_tokens,
    }
}
