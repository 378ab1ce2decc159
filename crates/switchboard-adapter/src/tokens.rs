//! Length-based token estimation
//!
//! Used only when the backend does not report usage. Roughly four
//! characters per token, rounded up.

use crate::protocol::anthropic::{ContentPart, MessageContent, MessagesRequest, ResponseBlock};

const CHARS_PER_TOKEN: usize = 4;

/// Estimate the token count of a piece of text
pub fn estimate(text: &str) -> u32 {
    estimate_chars(text.chars().count())
}

pub(crate) fn estimate_chars(chars: usize) -> u32 {
    u32::try_from(chars.div_ceil(CHARS_PER_TOKEN)).unwrap_or(u32::MAX)
}

/// Estimate the input tokens of a client request
///
/// Counts the system prompt, message text, tool results, prior tool
/// inputs and tool definitions. Never returns zero.
pub fn estimate_request(request: &MessagesRequest) -> u32 {
    let mut chars = request.system.as_ref().map_or(0, |system| system.text().chars().count());

    for message in &request.messages {
        chars += match &message.content {
            MessageContent::Text(text) => text.chars().count(),
            MessageContent::Parts(parts) => parts.iter().map(part_chars).sum(),
        };
    }

    for tool in request.tools.iter().flatten() {
        chars += tool.name.chars().count();
        chars += tool.description.as_deref().map_or(0, |d| d.chars().count());
        chars += tool.input_schema.to_string().chars().count();
    }

    estimate_chars(chars).max(1)
}

fn part_chars(part: &ContentPart) -> usize {
    match part {
        ContentPart::Text { text } => text.chars().count(),
        ContentPart::ToolUse { name, input, .. } => name.chars().count() + input.to_string().chars().count(),
        ContentPart::ToolResult { content, .. } => match content {
            Some(serde_json::Value::String(text)) => text.chars().count(),
            Some(other) => other.to_string().chars().count(),
            None => 0,
        },
        ContentPart::Image { .. } | ContentPart::Unsupported => 0,
    }
}

/// Estimate the output tokens of assembled response blocks
pub fn estimate_blocks(blocks: &[ResponseBlock]) -> u32 {
    let chars = blocks
        .iter()
        .map(|block| match block {
            ResponseBlock::Text { text } => text.chars().count(),
            ResponseBlock::ToolUse { input, .. } => input.to_string().chars().count(),
        })
        .sum();

    estimate_chars(chars)
}
