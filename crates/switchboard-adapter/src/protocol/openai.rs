//! `OpenAI` chat completion API wire format types
//!
//! Response types default every field so that compatible servers which
//! omit ids, timestamps or usage still decode.

use serde::{Deserialize, Serialize};

// -- Request types --

/// Chat completion request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model identifier
    pub model: String,
    /// Conversation messages
    pub messages: Vec<ChatMessage>,
    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Stop sequences
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    /// Whether to stream the response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Stream options (e.g. `include_usage`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<StreamOptions>,
    /// Tool definitions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    /// Tool choice (`"auto"`, `"none"`, `"required"` or a function selector)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<serde_json::Value>,
}

/// Stream options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamOptions {
    /// Include a usage chunk at the end of the stream
    #[serde(default)]
    pub include_usage: bool,
}

/// Message within a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `system`, `user`, `assistant` or `tool`
    pub role: String,
    /// Content; `null` is allowed for assistant messages carrying tool calls
    pub content: Option<ChatContent>,
    /// Tool calls made by the assistant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Tool call this message answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    /// Plain text message
    pub fn text(role: &str, text: impl Into<String>) -> Self {
        Self {
            role: role.to_owned(),
            content: Some(ChatContent::Text(text.into())),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

/// Content can be a string or array of content parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatContent {
    /// Plain text content
    Text(String),
    /// Array of content parts
    Parts(Vec<ChatContentPart>),
}

/// Individual content part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatContentPart {
    /// Text content
    Text {
        /// The text string
        text: String,
    },
    /// Image content via URL
    ImageUrl {
        /// Image URL reference
        image_url: ImageUrl,
    },
}

/// Image URL reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrl {
    /// Image URL or base64 data URI
    pub url: String,
}

/// Tool definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    /// Tool type (always `function`)
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function definition
    pub function: FunctionDefinition,
}

/// Function definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Function name
    pub name: String,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for parameters
    pub parameters: serde_json::Value,
}

/// Tool call within an assistant request message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool call identifier
    pub id: String,
    /// Tool type (always `function`)
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function call details
    pub function: FunctionCall,
}

/// Function call details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Function name
    pub name: String,
    /// JSON-encoded arguments
    pub arguments: String,
}

// -- Response types --

/// Chat completion response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Response identifier, possibly empty or a placeholder
    #[serde(default)]
    pub id: Option<String>,
    /// Model used
    #[serde(default)]
    pub model: Option<String>,
    /// Generated choices
    #[serde(default)]
    pub choices: Vec<Choice>,
    /// Token usage
    #[serde(default)]
    pub usage: Option<ChatUsage>,
}

/// Choice within a response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Choice {
    /// Choice index
    #[serde(default)]
    pub index: u32,
    /// Generated message
    #[serde(default)]
    pub message: ResponseMessage,
    /// Why generation stopped
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Message within a response choice
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseMessage {
    /// Text content
    #[serde(default)]
    pub content: Option<String>,
    /// Reasoning text emitted by some compatible servers instead of `content`
    #[serde(default)]
    pub reasoning_content: Option<String>,
    /// Tool calls
    #[serde(default)]
    pub tool_calls: Option<Vec<ResponseToolCall>>,
    /// Single function call in the pre-`tool_calls` format
    #[serde(default)]
    pub function_call: Option<ResponseFunctionCall>,
}

/// Tool call within a response message
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseToolCall {
    /// Tool call identifier
    #[serde(default)]
    pub id: Option<String>,
    /// Function call details
    #[serde(default)]
    pub function: ResponseFunctionCall,
}

/// Function call within a response tool call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseFunctionCall {
    /// Function name
    #[serde(default)]
    pub name: String,
    /// Arguments, normally a JSON-encoded string; some servers send an object
    #[serde(default)]
    pub arguments: Option<serde_json::Value>,
}

/// Token usage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUsage {
    /// Prompt tokens
    #[serde(default)]
    pub prompt_tokens: u32,
    /// Completion tokens
    #[serde(default)]
    pub completion_tokens: u32,
}

// -- Streaming types --

/// Streaming chunk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Chunk identifier
    #[serde(default)]
    pub id: Option<String>,
    /// Delta choices
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
    /// Usage (final chunk when `stream_options.include_usage` is set)
    #[serde(default)]
    pub usage: Option<ChatUsage>,
}

/// Choice within a streaming chunk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamChoice {
    /// Choice index
    #[serde(default)]
    pub index: u32,
    /// Incremental delta
    #[serde(default)]
    pub delta: StreamDelta,
    /// Finish reason (final chunk)
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Delta content within a streaming choice
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamDelta {
    /// Incremental text content
    #[serde(default)]
    pub content: Option<String>,
    /// Incremental reasoning text
    #[serde(default)]
    pub reasoning_content: Option<String>,
    /// Incremental tool calls
    #[serde(default)]
    pub tool_calls: Option<Vec<StreamToolCall>>,
    /// Incremental function call in the pre-`tool_calls` format
    #[serde(default)]
    pub function_call: Option<StreamFunctionCall>,
}

/// Tool call fragment within a streaming delta
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamToolCall {
    /// Backend-local position within the `tool_calls` array
    #[serde(default)]
    pub index: u32,
    /// Tool call ID (first fragment only)
    #[serde(default)]
    pub id: Option<String>,
    /// Partial function call
    #[serde(default)]
    pub function: Option<StreamFunctionCall>,
}

/// Partial function call within a streaming tool call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamFunctionCall {
    /// Function name (first fragment only)
    #[serde(default)]
    pub name: Option<String>,
    /// Incremental arguments fragment
    #[serde(default)]
    pub arguments: Option<String>,
}

// -- Models list types --

/// Models list response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendModelList {
    /// List of models
    #[serde(default)]
    pub data: Vec<BackendModel>,
}

/// Model entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendModel {
    /// Model identifier
    pub id: String,
    /// Creation timestamp (seconds)
    #[serde(default)]
    pub created: i64,
}
