//! Anthropic Messages API wire format types

use serde::{Deserialize, Serialize};

// -- Request types --

/// Messages API request
#[derive(Debug, Clone, Deserialize)]
pub struct MessagesRequest {
    /// Model identifier requested by the client
    #[serde(default)]
    pub model: String,
    /// Maximum tokens to generate
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// System prompt (top-level, not in messages)
    #[serde(default)]
    pub system: Option<SystemPrompt>,
    /// Conversation messages
    pub messages: Vec<InputMessage>,
    /// Sampling temperature
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    #[serde(default)]
    pub top_p: Option<f64>,
    /// Top-k sampling (no chat-completions equivalent)
    #[serde(default)]
    pub top_k: Option<u32>,
    /// Stop sequences
    #[serde(default)]
    pub stop_sequences: Option<Vec<String>>,
    /// Whether to stream the response
    #[serde(default)]
    pub stream: Option<bool>,
    /// Tool definitions
    #[serde(default)]
    pub tools: Option<Vec<ToolDefinition>>,
    /// Tool choice configuration
    #[serde(default)]
    pub tool_choice: Option<ToolChoice>,
}

impl MessagesRequest {
    /// Whether the client asked for an event stream
    pub fn is_stream(&self) -> bool {
        self.stream.unwrap_or(false)
    }
}

/// System prompt, either plain text or a list of text blocks
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SystemPrompt {
    /// Plain text
    Text(String),
    /// Text blocks (may carry cache control, which is ignored)
    Blocks(Vec<SystemBlock>),
}

impl SystemPrompt {
    /// Flatten the prompt into a single string
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Blocks(blocks) => blocks
                .iter()
                .map(|block| block.text.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// One block of a block-form system prompt
#[derive(Debug, Clone, Deserialize)]
pub struct SystemBlock {
    /// Block text
    #[serde(default)]
    pub text: String,
}

/// Message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Conversation message
#[derive(Debug, Clone, Deserialize)]
pub struct InputMessage {
    /// Author role
    pub role: Role,
    /// Message content
    pub content: MessageContent,
}

/// Message content can be a string or an array of parts
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text (shorthand)
    Text(String),
    /// Ordered content parts
    Parts(Vec<ContentPart>),
}

/// Content part in a client message
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Text content
    Text {
        /// The text string
        text: String,
    },
    /// Image content
    Image {
        /// Image source
        source: ImageSource,
    },
    /// Tool invocation previously emitted by the assistant
    ToolUse {
        /// Tool use identifier
        id: String,
        /// Tool name
        name: String,
        /// Tool input as JSON
        #[serde(default)]
        input: serde_json::Value,
    },
    /// Result of a tool invocation, supplied by the user
    ToolResult {
        /// Tool use ID this result responds to
        tool_use_id: String,
        /// String, list of text blocks, or arbitrary JSON
        #[serde(default)]
        content: Option<serde_json::Value>,
        /// Whether the tool call errored
        #[serde(default)]
        is_error: Option<bool>,
    },
    /// Part types the backend cannot represent (thinking, documents, ...)
    #[serde(other)]
    Unsupported,
}

/// Image source
#[derive(Debug, Clone, Deserialize)]
pub struct ImageSource {
    /// Source type (`base64` or `url`)
    #[serde(rename = "type")]
    pub source_type: String,
    /// Media type (e.g. `image/png`)
    #[serde(default)]
    pub media_type: Option<String>,
    /// Base64 payload
    #[serde(default)]
    pub data: Option<String>,
    /// Remote image URL
    #[serde(default)]
    pub url: Option<String>,
}

/// Tool definition
#[derive(Debug, Clone, Deserialize)]
pub struct ToolDefinition {
    /// Tool name, unique within a request
    pub name: String,
    /// Human-readable description
    #[serde(default)]
    pub description: Option<String>,
    /// JSON Schema for input parameters
    #[serde(default)]
    pub input_schema: serde_json::Value,
}

/// Tool choice
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolChoice {
    /// Model decides
    Auto,
    /// Model must call some tool
    Any,
    /// Model must call the named tool
    Tool {
        /// Tool name
        name: String,
    },
    /// Model must not call tools
    None,
}

// -- Response types --

/// Messages API response, also the payload of `message_start`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagesResponse {
    /// Response identifier
    pub id: String,
    /// Object type (always `message`)
    #[serde(rename = "type")]
    pub response_type: String,
    /// Role (always `assistant`)
    pub role: Role,
    /// Response content blocks
    pub content: Vec<ResponseBlock>,
    /// Model echoed back to the client
    pub model: String,
    /// Stop reason, `null` until the message finishes
    pub stop_reason: Option<StopReason>,
    /// Stop sequence that triggered the stop
    pub stop_sequence: Option<String>,
    /// Token usage
    pub usage: Usage,
}

impl MessagesResponse {
    /// Empty message shell carried by `message_start`
    pub fn shell(id: String, model: String, input_tokens: u32) -> Self {
        Self {
            id,
            response_type: "message".to_owned(),
            role: Role::Assistant,
            content: Vec::new(),
            model,
            stop_reason: None,
            stop_sequence: None,
            usage: Usage {
                input_tokens,
                output_tokens: 0,
            },
        }
    }
}

/// Why the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
    ToolUse,
}

/// Content block in a response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseBlock {
    /// Text response
    Text {
        /// The text string
        text: String,
    },
    /// Tool use request
    ToolUse {
        /// Tool use identifier
        id: String,
        /// Tool name
        name: String,
        /// Tool input as JSON
        input: serde_json::Value,
    },
}

/// Token usage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Input tokens
    pub input_tokens: u32,
    /// Output tokens
    pub output_tokens: u32,
}

// -- Streaming types --

/// Server-sent event in a Messages API stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Stream started
    MessageStart {
        /// Empty message with metadata
        message: MessagesResponse,
    },
    /// New content block started
    ContentBlockStart {
        /// Block position
        index: u32,
        /// Initial block content
        content_block: ResponseBlock,
    },
    /// Incremental content within a block
    ContentBlockDelta {
        /// Block position
        index: u32,
        /// Delta content
        delta: BlockDelta,
    },
    /// Content block finished
    ContentBlockStop {
        /// Block position
        index: u32,
    },
    /// Final stop reason and usage
    MessageDelta {
        /// Stop reason delta
        delta: MessageDelta,
        /// Final usage
        usage: Usage,
    },
    /// Stream completed
    MessageStop,
    /// Keep-alive
    Ping,
    /// Stream aborted
    Error {
        /// Error details
        error: ErrorDetail,
    },
}

impl StreamEvent {
    /// SSE `event:` name, identical to the payload's `type`
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::MessageStart { .. } => "message_start",
            Self::ContentBlockStart { .. } => "content_block_start",
            Self::ContentBlockDelta { .. } => "content_block_delta",
            Self::ContentBlockStop { .. } => "content_block_stop",
            Self::MessageDelta { .. } => "message_delta",
            Self::MessageStop => "message_stop",
            Self::Ping => "ping",
            Self::Error { .. } => "error",
        }
    }
}

/// Delta content in a `content_block_delta` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockDelta {
    /// Incremental text
    TextDelta {
        /// Text fragment
        text: String,
    },
    /// Incremental tool input JSON
    InputJsonDelta {
        /// JSON fragment
        partial_json: String,
    },
}

/// Delta in a `message_delta` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDelta {
    /// Stop reason
    pub stop_reason: Option<StopReason>,
    /// Stop sequence
    pub stop_sequence: Option<String>,
}

// -- Token counting --

/// `count_tokens` response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountTokensResponse {
    /// Estimated input tokens
    pub input_tokens: u32,
}

// -- Models --

/// Models list response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelList {
    /// Models
    pub data: Vec<ModelInfo>,
    /// Always false, the backend list is returned in one page
    pub has_more: bool,
    /// First model id in the page
    pub first_id: Option<String>,
    /// Last model id in the page
    pub last_id: Option<String>,
}

/// Model entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Object type (always `model`)
    #[serde(rename = "type")]
    pub model_type: String,
    /// Model identifier
    pub id: String,
    /// Display name
    pub display_name: String,
    /// RFC 3339 creation time
    pub created_at: String,
}

// -- Error response --

/// Error response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always `error`
    #[serde(rename = "type")]
    pub response_type: String,
    /// Error details
    pub error: ErrorDetail,
}

/// Error detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Error type (e.g. `rate_limit_error`)
    #[serde(rename = "type")]
    pub error_type: String,
    /// Error message
    pub message: String,
}
