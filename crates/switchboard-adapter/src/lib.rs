//! Messages API to chat-completions protocol adapter
//!
//! Maps Anthropic-style Messages requests onto an OpenAI-style
//! chat-completions backend and translates the answers back, including
//! re-framing backend delta streams into the block-structured client
//! event sequence. Every backend failure is classified onto a closed
//! error taxonomy before it reaches a client.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod assemble;
pub mod backend;
pub mod classify;
pub mod decode;
pub mod error;
pub mod handler;
pub mod ids;
pub mod mapper;
pub mod pacing;
pub mod protocol;
pub mod reframe;
pub mod state;
pub mod stream;
pub mod tokens;

pub use backend::{Backend, FrameStream, OpenAiBackend};
pub use error::{AdapterError, ErrorEnvelope, ErrorKind};
pub use handler::adapter_router;
pub use pacing::PacingPolicy;
pub use reframe::{BackendEvent, Reframer};
pub use state::{AdapterOptions, AdapterState, OutboundStream};
pub use stream::Outbound;
