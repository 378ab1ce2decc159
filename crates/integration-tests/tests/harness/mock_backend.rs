//! Mock chat-completions backend for integration tests
//!
//! Replays a scripted reply for every completion request and records the
//! last request it received.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// What the mock answers to `POST /v1/chat/completions`
#[derive(Debug, Clone)]
pub enum Reply {
    /// A JSON body with the given status
    Json {
        status: u16,
        body: Value,
        retry_after: Option<u64>,
    },
    /// An SSE stream carrying these `data:` payloads verbatim
    Sse(Vec<String>),
}

impl Reply {
    /// 200 with a JSON body
    pub fn ok(body: Value) -> Self {
        Self::Json {
            status: 200,
            body,
            retry_after: None,
        }
    }

    /// An error status with a JSON body
    pub fn status(status: u16, body: Value) -> Self {
        Self::Json {
            status,
            body,
            retry_after: None,
        }
    }

    /// SSE stream from JSON chunks, terminated with `[DONE]`
    pub fn chunks(chunks: &[Value]) -> Self {
        let mut payloads: Vec<String> = chunks.iter().map(Value::to_string).collect();
        payloads.push("[DONE]".to_owned());
        Self::Sse(payloads)
    }
}

struct MockState {
    reply: Reply,
    last_request: Mutex<Option<Value>>,
    last_authorization: Mutex<Option<String>>,
}

/// Mock backend that returns predictable responses
pub struct MockBackend {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

impl MockBackend {
    /// Start the mock server, returning immediately
    pub async fn start(reply: Reply) -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            reply,
            last_request: Mutex::new(None),
            last_authorization: Mutex::new(None),
        });

        let app = Router::new()
            .route("/v1/chat/completions", routing::post(handle_chat_completions))
            .route("/v1/models", routing::get(handle_models))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL including `/v1`, since the adapter appends `/chat/completions`
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// The last chat-completions request body received
    pub fn last_request(&self) -> Option<Value> {
        self.state.last_request.lock().unwrap().clone()
    }

    /// The `Authorization` header of the last request
    pub fn last_authorization(&self) -> Option<String> {
        self.state.last_authorization.lock().unwrap().clone()
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle_chat_completions(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    *state.last_request.lock().unwrap() = Some(body);
    *state.last_authorization.lock().unwrap() = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    match &state.reply {
        Reply::Json {
            status,
            body,
            retry_after,
        } => {
            let status = StatusCode::from_u16(*status).unwrap();
            let mut response = (status, Json(body.clone())).into_response();
            if let Some(seconds) = retry_after {
                response.headers_mut().insert(RETRY_AFTER, (*seconds).into());
            }
            response
        }
        Reply::Sse(payloads) => {
            let body: String = payloads.iter().map(|payload| format!("data: {payload}\n\n")).collect();
            ([(CONTENT_TYPE, "text/event-stream")], body).into_response()
        }
    }
}

async fn handle_models() -> impl IntoResponse {
    Json(json!({
        "object": "list",
        "data": [
            {"id": "gpt-4o", "object": "model", "created": 1_715_367_049, "owned_by": "system"},
            {"id": "gpt-4o-mini", "object": "model", "created": 1_721_172_741, "owned_by": "system"}
        ]
    }))
}

// -- Canned backend payloads --

/// A complete text completion
pub fn text_completion(content: &str) -> Value {
    json!({
        "id": "chatcmpl-mock123",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": "gpt-4o",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 12, "completion_tokens": 5, "total_tokens": 17}
    })
}

/// A streaming text chunk
pub fn text_chunk(content: &str) -> Value {
    json!({
        "id": "chatcmpl-mock123",
        "object": "chat.completion.chunk",
        "choices": [{"index": 0, "delta": {"content": content}, "finish_reason": null}]
    })
}

/// A streaming chunk opening a tool call
pub fn tool_start_chunk(index: u32, id: &str, name: &str) -> Value {
    json!({
        "id": "chatcmpl-mock123",
        "object": "chat.completion.chunk",
        "choices": [{
            "index": 0,
            "delta": {"tool_calls": [{"index": index, "id": id, "type": "function", "function": {"name": name, "arguments": ""}}]},
            "finish_reason": null
        }]
    })
}

/// A streaming chunk carrying a tool-call argument fragment
pub fn tool_args_chunk(index: u32, fragment: &str) -> Value {
    json!({
        "id": "chatcmpl-mock123",
        "object": "chat.completion.chunk",
        "choices": [{
            "index": 0,
            "delta": {"tool_calls": [{"index": index, "function": {"arguments": fragment}}]},
            "finish_reason": null
        }]
    })
}

/// A streaming chunk carrying only a finish reason
pub fn finish_chunk(reason: &str) -> Value {
    json!({
        "id": "chatcmpl-mock123",
        "object": "chat.completion.chunk",
        "choices": [{"index": 0, "delta": {}, "finish_reason": reason}]
    })
}

/// The trailing usage chunk sent when `include_usage` is set
pub fn usage_chunk(prompt: u32, completion: u32) -> Value {
    json!({
        "id": "chatcmpl-mock123",
        "object": "chat.completion.chunk",
        "choices": [],
        "usage": {"prompt_tokens": prompt, "completion_tokens": completion, "total_tokens": prompt + completion}
    })
}
