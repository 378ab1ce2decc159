//! Chat-completions backend client

use std::pin::Pin;

use anyhow::Context as _;
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt, stream};
use http::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use switchboard_config::BackendConfig;
use switchboard_core::RequestContext;
use url::Url;

use crate::classify;
use crate::decode::{Frame, decode_data};
use crate::error::AdapterError;
use crate::protocol::openai::{BackendModelList, ChatRequest, ChatResponse};

/// Decoded backend stream, one frame per SSE event
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame, AdapterError>> + Send>>;

/// A backend that speaks the chat-completions protocol
#[async_trait]
pub trait Backend: Send + Sync {
    /// Send a non-streaming completion request
    async fn complete(&self, request: &ChatRequest, context: &RequestContext) -> Result<ChatResponse, AdapterError>;

    /// Send a streaming completion request
    ///
    /// Fails before the stream starts when the backend rejects the request.
    /// Later failures arrive as `Frame::Failure` or `Err` items.
    async fn complete_stream(
        &self,
        request: &ChatRequest,
        context: &RequestContext,
    ) -> Result<FrameStream, AdapterError>;

    /// List the backend's models
    async fn list_models(&self, context: &RequestContext) -> Result<BackendModelList, AdapterError>;
}

/// reqwest-based client for OpenAI-compatible servers
pub struct OpenAiBackend {
    client: Client,
    base_url: Url,
    api_key: Option<SecretString>,
}

impl OpenAiBackend {
    /// Create from backend configuration
    ///
    /// # Errors
    ///
    /// Returns `AdapterError::Internal` if the HTTP client cannot be built.
    pub fn new(config: &BackendConfig) -> Result<Self, AdapterError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .context("failed to build backend HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/{path}")
    }

    /// Send a request, classifying transport failures and error statuses
    async fn send<B: Serialize + Sync>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&B>,
        context: &RequestContext,
    ) -> Result<Response, AdapterError> {
        let mut builder = self.client.request(method, self.endpoint(path));

        if let Some(body) = body {
            builder = builder.json(body);
        }
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder.send().await.map_err(|e| {
            tracing::error!(request_id = %context.request_id, error = %e, "backend request failed");
            transport_error(&e)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let headers = response.headers().clone();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!(
                    request_id = %context.request_id,
                    status = %status,
                    error = %e,
                    "failed to read backend error body"
                );
                axum::body::Bytes::new()
            }
        };
        let envelope = classify::classify_with_headers(status.as_u16(), &headers, &body);

        tracing::warn!(
            request_id = %context.request_id,
            status = %status,
            kind = ?envelope.kind,
            "backend returned error"
        );

        Err(AdapterError::Upstream(envelope))
    }
}

/// Read a whole JSON body, surfacing error objects sent with a success status
async fn read_json(response: Response) -> Result<Value, AdapterError> {
    let status = response.status().as_u16();
    let body = response.bytes().await.map_err(|e| transport_error(&e))?;

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| AdapterError::Decode(format!("backend body is not JSON: {e}")))?;

    if classify::is_error_payload(&payload) {
        return Err(AdapterError::Upstream(classify::classify(status, &body)));
    }

    Ok(payload)
}

fn transport_error(error: &reqwest::Error) -> AdapterError {
    if error.is_builder() {
        AdapterError::Internal(anyhow::anyhow!("invalid backend request: {error}"))
    } else if error.is_timeout() {
        AdapterError::Unavailable(format!("backend timed out: {error}"))
    } else {
        AdapterError::Unavailable(error.to_string())
    }
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim_start().starts_with("application/json"))
}

#[async_trait]
impl Backend for OpenAiBackend {
    async fn complete(&self, request: &ChatRequest, context: &RequestContext) -> Result<ChatResponse, AdapterError> {
        let response = self
            .send(reqwest::Method::POST, "chat/completions", Some(request), context)
            .await?;

        let payload = read_json(response).await?;

        serde_json::from_value(payload).map_err(|e| AdapterError::Decode(format!("unexpected completion shape: {e}")))
    }

    async fn complete_stream(
        &self,
        request: &ChatRequest,
        context: &RequestContext,
    ) -> Result<FrameStream, AdapterError> {
        let response = self
            .send(reqwest::Method::POST, "chat/completions", Some(request), context)
            .await?;

        // Some servers ignore `stream: true` and answer with one JSON body
        if is_json(&response) {
            tracing::debug!(request_id = %context.request_id, "backend answered a stream request with JSON");
            let payload = read_json(response).await?;
            let frame = decode_data(&payload.to_string());
            return Ok(Box::pin(stream::iter([Ok::<_, AdapterError>(frame)])));
        }

        let request_id = context.request_id.clone();
        let frames = response.bytes_stream().eventsource().map(move |result| match result {
            Ok(event) => Ok(decode_data(&event.data)),
            Err(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "backend stream interrupted");
                Err(AdapterError::Unavailable(format!("backend stream interrupted: {e}")))
            }
        });

        Ok(Box::pin(frames))
    }

    async fn list_models(&self, context: &RequestContext) -> Result<BackendModelList, AdapterError> {
        let response = self
            .send::<()>(reqwest::Method::GET, "models", None, context)
            .await?;

        let payload = read_json(response).await?;

        serde_json::from_value(payload).map_err(|e| AdapterError::Decode(format!("unexpected model list shape: {e}")))
    }
}
