//! Shared adapter state and request orchestration

use std::pin::Pin;
use std::sync::Arc;

use futures_util::{Stream, StreamExt, stream};
use jiff::Timestamp;
use switchboard_config::{BackendConfig, ModelsConfig, StreamingConfig};
use switchboard_core::RequestContext;

use crate::assemble::{AssembleContext, assemble};
use crate::backend::{Backend, FrameStream, OpenAiBackend};
use crate::decode::Frame;
use crate::error::AdapterError;
use crate::ids;
use crate::mapper::{self, MappingOptions};
use crate::pacing::PacingPolicy;
use crate::protocol::anthropic::{CountTokensResponse, MessagesRequest, MessagesResponse, ModelInfo, ModelList};
use crate::reframe::Reframer;
use crate::stream::{Outbound, drive};
use crate::tokens;

/// Outbound client event stream
pub type OutboundStream = Pin<Box<dyn Stream<Item = Outbound> + Send>>;

/// Request-shaping settings
#[derive(Debug, Clone)]
pub struct AdapterOptions {
    /// Model name translation
    pub models: ModelsConfig,
    /// Output bound used when the client omits `max_tokens`
    pub default_max_tokens: u32,
    /// Request a trailing usage chunk on streams
    pub stream_usage: bool,
    /// Event pacing for outbound streams
    pub pacing: PacingPolicy,
}

/// Shared state for adapter route handlers
#[derive(Clone)]
pub struct AdapterState {
    pub(crate) inner: Arc<AdapterStateInner>,
}

pub(crate) struct AdapterStateInner {
    pub(crate) backend: Arc<dyn Backend>,
    pub(crate) options: AdapterOptions,
}

impl AdapterState {
    /// Build state backed by an OpenAI-compatible server
    ///
    /// # Errors
    ///
    /// Returns an error if the backend HTTP client cannot be built.
    pub fn from_config(backend: &BackendConfig, streaming: &StreamingConfig) -> Result<Self, AdapterError> {
        let client = OpenAiBackend::new(backend)?;

        tracing::debug!(
            base_url = %backend.base_url,
            mappings = backend.models.mappings.len(),
            "chat-completions backend configured"
        );

        Ok(Self::new(
            Arc::new(client),
            AdapterOptions {
                models: backend.models.clone(),
                default_max_tokens: backend.default_max_tokens,
                stream_usage: backend.stream_usage,
                pacing: PacingPolicy::from_config(&streaming.pacing),
            },
        ))
    }

    /// Build state around any backend
    pub fn new(backend: Arc<dyn Backend>, options: AdapterOptions) -> Self {
        Self {
            inner: Arc::new(AdapterStateInner { backend, options }),
        }
    }

    fn mapping_options(&self) -> MappingOptions<'_> {
        let options = &self.inner.options;
        MappingOptions {
            models: &options.models,
            default_max_tokens: options.default_max_tokens,
            stream_usage: options.stream_usage,
        }
    }

    /// Serve a non-streaming Messages request
    ///
    /// # Errors
    ///
    /// Returns an error if the request is invalid or the backend fails.
    pub async fn messages(
        &self,
        request: MessagesRequest,
        context: &RequestContext,
    ) -> Result<MessagesResponse, AdapterError> {
        let backend_request = mapper::to_backend_request(&request, &self.mapping_options())?;

        tracing::debug!(
            request_id = %context.request_id,
            client_model = %request.model,
            backend_model = %backend_request.model,
            "forwarding completion"
        );

        let response = self.inner.backend.complete(&backend_request, context).await?;
        tracing::debug!(
            request_id = %context.request_id,
            served_model = response.model.as_deref().unwrap_or("unknown"),
            choices = response.choices.len(),
            "backend completion received"
        );
        let estimated_input_tokens = tokens::estimate_request(&request);

        assemble(
            response,
            &AssembleContext {
                client_model: request.model,
                estimated_input_tokens,
            },
        )
    }

    /// Serve a streaming Messages request
    ///
    /// Failures reported before the first usable backend frame surface as
    /// an error here, so the client gets a proper status code. Later ones
    /// become an `error` event inside the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the request is invalid or the backend fails
    /// before streaming starts.
    pub async fn messages_stream(
        &self,
        request: MessagesRequest,
        context: &RequestContext,
    ) -> Result<OutboundStream, AdapterError> {
        let backend_request = mapper::to_backend_request(&request, &self.mapping_options())?;

        tracing::debug!(
            request_id = %context.request_id,
            client_model = %request.model,
            backend_model = %backend_request.model,
            "forwarding streaming completion"
        );

        let mut frames = self.inner.backend.complete_stream(&backend_request, context).await?;
        let first = first_frame(&mut frames).await?;
        let frames: FrameStream = Box::pin(stream::iter(first.map(Ok)).chain(frames));

        let reframer = Reframer::new(ids::message_id(), request.model.clone(), tokens::estimate_request(&request));
        let interval = self.inner.options.pacing.interval_for(context.user_agent());

        Ok(Box::pin(drive(frames, reframer, interval)))
    }

    /// Estimate the input tokens of a request without calling the backend
    ///
    /// # Errors
    ///
    /// Returns an error if the request has no messages.
    pub fn count_tokens(request: &MessagesRequest) -> Result<CountTokensResponse, AdapterError> {
        if request.messages.is_empty() {
            return Err(AdapterError::InvalidRequest(
                "messages: at least one message is required".to_owned(),
            ));
        }

        Ok(CountTokensResponse {
            input_tokens: tokens::estimate_request(request),
        })
    }

    /// List the backend's models in the client format
    ///
    /// # Errors
    ///
    /// Returns an error if the backend request fails.
    pub async fn list_models(&self, context: &RequestContext) -> Result<ModelList, AdapterError> {
        let backend_models = self.inner.backend.list_models(context).await?;

        let data: Vec<ModelInfo> = backend_models
            .data
            .into_iter()
            .map(|model| ModelInfo {
                model_type: "model".to_owned(),
                display_name: model.id.clone(),
                created_at: Timestamp::from_second(model.created)
                    .unwrap_or(Timestamp::UNIX_EPOCH)
                    .to_string(),
                id: model.id,
            })
            .collect();

        Ok(ModelList {
            has_more: false,
            first_id: data.first().map(|model| model.id.clone()),
            last_id: data.last().map(|model| model.id.clone()),
            data,
        })
    }
}

/// Wait for the first frame that carries something
///
/// An error at this point is returned instead of being streamed.
async fn first_frame(frames: &mut FrameStream) -> Result<Option<Frame>, AdapterError> {
    loop {
        match frames.next().await {
            Some(Ok(Frame::Skip)) => {}
            Some(Ok(Frame::Failure(envelope))) => return Err(AdapterError::Upstream(envelope)),
            Some(Err(e)) => return Err(e),
            Some(Ok(frame)) => return Ok(Some(frame)),
            None => return Ok(None),
        }
    }
}
