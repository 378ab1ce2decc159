//! Axum route handlers for the Messages API surface

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderValue;
use axum::http::header::RETRY_AFTER;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json, Router, routing};
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use switchboard_core::{HttpError, RequestContext};

use crate::error::AdapterError;
use crate::protocol::anthropic::{ErrorDetail, ErrorResponse, MessagesRequest};
use crate::state::{AdapterState, OutboundStream};
use crate::stream::Outbound;

/// Build the adapter router with all endpoints
pub fn adapter_router(state: AdapterState) -> Router {
    Router::new()
        .route("/v1/messages", routing::post(messages))
        .route("/messages", routing::post(messages))
        .route("/v1/messages/count_tokens", routing::post(count_tokens))
        .route("/v1/models", routing::get(list_models))
        .with_state(state)
}

/// Handle `POST /v1/messages`
async fn messages(
    State(state): State<AdapterState>,
    Extension(context): Extension<RequestContext>,
    body: Bytes,
) -> Response {
    let request: MessagesRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(e) => return error_response(&e),
    };

    if request.is_stream() {
        match state.messages_stream(request, &context).await {
            Ok(stream) => sse_response(stream).into_response(),
            Err(e) => error_response(&e),
        }
    } else {
        match state.messages(request, &context).await {
            Ok(response) => Json(response).into_response(),
            Err(e) => error_response(&e),
        }
    }
}

/// Handle `POST /v1/messages/count_tokens`
async fn count_tokens(body: Bytes) -> Response {
    let result = parse_body::<MessagesRequest>(&body).and_then(|request| AdapterState::count_tokens(&request));

    match result {
        Ok(counted) => Json(counted).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Handle `GET /v1/models`
async fn list_models(State(state): State<AdapterState>, Extension(context): Extension<RequestContext>) -> Response {
    match state.list_models(&context).await {
        Ok(models) => Json(models).into_response(),
        Err(e) => error_response(&e),
    }
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, AdapterError> {
    serde_json::from_slice(body).map_err(|e| AdapterError::InvalidRequest(e.to_string()))
}

/// Build the SSE response, one `event:` line per client event
fn sse_response(stream: OutboundStream) -> Sse<impl futures_util::Stream<Item = Result<Event, axum::Error>>> {
    let events = stream.map(|item| match item {
        Outbound::Event(event) => Event::default().event(event.event_type()).json_data(&event),
        Outbound::Done => Ok(Event::default().data("[DONE]")),
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Render an adapter error as a client-protocol error response
fn error_response(error: &AdapterError) -> Response {
    let status = error.status_code();

    if status.is_server_error() {
        tracing::warn!(status = %status, error = %error, "request failed");
    } else {
        tracing::debug!(status = %status, error = %error, "request rejected");
    }

    let body = ErrorResponse {
        response_type: "error".to_owned(),
        error: ErrorDetail {
            error_type: error.error_type().to_owned(),
            message: error.client_message(),
        },
    };

    let mut response = (status, Json(body)).into_response();
    if let Some(seconds) = error.retry_after() {
        response
            .headers_mut()
            .insert(RETRY_AFTER, HeaderValue::from(seconds));
    }

    response
}
