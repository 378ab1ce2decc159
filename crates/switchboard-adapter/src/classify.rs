//! Backend failure classification
//!
//! Every backend status code and error body is mapped onto [`ErrorKind`],
//! and every kind onto a status from the client protocol's standard set.
//! Nothing the backend sends is forwarded unmapped.

use std::sync::OnceLock;

use http::header::RETRY_AFTER;
use http::{HeaderMap, StatusCode};
use regex::Regex;
use serde_json::Value;

use crate::error::{ErrorEnvelope, ErrorKind};

/// Status codes a Messages API client may observe from the adapter
pub const STANDARD_STATUSES: [u16; 8] = [400, 401, 403, 404, 413, 429, 500, 529];

/// Known backend statuses, including vendor-specific rate-limit codes
const STATUS_TABLE: &[(u16, ErrorKind)] = &[
    (400, ErrorKind::InvalidRequest),
    (404, ErrorKind::InvalidRequest),
    (413, ErrorKind::InvalidRequest),
    (422, ErrorKind::InvalidRequest),
    (401, ErrorKind::UpstreamError),
    (403, ErrorKind::UpstreamError),
    (408, ErrorKind::UpstreamUnavailable),
    (420, ErrorKind::RateLimited),
    (429, ErrorKind::RateLimited),
    (449, ErrorKind::RateLimited),
    (500, ErrorKind::UpstreamError),
    (502, ErrorKind::UpstreamUnavailable),
    (503, ErrorKind::UpstreamUnavailable),
    (504, ErrorKind::UpstreamUnavailable),
    (509, ErrorKind::RateLimited),
    (529, ErrorKind::UpstreamUnavailable),
];

/// Longest raw body excerpt used as a message when no structured one exists
const MAX_MESSAGE_CHARS: usize = 300;

fn rate_limit_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)rate[ _-]?limit|too many requests|quota exceeded|insufficient_quota|\b[tr]pm\b")
            .expect("must be valid regex")
    })
}

/// Client-visible status for an error kind
pub fn public_status(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::UpstreamUnavailable => StatusCode::from_u16(529).unwrap_or(StatusCode::SERVICE_UNAVAILABLE),
        ErrorKind::UpstreamError | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Map a backend status code onto the taxonomy
pub fn kind_for_status(status: u16) -> ErrorKind {
    STATUS_TABLE
        .iter()
        .find_map(|&(code, kind)| (code == status).then_some(kind))
        .unwrap_or(match status {
            400..=499 => ErrorKind::InvalidRequest,
            _ => ErrorKind::UpstreamError,
        })
}

/// Classify a backend failure from its status and body
pub fn classify(status: u16, body: &[u8]) -> ErrorEnvelope {
    let text = String::from_utf8_lossy(body);
    let payload = serde_json::from_slice::<Value>(body).ok();

    let embedded_status = payload.as_ref().and_then(embedded_status);
    let mut kind = embedded_status.map_or_else(|| kind_for_status(status), kind_for_status);

    if kind != ErrorKind::RateLimited && rate_limit_pattern().is_match(&text) {
        kind = ErrorKind::RateLimited;
    }

    let message = payload
        .as_ref()
        .and_then(structured_message)
        .or_else(|| excerpt(&text))
        .unwrap_or_else(|| default_message(kind).to_owned());

    ErrorEnvelope {
        kind,
        message,
        retry_after: payload.as_ref().and_then(body_retry_after),
    }
}

/// Classify a backend failure, taking a `Retry-After` header into account
pub fn classify_with_headers(status: u16, headers: &HeaderMap, body: &[u8]) -> ErrorEnvelope {
    let mut envelope = classify(status, body);

    if let Some(seconds) = headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
    {
        envelope.retry_after = Some(seconds);
    }

    envelope
}

/// Whether a JSON payload is an error object rather than a completion
///
/// Recognizes `{"error": ...}` bodies and vendor objects such as
/// `{"status": "449", "msg": "..."}` that some servers send with HTTP 200.
pub fn is_error_payload(payload: &Value) -> bool {
    let Some(object) = payload.as_object() else {
        return false;
    };

    if object.contains_key("choices") {
        return false;
    }

    let has_error = object.get("error").is_some_and(|error| !error.is_null());
    let has_vendor_status =
        embedded_status(payload).is_some() && (object.contains_key("msg") || object.contains_key("message"));

    has_error || has_vendor_status
}

/// Status carried inside a vendor error body (`"status": "449"` or `449`)
fn embedded_status(payload: &Value) -> Option<u16> {
    let status = payload.get("status")?;
    let code = match status {
        Value::Number(number) => number.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(text) => text.trim().parse::<u16>().ok(),
        _ => None,
    }?;

    (400..600).contains(&code).then_some(code)
}

fn structured_message(payload: &Value) -> Option<String> {
    let candidates = [
        payload.pointer("/error/message"),
        payload.get("error").filter(|error| error.is_string()),
        payload.get("msg"),
        payload.get("message"),
    ];

    candidates
        .into_iter()
        .flatten()
        .find_map(Value::as_str)
        .map(str::trim)
        .filter(|message| !message.is_empty())
        .map(str::to_owned)
}

fn body_retry_after(payload: &Value) -> Option<u64> {
    [payload.get("retry_after"), payload.pointer("/error/retry_after")]
        .into_iter()
        .flatten()
        .find_map(|value| match value {
            Value::Number(number) => number.as_u64().or_else(|| number.as_f64().and_then(whole_seconds)),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole_seconds(seconds: f64) -> Option<u64> {
    (seconds.is_finite() && seconds >= 0.0).then(|| seconds.ceil() as u64)
}

fn excerpt(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    Some(trimmed.chars().take(MAX_MESSAGE_CHARS).collect())
}

const fn default_message(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::InvalidRequest => "the backend rejected the request",
        ErrorKind::RateLimited => "rate limit exceeded",
        ErrorKind::UpstreamUnavailable => "the backend is temporarily unavailable",
        ErrorKind::UpstreamError | ErrorKind::Internal => "the backend returned an error",
    }
}
