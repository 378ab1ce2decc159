use http::StatusCode;
use switchboard_core::HttpError;
use thiserror::Error;

use crate::classify;

/// Closed taxonomy every failure is mapped onto before reaching a client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The client request cannot be served as sent
    InvalidRequest,
    /// The backend could not be reached or is overloaded
    UpstreamUnavailable,
    /// The backend failed in some other way
    UpstreamError,
    /// The backend signalled rate limiting, whatever status it used
    RateLimited,
    /// A fault inside the adapter
    Internal,
}

impl ErrorKind {
    /// Client-protocol error type string
    pub const fn error_type(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request_error",
            Self::RateLimited => "rate_limit_error",
            Self::UpstreamUnavailable => "overloaded_error",
            Self::UpstreamError | Self::Internal => "api_error",
        }
    }
}

/// A classified failure, ready to be rendered for the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEnvelope {
    pub kind: ErrorKind,
    pub message: String,
    /// Seconds to wait before retrying, when the backend supplied a hint
    pub retry_after: Option<u64>,
}

impl ErrorEnvelope {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
        }
    }
}

/// Errors that can occur while adapting a request
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Client sent a malformed or invalid request
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Backend answered with a failure that has already been classified
    #[error("{}", .0.message)]
    Upstream(ErrorEnvelope),

    /// Backend could not be reached, timed out, or dropped the connection
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Backend answered with a body that could not be decoded
    #[error("malformed backend response: {0}")]
    Decode(String),

    /// Unexpected internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AdapterError {
    /// Map this error onto the client-facing taxonomy
    pub fn envelope(&self) -> ErrorEnvelope {
        match self {
            Self::InvalidRequest(_) => ErrorEnvelope::new(ErrorKind::InvalidRequest, self.to_string()),
            Self::Upstream(envelope) => envelope.clone(),
            Self::Unavailable(_) => ErrorEnvelope::new(ErrorKind::UpstreamUnavailable, self.to_string()),
            Self::Decode(_) => ErrorEnvelope::new(ErrorKind::UpstreamError, self.to_string()),
            Self::Internal(_) => ErrorEnvelope::new(ErrorKind::Internal, "an internal error occurred"),
        }
    }
}

impl HttpError for AdapterError {
    fn status_code(&self) -> StatusCode {
        classify::public_status(self.envelope().kind)
    }

    fn error_type(&self) -> &str {
        self.envelope().kind.error_type()
    }

    fn client_message(&self) -> String {
        self.envelope().message
    }

    fn retry_after(&self) -> Option<u64> {
        self.envelope().retry_after
    }
}
