use http::HeaderMap;
use http::header::USER_AGENT;

/// Per-request context handed from the HTTP layer to the adapter
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// HTTP request parts (method, URI, headers, extensions)
    pub parts: http::request::Parts,
    /// Correlation identifier used in logs
    pub request_id: String,
}

impl RequestContext {
    /// Build a context from incoming request parts, assigning a fresh request id
    pub fn from_parts(parts: http::request::Parts) -> Self {
        Self {
            parts,
            request_id: uuid::Uuid::new_v4().simple().to_string(),
        }
    }

    /// Create a minimal context with no headers
    ///
    /// # Panics
    ///
    /// Never in practice: the request is built from constant parts.
    pub fn empty() -> Self {
        let (parts, ()) = http::Request::builder()
            .method(http::Method::POST)
            .uri("/")
            .body(())
            .expect("valid minimal request")
            .into_parts();

        Self::from_parts(parts)
    }

    /// Access request headers
    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// The client's `User-Agent`, if present and valid UTF-8
    pub fn user_agent(&self) -> Option<&str> {
        self.parts.headers.get(USER_AGENT).and_then(|value| value.to_str().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_context_has_no_headers() {
        let ctx = RequestContext::empty();
        assert!(ctx.headers().is_empty());
        assert!(ctx.user_agent().is_none());
        assert_eq!(ctx.request_id.len(), 32);
    }

    #[test]
    fn user_agent_is_read_from_headers() {
        let (parts, ()) = http::Request::builder()
            .header(USER_AGENT, "claude-code/1.0.0")
            .body(())
            .unwrap()
            .into_parts();

        let ctx = RequestContext::from_parts(parts);
        assert_eq!(ctx.user_agent(), Some("claude-code/1.0.0"));
    }

    #[test]
    fn request_ids_differ() {
        assert_ne!(RequestContext::empty().request_id, RequestContext::empty().request_id);
    }
}
