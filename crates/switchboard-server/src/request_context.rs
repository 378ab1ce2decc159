use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use switchboard_core::RequestContext;

/// Middleware that attaches a `RequestContext` to every request
///
/// Handlers read the client's headers and the correlation id from it.
pub async fn request_context_middleware(request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();

    let context = RequestContext::from_parts(parts.clone());
    tracing::debug!(
        request_id = %context.request_id,
        method = %parts.method,
        path = %parts.uri.path(),
        "request received"
    );

    let mut request = Request::from_parts(parts, body);
    request.extensions_mut().insert(context);

    next.run(request).await
}
