mod harness;

use harness::config::ConfigBuilder;
use harness::mock_backend::{MockBackend, Reply};
use harness::server::TestServer;
use serde_json::{Value, json};

/// Statuses a client of the Messages API may legitimately see
const STANDARD_STATUSES: [u16; 8] = [400, 401, 403, 404, 413, 429, 500, 529];

fn request(stream: bool) -> Value {
    json!({
        "model": "claude-3-5-sonnet-20241022",
        "max_tokens": 64,
        "stream": stream,
        "messages": [{"role": "user", "content": "ping"}]
    })
}

/// Send one request against a backend that always answers with `reply`
async fn respond(reply: Reply, stream: bool) -> (u16, Option<String>, Value) {
    let mock = MockBackend::start(reply).await.unwrap();
    let server = TestServer::start(ConfigBuilder::new(&mock.base_url()).build())
        .await
        .unwrap();

    let resp = server.post_messages(&request(stream)).await;
    let status = resp.status().as_u16();
    let retry_after = resp
        .headers()
        .get("retry-after")
        .map(|value| value.to_str().unwrap().to_owned());
    let body = resp.json().await.unwrap();

    (status, retry_after, body)
}

#[tokio::test]
async fn backend_statuses_never_leak() {
    for backend_status in [400, 401, 402, 403, 404, 408, 409, 413, 418, 420, 422, 429, 449, 500, 502, 503, 504, 509, 529, 599] {
        let (status, _, body) = respond(
            Reply::status(backend_status, json!({"error": {"message": "backend said no"}})),
            false,
        )
        .await;

        assert!(
            STANDARD_STATUSES.contains(&status),
            "backend {backend_status} leaked as {status}"
        );
        assert_eq!(body["type"], "error", "backend {backend_status}");
        assert!(body["error"]["type"].is_string(), "backend {backend_status}");
        assert!(body["error"]["message"].is_string(), "backend {backend_status}");
    }
}

#[tokio::test]
async fn vendor_449_looks_like_429() {
    let body = json!({"error": {"message": "rate limited"}});

    let (status_449, _, body_449) = respond(Reply::status(449, body.clone()), false).await;
    let (status_429, _, body_429) = respond(Reply::status(429, body), false).await;

    assert_eq!(status_449, 429);
    assert_eq!(status_449, status_429);
    assert_eq!(body_449, body_429);
    assert_eq!(body_449["error"]["type"], "rate_limit_error");
}

#[tokio::test]
async fn vendor_rate_limit_sent_with_200_is_detected() {
    let (status, _, body) = respond(
        Reply::ok(json!({"status": "449", "msg": "You exceeded your current rate limit, please retry later"})),
        false,
    )
    .await;

    assert_eq!(status, 429);
    assert_eq!(body["error"]["type"], "rate_limit_error");
    assert_eq!(
        body["error"]["message"],
        "You exceeded your current rate limit, please retry later"
    );
}

#[tokio::test]
async fn rate_limit_before_stream_starts_is_an_http_error() {
    let (status, _, body) = respond(
        Reply::status(429, json!({"error": {"message": "Too many requests"}})),
        true,
    )
    .await;

    assert_eq!(status, 429);
    assert_eq!(body["error"]["type"], "rate_limit_error");
}

#[tokio::test]
async fn retry_after_is_forwarded() {
    let (status, retry_after, _) = respond(
        Reply::Json {
            status: 429,
            body: json!({"error": {"message": "slow down"}}),
            retry_after: Some(17),
        },
        false,
    )
    .await;

    assert_eq!(status, 429);
    assert_eq!(retry_after.as_deref(), Some("17"));
}

#[tokio::test]
async fn overloaded_backend_maps_to_529() {
    let (status, _, body) = respond(Reply::status(503, json!({"error": {"message": "overloaded"}})), false).await;

    assert_eq!(status, 529);
    assert_eq!(body["error"]["type"], "overloaded_error");
}

#[tokio::test]
async fn unreachable_backend_maps_to_529() {
    // Nothing listens on the discard port in the test environment
    let server = TestServer::start(ConfigBuilder::new("http://127.0.0.1:9/v1").build())
        .await
        .unwrap();

    let resp = server.post_messages(&request(false)).await;

    assert_eq!(resp.status(), 529);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["type"], "overloaded_error");
}
