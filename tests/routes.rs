//! End-to-end router tests with a scripted chain

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::json;
use tower::util::ServiceExt;

use streamchain::error::Error;
use streamchain::{
    Chain, ChainInputs, ChainOutputs, ChainRouter, EventSink, ResponseCache, StreamingMode,
};

/// Chain that echoes its input in two tokens and counts executions
struct EchoChain {
    executions: AtomicUsize,
    fail: bool,
}

impl EchoChain {
    fn new() -> Self {
        Self {
            executions: AtomicUsize::new(0),
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            executions: AtomicUsize::new(0),
            fail: true,
        }
    }

    fn execution_count(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Chain for EchoChain {
    fn name(&self) -> &str {
        "echo"
    }

    fn input_keys(&self) -> Vec<String> {
        vec!["input".to_string()]
    }

    async fn execute(
        &self,
        inputs: &ChainInputs,
        sink: &EventSink,
    ) -> Result<ChainOutputs, Error> {
        self.executions.fetch_add(1, Ordering::SeqCst);

        if self.fail {
            return Err(Error::Chain("backend exploded".to_string()));
        }

        let input = inputs["input"].as_str().unwrap_or_default();
        sink.token("echo: ").await;
        sink.token(input).await;

        let mut outputs = ChainOutputs::new();
        outputs.insert("text".to_string(), json!(format!("echo: {}", input)));
        Ok(outputs)
    }
}

async fn post_chat(router: Router, body: serde_json::Value) -> (StatusCode, String, String) {
    let request = Request::builder()
        .method("POST")
        .uri("/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, content_type, String::from_utf8_lossy(&body).to_string())
}

#[tokio::test]
async fn test_text_streaming_route() {
    let router = ChainRouter::new()
        .chain_route("/chat", Arc::new(EchoChain::new()), StreamingMode::Text)
        .into_router();

    let (status, content_type, body) = post_chat(router, json!({"input": "hi"})).await;

    assert_eq!(status, StatusCode::OK);
    assert!(content_type.starts_with("text/event-stream"));

    assert!(body.contains("event: completion\ndata: echo: \n"), "body: {}", body);
    assert!(body.contains("event: completion\ndata: hi\n"), "body: {}", body);

    // Single end event carrying the outputs, after the tokens
    let end_pos = body.find("event: end").expect("no end event");
    assert!(body[end_pos..].contains(r#"{"text":"echo: hi"}"#), "body: {}", body);
    assert_eq!(body.matches("event: end").count(), 1);
    assert!(!body.contains("event: error"));
}

#[tokio::test]
async fn test_json_streaming_route() {
    let router = ChainRouter::new()
        .chain_route("/chat", Arc::new(EchoChain::new()), StreamingMode::Json)
        .into_router();

    let (status, _, body) = post_chat(router, json!({"input": "hi"})).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#"data: {"token":"echo: "}"#), "body: {}", body);
    assert!(body.contains(r#"data: {"token":"hi"}"#), "body: {}", body);
    assert!(body.contains("event: end"));
}

#[tokio::test]
async fn test_off_mode_returns_outputs_json() {
    let router = ChainRouter::new()
        .chain_route("/chat", Arc::new(EchoChain::new()), StreamingMode::Off)
        .into_router();

    let (status, content_type, body) = post_chat(router, json!({"input": "hi"})).await;

    assert_eq!(status, StatusCode::OK);
    assert!(content_type.starts_with("application/json"));

    let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(parsed["outputs"]["text"], json!("echo: hi"));
}

#[tokio::test]
async fn test_missing_input_rejected_before_stream() {
    let router = ChainRouter::new()
        .chain_route("/chat", Arc::new(EchoChain::new()), StreamingMode::Text)
        .into_router();

    let (status, content_type, body) = post_chat(router, json!({"wrong_key": "hi"})).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(content_type.starts_with("application/json"));

    let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(parsed["status_code"], 422);
    assert!(parsed["detail"].as_str().unwrap().contains("input"));
}

#[tokio::test]
async fn test_failing_chain_streams_generic_error() {
    let router = ChainRouter::new()
        .chain_route("/chat", Arc::new(EchoChain::failing()), StreamingMode::Text)
        .into_router();

    let (status, _, body) = post_chat(router, json!({"input": "hi"})).await;

    // The stream has already started, so the failure is an SSE event
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.matches("event: error").count(), 1);
    assert!(body.contains(r#""detail":"Internal Server Error""#), "body: {}", body);
    assert!(!body.contains("backend exploded"), "internal detail leaked: {}", body);
    assert!(!body.contains("event: end"));
}

#[tokio::test]
async fn test_failing_chain_off_mode_is_500_json() {
    let router = ChainRouter::new()
        .chain_route("/chat", Arc::new(EchoChain::failing()), StreamingMode::Off)
        .into_router();

    let (status, _, body) = post_chat(router, json!({"input": "hi"})).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(parsed["detail"], "Internal Server Error");
}

#[tokio::test]
async fn test_cache_off_mode_skips_second_execution() {
    let chain = Arc::new(EchoChain::new());
    let cache = ResponseCache::new(16, Duration::from_secs(60));
    let router = ChainRouter::with_cache(cache)
        .chain_route("/chat", chain.clone(), StreamingMode::Off)
        .into_router();

    let (_, _, first) = post_chat(router.clone(), json!({"input": "hi"})).await;
    let (_, _, second) = post_chat(router, json!({"input": "hi"})).await;

    assert_eq!(first, second);
    assert_eq!(chain.execution_count(), 1);
}

#[tokio::test]
async fn test_cache_streaming_replays_tokens() {
    let chain = Arc::new(EchoChain::new());
    let cache = ResponseCache::new(16, Duration::from_secs(60));
    let router = ChainRouter::with_cache(cache)
        .chain_route("/chat", chain.clone(), StreamingMode::Text)
        .into_router();

    let (_, _, _first) = post_chat(router.clone(), json!({"input": "hi"})).await;
    let (status, content_type, replay) = post_chat(router, json!({"input": "hi"})).await;

    assert_eq!(chain.execution_count(), 1);
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.starts_with("text/event-stream"));
    // Replayed stream still looks like a normal token stream
    assert!(replay.contains("event: completion"), "replay: {}", replay);
    assert!(replay.contains("echo: hi"), "replay: {}", replay);
    assert!(replay.contains("event: end"));
}

#[tokio::test]
async fn test_cache_distinguishes_inputs() {
    let chain = Arc::new(EchoChain::new());
    let cache = ResponseCache::new(16, Duration::from_secs(60));
    let router = ChainRouter::with_cache(cache)
        .chain_route("/chat", chain.clone(), StreamingMode::Off)
        .into_router();

    let (_, _, first) = post_chat(router.clone(), json!({"input": "a"})).await;
    let (_, _, second) = post_chat(router, json!({"input": "b"})).await;

    assert_ne!(first, second);
    assert_eq!(chain.execution_count(), 2);
}

#[tokio::test]
async fn test_malformed_body_is_client_error() {
    let router = ChainRouter::new()
        .chain_route("/chat", Arc::new(EchoChain::new()), StreamingMode::Text)
        .into_router();

    let request = Request::builder()
        .method("POST")
        .uri("/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert!(response.status().is_client_error());
}
