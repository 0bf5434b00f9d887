use axum::body::Body;
use chat2poe::cache::MemoryCache;
use chat2poe::server::build_router;
use chat2poe::util::AppState;
use http::{header, Request, StatusCode};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

#[path = "common/scripted_provider.rs"]
mod scripted_provider;

use scripted_provider::{Script, ScriptedProvider};

fn app_with(provider: Arc<ScriptedProvider>) -> axum::Router {
    let state = AppState::with_collaborators(
        provider,
        Arc::new(MemoryCache::new()),
        Duration::from_secs(600),
    );
    build_router(Arc::new(state))
}

fn post_json(uri: &str, api_key: Option<&str>, body: &serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(key) = api_key {
        builder = builder.header("x-api-key", key);
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("request build")
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body read");
    serde_json::from_slice(&bytes).expect("body is JSON")
}

#[tokio::test]
async fn missing_api_key_is_unauthorized() {
    let app = app_with(Arc::new(ScriptedProvider::new(Script::Fragments(vec![
        "hi",
    ]))));
    let body = json!({"model": "GPT-4o", "input": "hello"});
    let response = app
        .oneshot(post_json("/v1/responses", None, &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let v = body_json(response).await;
    assert!(v["error"]["message"]
        .as_str()
        .unwrap()
        .contains("API key required"));
}

#[tokio::test]
async fn missing_model_is_a_bad_request() {
    let app = app_with(Arc::new(ScriptedProvider::new(Script::Fragments(vec![
        "hi",
    ]))));
    let body = json!({"input": "hello"});
    let response = app
        .oneshot(post_json("/v1/responses", Some("sk-poe-test"), &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn empty_input_is_a_bad_request() {
    let app = app_with(Arc::new(ScriptedProvider::new(Script::Fragments(vec![
        "hi",
    ]))));
    let body = json!({"model": "GPT-4o", "input": []});
    let response = app
        .oneshot(post_json("/v1/responses", Some("sk-poe-test"), &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let v = body_json(response).await;
    assert!(v["error"]["message"].as_str().unwrap().contains("input"));
}

#[tokio::test]
async fn non_streaming_responses_returns_a_completed_payload() {
    let provider = Arc::new(ScriptedProvider::new(Script::Fragments(vec!["Hel", "lo"])));
    let app = app_with(provider.clone());
    let body = json!({
        "model": "GPT-4o",
        "input": [
            {"role": "user", "content": [{"type": "input_text", "text": "Say hello"}]}
        ],
        "stream": false
    });
    let response = app
        .oneshot(post_json("/v1/responses", Some("sk-poe-test"), &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let v = body_json(response).await;
    assert_eq!(v["object"], "response");
    assert_eq!(v["status"], "completed");
    assert_eq!(v["output"][0]["content"][0]["text"], "Hello");
    assert_eq!(provider.stream_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn provider_failure_is_a_structured_body_with_http_success() {
    let provider = Arc::new(ScriptedProvider::new(Script::FailOnCall("bot exploded")));
    let app = app_with(provider);
    let body = json!({"model": "GPT-4o", "input": "hello", "stream": false});
    let response = app
        .oneshot(post_json("/v1/responses", Some("sk-poe-test"), &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let v = body_json(response).await;
    assert_eq!(v["status"], "failed");
    assert!(v["error"]["message"].as_str().unwrap().contains("bot exploded"));
}

#[tokio::test]
async fn streaming_chat_completions_ends_with_done() {
    let provider = Arc::new(ScriptedProvider::new(Script::Fragments(vec!["Hel", "lo"])));
    let app = app_with(provider);
    let body = json!({
        "model": "GPT-4o",
        "messages": [{"role": "user", "content": "Say hello"}],
        "stream": true
    });
    let response = app
        .oneshot(post_json("/v1/chat/completions", Some("sk-poe-test"), &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
        Some("text/event-stream")
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("stream body");
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("\"content\":\"Hel\""));
    assert!(text.contains("\"content\":\"lo\""));
    assert!(text.ends_with("data: [DONE]\n\n"));
}

#[tokio::test]
async fn inline_images_upload_once_across_requests() {
    let provider = Arc::new(ScriptedProvider::new(Script::Fragments(vec!["ok"])));
    let app = app_with(provider.clone());
    let body = json!({
        "model": "GPT-4o",
        "input": [{
            "role": "user",
            "content": [
                {"type": "input_text", "text": "describe this"},
                {"type": "input_image", "image_url": "data:image/png;base64,aGVsbG8="}
            ]
        }],
        "stream": false
    });

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(post_json("/v1/responses", Some("sk-poe-test"), &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    // Second request hits the attachment cache instead of re-uploading.
    assert_eq!(provider.upload_calls.load(Ordering::SeqCst), 1);
    assert_eq!(provider.stream_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn status_route_lists_both_surfaces() {
    let app = app_with(Arc::new(ScriptedProvider::new(Script::Fragments(vec![
        "hi",
    ]))));
    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let v = body_json(response).await;
    let routes = v["routes"].as_array().unwrap();
    assert!(routes.contains(&json!("/v1/responses")));
    assert!(routes.contains(&json!("/v1/chat/completions")));
}
