use chat2poe::protocol::{PoeRole, ProtocolMessage, QueryOptions};
use chat2poe::service::chat;
use chat2poe::token::count_tokens;
use chat2poe::Chat2PoeError;
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[path = "common/scripted_provider.rs"]
mod scripted_provider;

use scripted_provider::{drain_frames, parse_chat_frame, Script, ScriptedProvider};

fn user_turn(text: &str) -> Vec<ProtocolMessage> {
    vec![ProtocolMessage::new(PoeRole::User, text)]
}

#[tokio::test]
async fn streaming_tags_only_the_first_delta_with_a_role() {
    let provider = Arc::new(ScriptedProvider::new(Script::Fragments(vec!["Hel", "lo"])));
    let stream = chat::stream_chat_completion(
        provider,
        "GPT-4o".to_string(),
        "sk-poe-test".to_string(),
        user_turn("Say hello"),
        QueryOptions::default(),
    );
    let (frames, error) = drain_frames(stream).await;
    assert!(error.is_none());
    assert_eq!(frames.len(), 4);

    let first = parse_chat_frame(&frames[0]).unwrap();
    assert_eq!(first["object"], "chat.completion.chunk");
    assert_eq!(first["choices"][0]["delta"]["role"], "assistant");
    assert_eq!(first["choices"][0]["delta"]["content"], "Hel");
    assert_eq!(first["choices"][0]["finish_reason"], serde_json::Value::Null);

    let second = parse_chat_frame(&frames[1]).unwrap();
    assert!(second["choices"][0]["delta"].get("role").is_none());
    assert_eq!(second["choices"][0]["delta"]["content"], "lo");

    let terminal = parse_chat_frame(&frames[2]).unwrap();
    assert!(terminal["choices"][0].get("delta").is_none());
    assert_eq!(terminal["choices"][0]["finish_reason"], "stop");

    // Literal sentinel after the stop chunk.
    assert_eq!(frames[3], "data: [DONE]\n\n");
    assert!(parse_chat_frame(&frames[3]).is_none());
}

#[tokio::test]
async fn streaming_chunks_share_one_identity() {
    let provider = Arc::new(ScriptedProvider::new(Script::Fragments(vec!["a", "b"])));
    let stream = chat::stream_chat_completion(
        provider,
        "Claude-3.5-Sonnet".to_string(),
        "sk-poe-test".to_string(),
        user_turn("hi"),
        QueryOptions::default(),
    );
    let (frames, _) = drain_frames(stream).await;

    let chunks: Vec<_> = frames[..3]
        .iter()
        .map(|f| parse_chat_frame(f).unwrap())
        .collect();
    let id = chunks[0]["id"].as_str().unwrap();
    let fingerprint = chunks[0]["system_fingerprint"].as_str().unwrap();
    assert!(id.starts_with("chatcmpl-"));
    assert!(fingerprint.starts_with("fp_"));
    for chunk in &chunks {
        assert_eq!(chunk["id"], id);
        assert_eq!(chunk["system_fingerprint"], fingerprint);
        assert_eq!(chunk["model"], "Claude-3.5-Sonnet");
    }
}

#[tokio::test]
async fn mid_stream_failure_emits_refusal_then_raises() {
    let provider = Arc::new(ScriptedProvider::new(Script::FailAfter(
        vec!["ok so far"],
        "bot unavailable",
    )));
    let stream = chat::stream_chat_completion(
        provider.clone(),
        "GPT-4o".to_string(),
        "sk-poe-test".to_string(),
        user_turn("hello"),
        QueryOptions::default(),
    );
    let (frames, error) = drain_frames(stream).await;

    // One delta, then the refusal chunk; no [DONE] on the error path.
    assert_eq!(frames.len(), 2);
    let refusal = parse_chat_frame(&frames[1]).unwrap();
    let choice = &refusal["choices"][0];
    assert!(choice.get("delta").is_none());
    assert_eq!(choice["finish_reason"], "stop");
    assert!(choice["message"]["refusal"]
        .as_str()
        .unwrap()
        .contains("bot unavailable"));
    assert!(choice["message"].get("role").is_none());

    match error {
        Some(Chat2PoeError::Provider(msg)) => assert!(msg.contains("bot unavailable")),
        other => panic!("expected provider error, got {other:?}"),
    }
    assert_eq!(provider.stream_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn non_streaming_aggregates_with_usage() {
    let provider = ScriptedProvider::new(Script::Fragments(vec!["Hel", "lo"]));
    let body = chat::complete(
        &provider,
        "GPT-4o".to_string(),
        "sk-poe-test",
        user_turn("Say hello"),
        QueryOptions::default(),
    )
    .await;

    let v = serde_json::to_value(&body).unwrap();
    assert_eq!(v["object"], "chat.completion.chunk");
    let choice = &v["choices"][0];
    assert_eq!(choice["message"]["role"], "assistant");
    assert_eq!(choice["message"]["content"], "Hello");
    assert_eq!(choice["finish_reason"], "stop");
    assert_eq!(v["usage"]["prompt_tokens"], count_tokens("Say hello") as u64);
    assert_eq!(v["usage"]["completion_tokens"], count_tokens("Hello") as u64);
    assert_eq!(
        v["usage"]["total_tokens"],
        (count_tokens("Say hello") + count_tokens("Hello")) as u64
    );
}

#[tokio::test]
async fn non_streaming_failure_becomes_a_refusal_body() {
    let provider = ScriptedProvider::new(Script::FailOnCall("connect refused"));
    let body = chat::complete(
        &provider,
        "GPT-4o".to_string(),
        "sk-poe-test",
        user_turn("hello"),
        QueryOptions::default(),
    )
    .await;

    let v = serde_json::to_value(&body).unwrap();
    let choice = &v["choices"][0];
    assert_eq!(choice["message"]["role"], "assistant");
    assert!(choice["message"]["refusal"]
        .as_str()
        .unwrap()
        .contains("connect refused"));
    assert!(choice["message"].get("content").is_none());
    assert_eq!(choice["finish_reason"], "stop");
    assert!(v.get("usage").is_none());
    assert_eq!(provider.stream_calls.load(Ordering::SeqCst), 1);
}
