// Shared across several test binaries; not every binary uses every helper.
#![allow(dead_code)]

use async_trait::async_trait;
use chat2poe::protocol::{Attachment, ProtocolMessage, QueryOptions};
use chat2poe::{Chat2PoeError, FragmentStream, PoeProvider};
use futures_util::stream;
use futures_util::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// What the fake provider should feed the pipeline under test.
#[derive(Clone)]
pub enum Script {
    /// Yield these fragments, then end cleanly.
    Fragments(Vec<&'static str>),
    /// Yield these fragments, then fail mid-stream with the given message.
    FailAfter(Vec<&'static str>, &'static str),
    /// Fail the call itself, before any fragment is produced.
    FailOnCall(&'static str),
}

/// Scripted `PoeProvider` double counting calls, so tests can pin down the
/// no-retry contract and the cache's exactly-once upload property.
pub struct ScriptedProvider {
    script: Script,
    pub stream_calls: AtomicUsize,
    pub upload_calls: AtomicUsize,
    /// Fragments actually pulled off the returned stream, across all calls.
    pub fragments_polled: Arc<AtomicUsize>,
}

impl ScriptedProvider {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            stream_calls: AtomicUsize::new(0),
            upload_calls: AtomicUsize::new(0),
            fragments_polled: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn counted(
        &self,
        items: Vec<Result<String, Chat2PoeError>>,
    ) -> FragmentStream {
        let polled = self.fragments_polled.clone();
        stream::iter(items)
            .inspect(move |_| {
                polled.fetch_add(1, Ordering::SeqCst);
            })
            .boxed()
    }
}

#[async_trait]
impl PoeProvider for ScriptedProvider {
    async fn stream_reply(
        &self,
        _messages: &[ProtocolMessage],
        _bot_name: &str,
        _api_key: &str,
        _options: &QueryOptions,
    ) -> Result<FragmentStream, Chat2PoeError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Fragments(fragments) => {
                let items: Vec<Result<String, Chat2PoeError>> =
                    fragments.iter().map(|f| Ok(f.to_string())).collect();
                Ok(self.counted(items))
            }
            Script::FailAfter(fragments, message) => {
                let mut items: Vec<Result<String, Chat2PoeError>> =
                    fragments.iter().map(|f| Ok(f.to_string())).collect();
                items.push(Err(Chat2PoeError::Provider(message.to_string())));
                Ok(self.counted(items))
            }
            Script::FailOnCall(message) => Err(Chat2PoeError::Provider(message.to_string())),
        }
    }

    async fn upload(
        &self,
        _bytes: Vec<u8>,
        file_name: &str,
        _api_key: &str,
    ) -> Result<Attachment, Chat2PoeError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Attachment {
            url: format!("https://cdn.test/{file_name}"),
            content_type: "image/png".to_string(),
            name: file_name.to_string(),
        })
    }
}

/// Drain a pipeline stream into its frames plus the terminal error, if any.
pub async fn drain_frames<S>(stream: S) -> (Vec<String>, Option<Chat2PoeError>)
where
    S: futures_util::Stream<Item = Result<String, Chat2PoeError>>,
{
    futures_util::pin_mut!(stream);
    let mut frames = Vec::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(frame) => frames.push(frame),
            Err(e) => return (frames, Some(e)),
        }
    }
    (frames, None)
}

/// Split one `event: <name>\ndata: <json>\n\n` frame.
pub fn parse_event_frame(frame: &str) -> (String, serde_json::Value) {
    let mut event = String::new();
    let mut data = String::new();
    for line in frame.lines() {
        if let Some(rest) = line.strip_prefix("event: ") {
            event = rest.to_string();
        } else if let Some(rest) = line.strip_prefix("data: ") {
            data = rest.to_string();
        }
    }
    let value = serde_json::from_str(&data).expect("frame data is JSON");
    (event, value)
}

/// Split one `data: <json>\n\n` chunk frame; `[DONE]` maps to `None`.
pub fn parse_chat_frame(frame: &str) -> Option<serde_json::Value> {
    let data = frame
        .strip_prefix("data: ")
        .and_then(|rest| rest.strip_suffix("\n\n"))
        .expect("chat frame shape");
    if data == "[DONE]" {
        return None;
    }
    Some(serde_json::from_str(data).expect("chunk data is JSON"))
}
