use crate::error::Chat2PoeError;
use crate::models::poe::{Attachment, ProtocolMessage, QueryOptions};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use http::header;
use serde_json::{json, Value};

/// Lazy, cancelable sequence of text fragments from one bot reply.
/// Dropping the stream abandons the upstream call.
pub type FragmentStream = BoxStream<'static, Result<String, Chat2PoeError>>;

/// Upstream collaborator: one bot-reply streaming call plus one file upload.
///
/// Mid-stream failures surface as an `Err` item; the pipelines decide
/// whether to fold the error into the event stream or into a structured
/// body. Errors are not retried here: the stream is already partially
/// consumed by the time they appear, so a retry would replay delivered
/// fragments to the client.
#[async_trait]
pub trait PoeProvider: Send + Sync {
    async fn stream_reply(
        &self,
        messages: &[ProtocolMessage],
        bot_name: &str,
        api_key: &str,
        options: &QueryOptions,
    ) -> Result<FragmentStream, Chat2PoeError>;

    async fn upload(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        api_key: &str,
    ) -> Result<Attachment, Chat2PoeError>;
}

/// One event of the bot query SSE protocol.
#[derive(Debug, PartialEq)]
enum BotEvent {
    /// Incremental text to append.
    Text(String),
    /// Full-text replacement; this adapter forwards append-style deltas
    /// only, so these are dropped.
    ReplaceResponse,
    Done,
    Error { message: String },
    /// Suggested replies, metadata and other event kinds we do not forward.
    Other,
}

fn parse_bot_event(block: &str) -> BotEvent {
    let mut event_name = "";
    let mut data = String::new();
    for line in block.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(rest) = line.strip_prefix("event:") {
            event_name = rest.trim();
        } else if let Some(rest) = line.strip_prefix("data:") {
            data.push_str(rest.trim_start());
        }
    }

    match event_name {
        "text" => {
            let text = serde_json::from_str::<Value>(&data)
                .ok()
                .and_then(|v| v.get("text").and_then(|t| t.as_str()).map(String::from))
                .unwrap_or_default();
            BotEvent::Text(text)
        }
        "replace_response" => BotEvent::ReplaceResponse,
        "done" => BotEvent::Done,
        "error" => {
            let message = serde_json::from_str::<Value>(&data)
                .ok()
                .and_then(|v| v.get("text").and_then(|t| t.as_str()).map(String::from))
                .unwrap_or_else(|| "upstream bot error".to_string());
            BotEvent::Error { message }
        }
        _ => BotEvent::Other,
    }
}

/// HTTP client for the Poe bot query API.
pub struct PoeApiClient {
    http: reqwest::Client,
    base_url: String,
    upload_url: String,
}

impl PoeApiClient {
    /// Endpoints default to the public Poe API; `POE_BASE_URL` and
    /// `POE_FILE_UPLOAD_URL` override them for testing.
    pub fn new(http: reqwest::Client) -> Self {
        let base_url = std::env::var("POE_BASE_URL")
            .unwrap_or_else(|_| "https://api.poe.com/bot".to_string());
        let upload_url = std::env::var("POE_FILE_UPLOAD_URL").unwrap_or_else(|_| {
            "https://www.quora.com/poe_api/file_upload_3RD_PARTY_POST".to_string()
        });
        Self {
            http,
            base_url,
            upload_url,
        }
    }

    fn query_payload(messages: &[ProtocolMessage], options: &QueryOptions) -> Value {
        let query: Vec<Value> = messages
            .iter()
            .map(|m| {
                json!({
                    "role": m.role,
                    "content": m.content,
                    "content_type": "text/markdown",
                    "attachments": m.attachments,
                })
            })
            .collect();
        let mut payload = json!({
            "version": "1.0",
            "type": "query",
            "query": query,
            "user_id": "",
            "conversation_id": "",
            "message_id": "",
            "skip_system_prompt": true,
        });
        if let Some(temperature) = options.temperature {
            payload["temperature"] = json!(temperature);
        }
        payload
    }
}

#[async_trait]
impl PoeProvider for PoeApiClient {
    async fn stream_reply(
        &self,
        messages: &[ProtocolMessage],
        bot_name: &str,
        api_key: &str,
        options: &QueryOptions,
    ) -> Result<FragmentStream, Chat2PoeError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), bot_name);
        let payload = Self::query_payload(messages, options);

        let resp = self
            .http
            .post(&url)
            .header(header::ACCEPT, "text/event-stream")
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Chat2PoeError::Provider(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Chat2PoeError::Provider(format!(
                "bot query returned {status}: {body}"
            )));
        }

        let mut body = resp.bytes_stream();
        let fragments = async_stream::try_stream! {
            let mut buf: Vec<u8> = Vec::new();
            'consume: while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(|e| Chat2PoeError::Provider(e.to_string()))?;
                buf.extend_from_slice(&chunk);
                while let Some(end) = buf.windows(2).position(|w| w == b"\n\n") {
                    let block: Vec<u8> = buf.drain(..end + 2).collect();
                    let block = String::from_utf8_lossy(&block);
                    match parse_bot_event(&block) {
                        BotEvent::Text(text) if !text.is_empty() => yield text,
                        BotEvent::Done => break 'consume,
                        BotEvent::Error { message } => {
                            Err(Chat2PoeError::Provider(message))?;
                        }
                        _ => {}
                    }
                }
            }
        };
        Ok(Box::pin(fragments))
    }

    async fn upload(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        api_key: &str,
    ) -> Result<Attachment, Chat2PoeError> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        let resp = self
            .http
            .post(&self.upload_url)
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Chat2PoeError::UploadFailed(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Chat2PoeError::UploadFailed(format!(
                "upload endpoint returned {status}: {body}"
            )));
        }

        let v: Value = resp
            .json()
            .await
            .map_err(|e| Chat2PoeError::UploadFailed(e.to_string()))?;
        let url = v
            .get("attachment_url")
            .and_then(|u| u.as_str())
            .ok_or_else(|| {
                Chat2PoeError::UploadFailed("upload response missing 'attachment_url'".to_string())
            })?
            .to_string();
        let content_type = v
            .get("mime_type")
            .and_then(|m| m.as_str())
            .unwrap_or("application/octet-stream")
            .to_string();

        tracing::info!("image {file_name} has been uploaded");
        Ok(Attachment {
            url,
            content_type,
            name: file_name.to_string(),
        })
    }
}
