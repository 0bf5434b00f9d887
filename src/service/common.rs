use crate::models::chat::{ChatCompletionChunk, ChunkChoice};
use crate::models::poe::ProtocolMessage;
use crate::models::responses::{event_type, ResponsePayload, ResponseStatus, ResponseUsage};
use crate::models::responses::ResponseError;
use crate::token::count_tokens;
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Format one Responses-protocol SSE frame: `event: <type>\ndata: <json>\n\n`.
pub fn format_response_event(event: &str, data: &impl Serialize) -> String {
    let json = serde_json::to_string(data).unwrap_or_default();
    format!("event: {event}\ndata: {json}\n\n")
}

/// Format one Chat-protocol SSE frame: `data: <json>\n\n`.
pub fn format_chat_frame(data: &impl Serialize) -> String {
    let json = serde_json::to_string(data).unwrap_or_default();
    format!("data: {json}\n\n")
}

/// Literal terminator of a Chat-protocol stream.
pub fn sse_done_frame() -> String {
    "data: [DONE]\n\n".to_string()
}

/// Identity and header fields shared by every payload of one Responses call.
pub(crate) struct ResponseContext {
    pub id: String,
    pub model: String,
    pub instructions: String,
    pub temperature: Option<f64>,
}

impl ResponseContext {
    pub fn new(model: String, instructions: String, temperature: Option<f64>) -> Self {
        Self {
            id: format!("resp-{}", Uuid::new_v4().simple()),
            model,
            instructions,
            temperature,
        }
    }

    /// Fresh payload carrying this call's identity; `created_at` is stamped
    /// per event, matching the upstream wire behavior.
    pub fn payload(&self, status: ResponseStatus) -> ResponsePayload {
        ResponsePayload::new(
            self.id.clone(),
            self.model.clone(),
            self.instructions.clone(),
            self.temperature,
            status,
            unix_now(),
        )
    }

    /// Terminal payload for a failed call. Streaming passes the usage
    /// accumulated so far; the error object reuses the `response.failed`
    /// type tag.
    pub fn failed_payload(
        &self,
        message: &str,
        code: Option<&str>,
        usage: Option<ResponseUsage>,
    ) -> ResponsePayload {
        let mut payload = self.payload(ResponseStatus::Failed);
        payload.store = false;
        payload.error = Some(ResponseError {
            kind: event_type::FAILED.to_string(),
            code: code.map(|c| c.to_string()),
            message: message.to_string(),
        });
        payload.usage = usage;
        payload
    }
}

/// Identity fields shared by every chunk of one Chat Completions call.
pub(crate) struct ChatContext {
    pub id: String,
    pub model: String,
    pub system_fingerprint: String,
}

impl ChatContext {
    pub fn new(model: String) -> Self {
        let fingerprint_seed = Uuid::new_v4().simple().to_string();
        Self {
            id: format!("chatcmpl-{}", Uuid::new_v4().simple()),
            model,
            system_fingerprint: format!("fp_{}", &fingerprint_seed[..10]),
        }
    }

    pub fn chunk(&self, choice: ChunkChoice) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk".to_string(),
            created: unix_now(),
            model: self.model.clone(),
            system_fingerprint: self.system_fingerprint.clone(),
            choices: vec![choice],
            usage: None,
        }
    }
}

/// Token usage over the normalized input plus the accumulated output text.
/// Computed once, at finalize or aggregation time.
pub(crate) fn create_usage(
    input_messages: &[ProtocolMessage],
    accumulated_text: &str,
) -> ResponseUsage {
    let input_tokens: usize = input_messages
        .iter()
        .map(|m| count_tokens(&m.content))
        .sum();
    ResponseUsage::new(input_tokens, count_tokens(accumulated_text))
}
