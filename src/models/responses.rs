use serde::Serialize;
use serde_json::{json, Value};

/// SSE event names of the Responses streaming protocol, in emission order.
pub mod event_type {
    pub const CREATED: &str = "response.created";
    pub const IN_PROGRESS: &str = "response.in_progress";
    pub const COMPLETED: &str = "response.completed";
    pub const FAILED: &str = "response.failed";

    pub const OUTPUT_ITEM_ADDED: &str = "response.output_item.added";
    pub const OUTPUT_ITEM_DONE: &str = "response.output_item.done";

    pub const CONTENT_PART_ADDED: &str = "response.content_part.added";
    pub const CONTENT_PART_DONE: &str = "response.content_part.done";

    pub const OUTPUT_TEXT_DELTA: &str = "response.output_text.delta";
    pub const OUTPUT_TEXT_DONE: &str = "response.output_text.done";
}

/// Lifecycle status carried by response and item payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    InProgress,
    Completed,
    Failed,
}

/// One text part of an output item.
#[derive(Debug, Clone, Serialize)]
pub struct Part {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
    pub annotations: Vec<Value>,
}

impl Part {
    pub fn output_text(text: impl Into<String>) -> Self {
        Self {
            kind: "output_text".to_string(),
            text: text.into(),
            annotations: Vec::new(),
        }
    }
}

/// One output item (always a message item in this adapter).
#[derive(Debug, Clone, Serialize)]
pub struct Item {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: ResponseStatus,
    pub role: String,
    pub content: Vec<Part>,
}

impl Item {
    pub fn message(id: impl Into<String>, status: ResponseStatus, content: Vec<Part>) -> Self {
        Self {
            id: id.into(),
            kind: "message".to_string(),
            status,
            role: "assistant".to_string(),
            content,
        }
    }
}

/// `response.output_item.added` / `response.output_item.done` payload.
#[derive(Debug, Clone, Serialize)]
pub struct OutputItemEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub output_index: u32,
    pub item: Item,
}

/// `response.content_part.added` / `response.content_part.done` payload.
#[derive(Debug, Clone, Serialize)]
pub struct ContentPartEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub item_id: String,
    pub output_index: u32,
    pub content_index: u32,
    pub part: Part,
}

/// `response.output_text.delta` payload, carrying one fragment verbatim.
#[derive(Debug, Clone, Serialize)]
pub struct TextDeltaEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub item_id: String,
    pub output_index: u32,
    pub content_index: u32,
    pub delta: String,
}

/// `response.output_text.done` payload with the full accumulated text.
#[derive(Debug, Clone, Serialize)]
pub struct TextDoneEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub item_id: String,
    pub output_index: u32,
    pub content_index: u32,
    pub text: String,
}

/// Token accounting attached to terminal payloads.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub total_tokens: usize,
    pub output_tokens_details: Value,
}

impl ResponseUsage {
    pub fn new(input_tokens: usize, output_tokens: usize) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
            output_tokens_details: json!({}),
        }
    }
}

/// Error object embedded in a failed response payload.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseError {
    #[serde(rename = "type")]
    pub kind: String,
    pub code: Option<String>,
    pub message: String,
}

/// Full response object, emitted in `response.created` / `response.in_progress`
/// / `response.completed` envelopes and as the non-streaming body.
///
/// The trailing constant fields mirror the upstream wire format; clients
/// parse them even though this adapter never varies them.
#[derive(Debug, Clone, Serialize)]
pub struct ResponsePayload {
    pub id: String,
    pub model: String,
    pub created_at: u64,
    pub instructions: String,
    pub status: ResponseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
    pub output: Vec<Item>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<ResponseUsage>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub object: String,
    pub parallel_tool_calls: bool,
    pub reasoning: Value,
    pub store: bool,
    pub text: Value,
    pub tool_choice: String,
    pub truncation: String,
    pub metadata: Value,
}

impl ResponsePayload {
    pub fn new(
        id: impl Into<String>,
        model: impl Into<String>,
        instructions: impl Into<String>,
        temperature: Option<f64>,
        status: ResponseStatus,
        created_at: u64,
    ) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            created_at,
            instructions: instructions.into(),
            status,
            error: None,
            output: Vec::new(),
            usage: None,
            temperature,
            top_p: Some(1.0),
            object: "response".to_string(),
            parallel_tool_calls: true,
            reasoning: json!({"effort": null, "summary": null}),
            store: true,
            text: json!({"format": {"type": "text"}}),
            tool_choice: "auto".to_string(),
            truncation: "disabled".to_string(),
            metadata: json!({}),
        }
    }
}

/// `{ "type": ..., "response": ... }` wrapper for lifecycle events.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub response: ResponsePayload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_carries_wire_constants() {
        let p = ResponsePayload::new(
            "resp-1",
            "GPT-4o",
            "You are a helpful assistant.",
            None,
            ResponseStatus::InProgress,
            1_700_000_000,
        );
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["object"], "response");
        assert_eq!(v["status"], "in_progress");
        assert_eq!(v["tool_choice"], "auto");
        assert_eq!(v["truncation"], "disabled");
        assert_eq!(v["parallel_tool_calls"], true);
        assert_eq!(v["text"]["format"]["type"], "text");
        assert_eq!(v["temperature"], Value::Null);
        // Optional error/usage stay off the wire until set.
        assert!(v.get("error").is_none());
        assert!(v.get("usage").is_none());
    }

    #[test]
    fn usage_totals_inputs_and_outputs() {
        let u = ResponseUsage::new(12, 30);
        assert_eq!(u.total_tokens, 42);
        let v = serde_json::to_value(&u).unwrap();
        assert_eq!(v["output_tokens_details"], json!({}));
    }

    #[test]
    fn statuses_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&ResponseStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert_eq!(
            serde_json::to_string(&ResponseStatus::Failed).unwrap(),
            "\"failed\""
        );
    }
}
