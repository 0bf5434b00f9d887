use serde::Serialize;
use serde_with::skip_serializing_none;

/// Incremental delta carried by a streaming choice.
///
/// `role` is only present on the first chunk of a stream; later chunks
/// carry content alone.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize)]
pub struct Delta {
    pub role: Option<String>,
    pub content: Option<String>,
}

impl Delta {
    pub fn first(content: impl Into<String>) -> Self {
        Self {
            role: Some("assistant".to_string()),
            content: Some(content.into()),
        }
    }

    pub fn content(content: impl Into<String>) -> Self {
        Self {
            role: None,
            content: Some(content.into()),
        }
    }
}

/// Full message object used by non-streaming bodies and refusal chunks.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChunkMessage {
    pub role: Option<String>,
    pub content: Option<String>,
    pub refusal: Option<String>,
}

impl ChunkMessage {
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Some("assistant".to_string()),
            content: Some(content.into()),
            refusal: None,
        }
    }

    /// Refusal shape used by the mid-stream error chunk; the role is left
    /// off there, matching the delta chunks around it.
    pub fn refusal(message: impl Into<String>) -> Self {
        Self {
            role: None,
            content: None,
            refusal: Some(message.into()),
        }
    }
}

/// One choice in a chunk. Exactly one of `delta` / `message` is populated,
/// depending on streaming mode; `finish_reason` stays on the wire as null
/// until the terminal chunk.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkChoice {
    pub index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<Delta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<ChunkMessage>,
    pub finish_reason: Option<String>,
}

/// Token accounting in Chat Completions naming.
#[derive(Debug, Clone, Serialize)]
pub struct ChatUsage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

impl ChatUsage {
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Chat Completions chunk envelope, also used for the single non-streaming body.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub system_fingerprint: String,
    pub choices: Vec<ChunkChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<ChatUsage>,
}
