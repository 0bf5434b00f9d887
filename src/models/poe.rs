use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// Roles accepted by the Poe bot query protocol.
///
/// Client-side "assistant" maps to `Bot`. "system" text never reaches the
/// wire as a message; the translator extracts it into the instructions
/// string instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoeRole {
    System,
    User,
    Bot,
}

/// Uploaded file handle returned by the Poe file-upload endpoint.
///
/// Treated as immutable once issued; the attachment cache stores it as a
/// JSON round-trip, which is why it derives both serde traits.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub content_type: String,
    pub name: String,
}

/// Provider-facing message after role/content translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolMessage {
    pub role: PoeRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl ProtocolMessage {
    pub fn new(role: PoeRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            attachments: Vec::new(),
        }
    }
}

/// Per-call options forwarded to the bot query.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub temperature: Option<f64>,
}
