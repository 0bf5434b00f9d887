use crate::error::Chat2PoeError;
use serde_json::Value;

/// One content fragment of an inbound message.
///
/// Chat-style tags (`text`, `image_url`) and Responses-style tags
/// (`input_text`, `input_image`) both normalize into this sum type during
/// parsing, so the translator can match exhaustively instead of inspecting
/// JSON shapes at runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text {
        text: String,
    },
    Image {
        /// Either a literal URL or an inline `data:image/...;base64,...` reference.
        image_url: String,
        /// Rendering detail hint; defaults to "auto" for Chat-style parts.
        detail: String,
    },
}

/// One inbound message after content normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientMessage {
    pub role: String,
    pub content: Vec<ContentPart>,
}

/// Parsed inbound request, accepted on both API surfaces.
#[derive(Debug, Clone)]
pub struct ClientRequest {
    pub model: String,
    pub input: Vec<ClientMessage>,
    pub stream: bool,
    pub service_tier: Option<String>,
}

impl ClientRequest {
    /// Parse a request body leniently, accepting every input shape clients
    /// send in practice:
    ///
    /// - a Chat-style `messages` array (preferred when present),
    /// - a Responses-style `input` array,
    /// - a bare string `input` (one user message),
    /// - per-message `content` as a bare string (one text part).
    pub fn from_json(v: &Value) -> Result<Self, Chat2PoeError> {
        let model = v
            .get("model")
            .and_then(|m| m.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| Chat2PoeError::InvalidRequest("missing 'model'".into()))?;

        // Prefer Chat-style "messages"; fall back to Responses-style "input".
        let source = v.get("messages").or_else(|| v.get("input"));

        let input = match source {
            Some(Value::String(s)) => vec![ClientMessage {
                role: "user".to_string(),
                content: vec![ContentPart::Text { text: s.clone() }],
            }],
            Some(Value::Array(items)) => {
                let mut messages = Vec::with_capacity(items.len());
                for item in items {
                    messages.push(parse_message(item)?);
                }
                messages
            }
            Some(other) => {
                return Err(Chat2PoeError::InvalidRequest(format!(
                    "'input' must be a string or an array, got {other}"
                )))
            }
            None => Vec::new(),
        };

        let stream = v.get("stream").and_then(|s| s.as_bool()).unwrap_or(false);
        let service_tier = v
            .get("service_tier")
            .and_then(|s| s.as_str())
            .map(|s| s.to_string());

        Ok(ClientRequest {
            model,
            input,
            stream,
            service_tier,
        })
    }
}

fn parse_message(v: &Value) -> Result<ClientMessage, Chat2PoeError> {
    let role = v
        .get("role")
        .and_then(|r| r.as_str())
        .unwrap_or("user")
        .to_string();

    let content = match v.get("content") {
        Some(Value::String(s)) => vec![ContentPart::Text { text: s.clone() }],
        Some(Value::Array(parts)) => {
            let mut out = Vec::with_capacity(parts.len());
            for part in parts {
                out.push(parse_content_part(part)?);
            }
            out
        }
        _ => {
            return Err(Chat2PoeError::InvalidRequest(
                "message 'content' must be a string or an array of parts".into(),
            ))
        }
    };

    Ok(ClientMessage { role, content })
}

fn parse_content_part(v: &Value) -> Result<ContentPart, Chat2PoeError> {
    let kind = v.get("type").and_then(|t| t.as_str()).unwrap_or("");
    match kind {
        "text" | "input_text" => {
            let text = v
                .get("text")
                .and_then(|t| t.as_str())
                .ok_or_else(|| Chat2PoeError::InvalidRequest("text part missing 'text'".into()))?;
            Ok(ContentPart::Text {
                text: text.to_string(),
            })
        }
        "image_url" | "input_image" => {
            // Chat-style parts nest the URL as { "image_url": { "url": ... } };
            // Responses-style parts carry it directly as a string.
            let image_url = match v.get("image_url") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Object(obj)) => obj
                    .get("url")
                    .and_then(|u| u.as_str())
                    .map(|s| s.to_string())
                    .ok_or_else(|| {
                        Chat2PoeError::InvalidRequest("image part missing 'url'".into())
                    })?,
                _ => {
                    return Err(Chat2PoeError::InvalidRequest(
                        "image part missing 'image_url'".into(),
                    ))
                }
            };
            let detail = v
                .get("detail")
                .and_then(|d| d.as_str())
                .unwrap_or("auto")
                .to_string();
            Ok(ContentPart::Image { image_url, detail })
        }
        other => Err(Chat2PoeError::InvalidRequest(format!(
            "unsupported content part type '{other}'"
        ))),
    }
}
