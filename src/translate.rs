use crate::cache::AttachmentCache;
use crate::error::Chat2PoeError;
use crate::image::resolve_image;
use crate::models::client::{ClientMessage, ContentPart};
use crate::models::poe::{Attachment, PoeRole, ProtocolMessage};
use crate::poe::PoeProvider;
use std::time::Duration;

/// Instructions sent when the input carries no system text.
pub const DEFAULT_INSTRUCTIONS: &str = "You are a helpful assistant.";

fn convert_role(role: &str) -> PoeRole {
    match role {
        "system" => PoeRole::System,
        "assistant" => PoeRole::Bot,
        "user" => PoeRole::User,
        "bot" => PoeRole::Bot,
        other => {
            tracing::warn!("unknown role '{other}', defaulting to 'user'");
            PoeRole::User
        }
    }
}

/// Bind an attachment to the most recent user turn, synthesizing an
/// empty-text user turn when none exists yet. Poe binds files to a message,
/// not to a content fragment, so an image part lands on whichever user turn
/// has been appended by the time it is processed.
fn attach_to_last_user_message(messages: &mut Vec<ProtocolMessage>, attachment: Attachment) {
    for msg in messages.iter_mut().rev() {
        if msg.role == PoeRole::User {
            msg.attachments.push(attachment);
            return;
        }
    }

    let mut synthesized = ProtocolMessage::new(PoeRole::User, "");
    synthesized.attachments.push(attachment);
    messages.push(synthesized);
}

/// Translate client messages into the Poe protocol sequence plus the
/// extracted instruction string.
///
/// Text parts append one protocol message each; system text overwrites the
/// instructions (last one wins) and never becomes a wire message. Image
/// parts resolve through the attachment cache and retro-attach to the last
/// user turn.
pub async fn to_protocol_messages(
    source_messages: &[ClientMessage],
    api_key: &str,
    provider: &dyn PoeProvider,
    cache: &dyn AttachmentCache,
    cache_ttl: Duration,
) -> Result<(Vec<ProtocolMessage>, String), Chat2PoeError> {
    let mut protocol_messages: Vec<ProtocolMessage> = Vec::new();
    let mut instructions = DEFAULT_INSTRUCTIONS.to_string();

    for msg in source_messages {
        for part in &msg.content {
            match part {
                ContentPart::Image { image_url, .. } => {
                    let attachment =
                        resolve_image(image_url, api_key, provider, cache, cache_ttl).await?;
                    attach_to_last_user_message(&mut protocol_messages, attachment);
                }
                ContentPart::Text { text } => {
                    if msg.role == "system" {
                        instructions = text.clone();
                        continue;
                    }
                    protocol_messages
                        .push(ProtocolMessage::new(convert_role(&msg.role), text.clone()));
                }
            }
        }
    }

    if protocol_messages.is_empty() {
        return Err(Chat2PoeError::EmptyMessageList);
    }

    Ok((protocol_messages, instructions))
}
