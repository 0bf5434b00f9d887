//! Chat-Completions-protocol pipeline: role-tagged first delta, content
//! deltas, terminal stop chunk and `[DONE]` sentinel.

use crate::error::Chat2PoeError;
use crate::models::chat::{
    ChatCompletionChunk, ChatUsage, ChunkChoice, ChunkMessage, Delta,
};
use crate::models::poe::{ProtocolMessage, QueryOptions};
use crate::poe::PoeProvider;
use crate::service::common::{create_usage, format_chat_frame, sse_done_frame, ChatContext};
use futures_util::{Stream, StreamExt};
use std::sync::Arc;

fn delta_choice(delta: Delta) -> ChunkChoice {
    ChunkChoice {
        index: 0,
        delta: Some(delta),
        message: None,
        finish_reason: None,
    }
}

fn stop_choice(message: Option<ChunkMessage>) -> ChunkChoice {
    ChunkChoice {
        index: 0,
        delta: None,
        message,
        finish_reason: Some("stop".to_string()),
    }
}

/// Drive one streaming Chat Completions call.
///
/// The first chunk's delta carries `role: assistant`; later chunks carry
/// content only. A provider failure yields one chunk with a refusal message
/// and `finish_reason=stop`, then re-raises the error to terminate the
/// transport. On clean exhaustion the stream closes with a no-delta stop
/// chunk followed by the literal `[DONE]` sentinel.
pub fn stream_chat_completion(
    provider: Arc<dyn PoeProvider>,
    model: String,
    api_key: String,
    messages: Vec<ProtocolMessage>,
    options: QueryOptions,
) -> impl Stream<Item = Result<String, Chat2PoeError>> {
    async_stream::stream! {
        let ctx = ChatContext::new(model);
        let mut is_first_chunk = true;

        let mut failure: Option<Chat2PoeError> = None;
        match provider
            .stream_reply(&messages, &ctx.model, &api_key, &options)
            .await
        {
            Ok(mut fragments) => {
                while let Some(next) = fragments.next().await {
                    match next {
                        Ok(fragment) => {
                            let delta = if is_first_chunk {
                                is_first_chunk = false;
                                Delta::first(fragment)
                            } else {
                                Delta::content(fragment)
                            };
                            yield Ok(format_chat_frame(&ctx.chunk(delta_choice(delta))));
                        }
                        Err(e) => {
                            failure = Some(e);
                            break;
                        }
                    }
                }
            }
            Err(e) => failure = Some(e),
        }

        match failure {
            Some(e) => {
                tracing::error!("unexpected error during chat completion streaming: {e}");
                let refusal = stop_choice(Some(ChunkMessage::refusal(e.to_string())));
                yield Ok(format_chat_frame(&ctx.chunk(refusal)));
                yield Err(e);
            }
            None => {
                yield Ok(format_chat_frame(&ctx.chunk(stop_choice(None))));
                yield Ok(sse_done_frame());
            }
        }
    }
}

/// Drive one non-streaming Chat Completions call: buffer all fragments and
/// return a single body. Provider failures fold into a refusal message with
/// HTTP success, never an error to the caller.
pub async fn complete(
    provider: &dyn PoeProvider,
    model: String,
    api_key: &str,
    messages: Vec<ProtocolMessage>,
    options: QueryOptions,
) -> ChatCompletionChunk {
    let ctx = ChatContext::new(model);
    let mut accumulated = String::new();

    let failure = match provider
        .stream_reply(&messages, &ctx.model, api_key, &options)
        .await
    {
        Ok(mut fragments) => {
            let mut failure = None;
            while let Some(next) = fragments.next().await {
                match next {
                    Ok(fragment) => accumulated.push_str(&fragment),
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                }
            }
            failure
        }
        Err(e) => Some(e),
    };

    if let Some(e) = failure {
        tracing::error!("unexpected error during non-streaming chat completion: {e}");
        let mut refusal = ChunkMessage::refusal(e.to_string());
        refusal.role = Some("assistant".to_string());
        return ctx.chunk(stop_choice(Some(refusal)));
    }

    let usage = create_usage(&messages, &accumulated);
    let mut chunk = ctx.chunk(stop_choice(Some(ChunkMessage::assistant(accumulated))));
    chunk.usage = Some(ChatUsage::new(usage.input_tokens, usage.output_tokens));
    chunk
}
