//! Responses-protocol pipeline: handshake, per-fragment deltas, finalize.

use crate::error::Chat2PoeError;
use crate::models::poe::{ProtocolMessage, QueryOptions};
use crate::models::responses::{
    event_type, ContentPartEvent, Item, OutputItemEvent, Part, ResponseEnvelope, ResponseStatus,
    TextDeltaEvent, TextDoneEvent,
};
use crate::poe::PoeProvider;
use crate::service::common::{create_usage, format_response_event, ResponseContext};
use futures_util::{Stream, StreamExt};
use std::sync::Arc;
use uuid::Uuid;

/// The fixed opening sequence preceding any content delta.
fn handshake_frames(ctx: &ResponseContext, item_id: &str) -> Vec<String> {
    let created = ResponseEnvelope {
        kind: event_type::CREATED.to_string(),
        response: ctx.payload(ResponseStatus::InProgress),
    };
    let in_progress = ResponseEnvelope {
        kind: event_type::IN_PROGRESS.to_string(),
        response: ctx.payload(ResponseStatus::InProgress),
    };
    let item_added = OutputItemEvent {
        kind: event_type::OUTPUT_ITEM_ADDED.to_string(),
        output_index: 0,
        item: Item::message(item_id, ResponseStatus::InProgress, Vec::new()),
    };
    let part_added = ContentPartEvent {
        kind: event_type::CONTENT_PART_ADDED.to_string(),
        item_id: item_id.to_string(),
        output_index: 0,
        content_index: 0,
        part: Part::output_text(""),
    };
    vec![
        format_response_event(event_type::CREATED, &created),
        format_response_event(event_type::IN_PROGRESS, &in_progress),
        format_response_event(event_type::OUTPUT_ITEM_ADDED, &item_added),
        format_response_event(event_type::CONTENT_PART_ADDED, &part_added),
    ]
}

/// The fixed closing sequence after fragment exhaustion.
fn finalize_frames(
    ctx: &ResponseContext,
    item_id: &str,
    accumulated_text: &str,
    messages: &[ProtocolMessage],
) -> Vec<String> {
    let text_done = TextDoneEvent {
        kind: event_type::OUTPUT_TEXT_DONE.to_string(),
        item_id: item_id.to_string(),
        output_index: 0,
        content_index: 0,
        text: accumulated_text.to_string(),
    };
    let part_done = ContentPartEvent {
        kind: event_type::CONTENT_PART_DONE.to_string(),
        item_id: item_id.to_string(),
        output_index: 0,
        content_index: 0,
        part: Part::output_text(accumulated_text),
    };
    let item = Item::message(
        item_id,
        ResponseStatus::Completed,
        vec![Part::output_text(accumulated_text)],
    );
    let item_done = OutputItemEvent {
        kind: event_type::OUTPUT_ITEM_DONE.to_string(),
        output_index: 0,
        item: item.clone(),
    };
    let mut completed_payload = ctx.payload(ResponseStatus::Completed);
    completed_payload.output = vec![item];
    completed_payload.usage = Some(create_usage(messages, accumulated_text));
    let completed = ResponseEnvelope {
        kind: event_type::COMPLETED.to_string(),
        response: completed_payload,
    };
    vec![
        format_response_event(event_type::OUTPUT_TEXT_DONE, &text_done),
        format_response_event(event_type::CONTENT_PART_DONE, &part_done),
        format_response_event(event_type::OUTPUT_ITEM_DONE, &item_done),
        format_response_event(event_type::COMPLETED, &completed),
    ]
}

/// Drive one streaming Responses call.
///
/// Emits the handshake, one `output_text.delta` per fragment in arrival
/// order, and the finalize sequence. A provider failure at any point yields
/// exactly one `response.completed` frame whose payload is `status=failed`
/// (usage computed over whatever text accumulated), then re-raises the
/// error so the transport terminates abnormally. Dropping the returned
/// stream cancels the upstream call.
pub fn stream_response(
    provider: Arc<dyn PoeProvider>,
    model: String,
    api_key: String,
    messages: Vec<ProtocolMessage>,
    instructions: String,
    options: QueryOptions,
) -> impl Stream<Item = Result<String, Chat2PoeError>> {
    async_stream::stream! {
        let ctx = ResponseContext::new(model, instructions, options.temperature);
        let item_id = format!("msg-{}", Uuid::new_v4().simple());
        let mut accumulated = String::new();

        for frame in handshake_frames(&ctx, &item_id) {
            yield Ok(frame);
        }

        let mut failure: Option<Chat2PoeError> = None;
        match provider
            .stream_reply(&messages, &ctx.model, &api_key, &options)
            .await
        {
            Ok(mut fragments) => {
                while let Some(next) = fragments.next().await {
                    match next {
                        Ok(fragment) => {
                            accumulated.push_str(&fragment);
                            let delta = TextDeltaEvent {
                                kind: event_type::OUTPUT_TEXT_DELTA.to_string(),
                                item_id: item_id.clone(),
                                output_index: 0,
                                content_index: 0,
                                delta: fragment,
                            };
                            yield Ok(format_response_event(event_type::OUTPUT_TEXT_DELTA, &delta));
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
            None => {
                for frame in finalize_frames(&ctx, &item_id, &accumulated, &messages) {
                    yield Ok(frame);
                }
            }
            Some(e) => {
                tracing::error!("unexpected error during response streaming: {e}");
                let usage = create_usage(&messages, &accumulated);
                let envelope = ResponseEnvelope {
                    kind: event_type::COMPLETED.to_string(),
                    response: ctx.failed_payload(&e.to_string(), None, Some(usage)),
                };
                yield Ok(format_response_event(event_type::COMPLETED, &envelope));
                yield Err(e);
            }
        }
    }
}

/// Drive one non-streaming Responses call: buffer all fragments, then
/// return a single terminal payload. Provider failures fold into a
/// `status=failed` payload instead of raising; non-streaming callers never
/// see a transport error, only a structured failed body.
pub async fn respond(
    provider: &dyn PoeProvider,
    model: String,
    api_key: &str,
    messages: Vec<ProtocolMessage>,
    instructions: String,
    options: QueryOptions,
) -> crate::models::responses::ResponsePayload {
    let ctx = ResponseContext::new(model, instructions, options.temperature);
    let item_id = format!("msg-{}", Uuid::new_v4().simple());
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
        tracing::error!("unexpected error during non-streaming response: {e}");
        let usage = create_usage(&messages, &accumulated);
        return ctx.failed_payload(&e.to_string(), Some("server_error"), Some(usage));
    }

    let item = Item::message(
        item_id.as_str(),
        ResponseStatus::Completed,
        vec![Part::output_text(accumulated.as_str())],
    );
    let mut payload = ctx.payload(ResponseStatus::Completed);
    payload.output = vec![item];
    payload.usage = Some(create_usage(&messages, &accumulated));
    payload
}
