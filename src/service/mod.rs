//! Streaming and aggregation pipelines, one submodule per protocol variant.
//!
//! Both variants share the same shape: drive the provider's fragment stream
//! to exhaustion or first error, forwarding fragments in arrival order while
//! accumulating the full text. The streaming pipelines emit SSE frames and
//! re-raise provider errors after one final error-shaped frame; the
//! non-streaming aggregators absorb errors into a structured payload and
//! never fail the HTTP call.

mod common;

pub mod chat;
pub mod responses;

pub use common::{format_chat_frame, format_response_event, sse_done_frame};
