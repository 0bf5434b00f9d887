#![forbid(unsafe_code)]
#![doc = r#"
Chat2Poe

Accept OpenAI Responses and Chat Completions requests and proxy them to Poe
bots, translating payload shapes in both directions and re-emitting replies
synchronously or as a server-sent-event stream.

Crate highlights
- Library: pure translation via `to_protocol_messages`, streaming pipelines
  in `service::{responses, chat}` driven by any `PoeProvider`.
- HTTP server (in `server`): `/v1/responses` and `/v1/chat/completions`.
- Attachment cache: inline images are uploaded once per distinct source and
  reused within a TTL (`cache`).

Modules
- `models`: Data structures for client input, Poe protocol, and both output wire formats.
- `translate`: Mapping logic from client messages to Poe protocol messages.
- `image`: Inline image decoding and cache-assisted upload.
- `service`: Streaming/aggregation pipelines for both protocol variants.
- `poe`: Provider seam and the reqwest-backed Poe client.
- `server`: Axum router/handlers (optional binary uses this).
- `util`: Shared helpers (tracing, env, HTTP client, CORS).

Note: Keep the event sequences aligned with the OpenAI wire formats; clients
parse them strictly.
"#]

pub mod cache;
pub mod error;
pub mod image;
pub mod models;
pub mod poe;
pub mod server;
pub mod service;
pub mod token;
pub mod translate;
pub mod util;

// Re-export the primary seams for ergonomic library use.
pub use crate::error::Chat2PoeError;
pub use crate::poe::{FragmentStream, PoeApiClient, PoeProvider};
pub use crate::translate::to_protocol_messages;

// Re-export model namespaces for convenience (downstream users can do `use chat2poe::chat`).
pub use crate::models::{chat, client, poe as protocol, responses};
