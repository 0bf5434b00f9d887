//! Data models grouped by wire surface.
//!
//! - `client`: inbound request shapes (Responses- or Chat-style input).
//! - `poe`: provider-facing protocol messages and attachments.
//! - `responses`: Responses API event payloads emitted downstream.
//! - `chat`: Chat Completions chunk payloads emitted downstream.

pub mod chat;
pub mod client;
pub mod poe;
pub mod responses;
