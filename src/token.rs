//! Token accounting over the cl100k_base BPE.
//!
//! Usage numbers are informational: Poe does not report token usage, so the
//! adapter computes an OpenAI-comparable count locally at finalize time.

use tiktoken_rs::cl100k_base_singleton;

/// Count BPE tokens in `text`.
pub fn count_tokens(text: &str) -> usize {
    let bpe = cl100k_base_singleton();
    bpe.encode_with_special_tokens(text).len()
}

/// Warm the lazily loaded tokenizer outside the request path.
pub fn preload_tokenizer() {
    let _ = cl100k_base_singleton();
}
