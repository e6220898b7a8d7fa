//! Wire contracts exposed to callers.
//!
//! Keep these serde-only with no framework-specific types so any transport
//! adapter can reuse them.

pub mod openai;

pub use openai::{
    ChatCompletion, ChatCompletionChunk, ChunkEnvelope, ErrorDetail, ErrorResponse, ModelEntry,
    ModelList,
};
