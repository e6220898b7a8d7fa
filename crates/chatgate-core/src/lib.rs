//! # chatgate-core
//!
//! Transport-free building blocks of the chat gateway:
//!
//! - [`domain`] - messages, canonical chunks, generation parameters and the
//!   model registry
//! - [`prompt`] - template families that linearise a conversation into one
//!   prompt string
//! - [`budget`] - token estimation and context-window enforcement
//! - [`ports`] - the [`ChatBackend`] capability implemented by upstream adapters
//! - [`contracts`] - the OpenAI-compatible wire format exposed to callers
//!
//! Nothing in this crate performs I/O.

#![deny(unsafe_code)]

pub mod budget;
pub mod contracts;
pub mod domain;
pub mod error;
pub mod ports;
pub mod prompt;

// Re-export commonly used types for convenience
pub use budget::{HeuristicEstimator, TOKEN_RESERVE, TokenBudget, TokenBudgeter, TokenEstimator};
pub use contracts::{
    ChatCompletion, ChatCompletionChunk, ChunkEnvelope, ErrorDetail, ErrorResponse, ModelEntry,
    ModelList,
};
pub use domain::{
    BackendKind, CanonicalChunk, ContentType, DEFAULT_MODEL, FinishReason, GenerationParams,
    Message, ModelSpec, RawMessage, Role, RoleClass, TemplateFamily, TurnTagStyle, builtin_models,
};
pub use error::{GatewayError, GatewayResult, HandshakeStep, ParseError};
pub use ports::{ByteStream, ChatBackend, ChatTemplateRenderer, ChunkStream};
pub use prompt::{ComposedPrompt, PromptComposer};
