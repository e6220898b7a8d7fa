//! Domain types.
//!
//! These types describe conversations, generation settings, canonical stream
//! chunks and the model registry, independent of any transport.

pub mod chunk;
pub mod message;
pub mod models;
pub mod params;

pub use chunk::{CanonicalChunk, ContentType, FinishReason};
pub use message::{Message, RawMessage, Role, RoleClass};
pub use models::{
    BackendKind, DEFAULT_MODEL, ModelSpec, TemplateFamily, TurnTagStyle, builtin_models,
};
pub use params::GenerationParams;
