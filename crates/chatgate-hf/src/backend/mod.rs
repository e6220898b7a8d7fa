//! [`ChatBackend`] implementations, one per upstream protocol family.
//!
//! - [`InferenceBackend`] - stateless text-generation-inference endpoint,
//!   one POST per request
//! - [`ConversationBackend`] - stateful chat API behind a session handshake
//!
//! [`build_backend`] picks the implementation from the model's
//! [`BackendKind`].

mod conversation;
mod inference;

use std::sync::Arc;

use chatgate_core::{BackendKind, ChatBackend, GatewayResult, ModelSpec, PromptComposer};

use crate::config::GatewayConfig;
use crate::http::HttpTransport;

pub use conversation::ConversationBackend;
pub use inference::{InferenceBackend, inference_url};

/// Build the backend serving `spec`.
pub fn build_backend(
    spec: ModelSpec,
    config: &GatewayConfig,
    transport: Arc<dyn HttpTransport>,
    composer: PromptComposer,
) -> GatewayResult<Arc<dyn ChatBackend>> {
    let backend: Arc<dyn ChatBackend> = match spec.backend {
        BackendKind::Inference => {
            Arc::new(InferenceBackend::new(spec, config, transport, composer)?)
        }
        BackendKind::Conversation => {
            Arc::new(ConversationBackend::new(spec, config, transport, composer))
        }
    };
    Ok(backend)
}
