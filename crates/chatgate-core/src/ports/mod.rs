//! Port definitions (trait abstractions) for upstream adapters.
//!
//! Adapters in `chatgate-hf` implement these traits; the orchestrator only
//! ever sees `Arc<dyn ChatBackend>`.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;
use futures_util::stream::BoxStream;

use crate::domain::{CanonicalChunk, GenerationParams, Message, ModelSpec};
use crate::error::GatewayResult;
use crate::prompt::ComposedPrompt;

/// Raw upstream response body.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Normalized output of a backend; always ends with exactly one terminal chunk.
pub type ChunkStream = BoxStream<'static, CanonicalChunk>;

/// One upstream protocol family serving one model.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Registry entry this backend serves.
    fn model(&self) -> &ModelSpec;

    /// Linearise the conversation for this backend.
    fn compose_prompt(&self, messages: &[Message]) -> GatewayResult<ComposedPrompt>;

    /// Issue the upstream call(s) and return the raw response body.
    ///
    /// `credential` overrides the configured default token.
    async fn dispatch(
        &self,
        prompt: &ComposedPrompt,
        params: &GenerationParams,
        credential: Option<&str>,
    ) -> GatewayResult<ByteStream>;

    /// Decode the raw body into canonical chunks.
    fn normalize_response(&self, body: ByteStream) -> ChunkStream;

    /// End-of-generation marker stripped from aggregated output.
    fn stop_sequence(&self) -> Option<&str> {
        self.model().stop_sequence.as_deref()
    }
}

/// Renders a model's native chat template.
///
/// Implementations must reproduce the official template exactly; they are
/// keyed by the upstream model id.
#[cfg_attr(test, mockall::automock)]
pub trait ChatTemplateRenderer: Send + Sync {
    fn render(&self, model_id: &str, messages: &[Message]) -> GatewayResult<String>;
}
