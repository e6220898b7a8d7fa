//! Request orchestration.
//!
//! [`ChatOrchestrator::chat`] is the single entry point: resolve the backend,
//! compose the prompt, enforce the context budget, dispatch, normalize, and
//! either hand back the chunk stream or aggregate it into one completion.
//! The budget check always runs before any upstream call.

use std::sync::Arc;

use chatgate_core::{
    ChatBackend, ChatCompletion, ChunkEnvelope, ChunkStream, DEFAULT_MODEL, GatewayError,
    GatewayResult, GenerationParams, Message, ModelSpec, PromptComposer, TokenBudgeter,
};

use crate::backend::build_backend;
use crate::config::GatewayConfig;
use crate::http::{HttpTransport, ReqwestTransport};
use crate::normalize::aggregate;
use crate::template::JinjaTemplateRenderer;

// ============================================================================
// Request / outcome
// ============================================================================

/// One chat request, after the caller's messages have been validated.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Registered model id; `None` or unknown ids use the default model.
    pub model: Option<String>,
    pub messages: Vec<Message>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    /// Zero or negative means "as much as the context allows".
    pub max_tokens: Option<i64>,
    pub use_cache: bool,
    pub stream: bool,
    /// Upstream credential overriding the configured token.
    pub credential: Option<String>,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            model: None,
            messages,
            temperature: None,
            top_p: None,
            max_tokens: None,
            use_cache: false,
            stream: true,
            credential: None,
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub const fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: i64) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    #[must_use]
    pub fn with_credential(mut self, credential: Option<String>) -> Self {
        self.credential = credential;
        self
    }
}

/// What [`ChatOrchestrator::chat`] produced.
pub enum ChatOutcome {
    /// Canonical chunks for an incremental relay, ending with one terminal.
    Stream {
        /// Id of the model that served the request
        model: String,
        chunks: ChunkStream,
    },
    /// The aggregated answer.
    Complete(ChatCompletion),
}

impl std::fmt::Debug for ChatOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stream { model, .. } => f
                .debug_struct("Stream")
                .field("model", model)
                .finish_non_exhaustive(),
            Self::Complete(completion) => f.debug_tuple("Complete").field(completion).finish(),
        }
    }
}

// ============================================================================
// Backend registry
// ============================================================================

/// Maps model ids to their backends.
pub struct BackendRegistry {
    backends: Vec<Arc<dyn ChatBackend>>,
    default_index: usize,
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("models", &self.specs().map(|s| s.id.as_str()).collect::<Vec<_>>())
            .field("default", &self.default_backend().model().id)
            .finish()
    }
}

impl BackendRegistry {
    /// Build one backend per registered model.
    pub fn build(
        config: &GatewayConfig,
        transport: &Arc<dyn HttpTransport>,
        composer: &PromptComposer,
    ) -> GatewayResult<Self> {
        let backends = config
            .models()
            .iter()
            .map(|spec| build_backend(spec.clone(), config, transport.clone(), composer.clone()))
            .collect::<GatewayResult<Vec<_>>>()?;
        let default_index = backends
            .iter()
            .position(|b| b.model().id == DEFAULT_MODEL)
            .ok_or_else(|| {
                GatewayError::Config(format!("default model '{DEFAULT_MODEL}' is not registered"))
            })?;
        Ok(Self {
            backends,
            default_index,
        })
    }

    fn default_backend(&self) -> &Arc<dyn ChatBackend> {
        &self.backends[self.default_index]
    }

    /// Backend for `model`; unknown or missing ids fall back to the default.
    pub fn resolve(&self, model: Option<&str>) -> Arc<dyn ChatBackend> {
        let found = model.and_then(|id| self.backends.iter().find(|b| b.model().id == id));
        match (model, found) {
            (_, Some(backend)) => backend.clone(),
            (Some(id), None) => {
                tracing::warn!(
                    requested = id,
                    fallback = DEFAULT_MODEL,
                    "Unknown model, using default"
                );
                self.default_backend().clone()
            }
            (None, None) => self.default_backend().clone(),
        }
    }

    /// Registered models, in registration order.
    pub fn specs(&self) -> impl Iterator<Item = &ModelSpec> {
        self.backends.iter().map(|b| b.model())
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Drives chat requests end to end.
#[derive(Debug)]
pub struct ChatOrchestrator {
    registry: BackendRegistry,
    budgeter: TokenBudgeter,
}

impl ChatOrchestrator {
    /// Build an orchestrator talking to the real upstreams.
    pub fn new(config: GatewayConfig) -> GatewayResult<Self> {
        let transport =
            ReqwestTransport::new(&config).map_err(|e| GatewayError::Config(e.to_string()))?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Build an orchestrator over an injected transport.
    pub fn with_transport(
        config: GatewayConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> GatewayResult<Self> {
        let renderer = JinjaTemplateRenderer::from_config(&config);
        let composer = PromptComposer::new(Some(Arc::new(renderer)));
        let registry = BackendRegistry::build(&config, &transport, &composer)?;
        Ok(Self {
            registry,
            budgeter: TokenBudgeter::default(),
        })
    }

    #[must_use]
    pub fn with_budgeter(mut self, budgeter: TokenBudgeter) -> Self {
        self.budgeter = budgeter;
        self
    }

    pub const fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Registered models, in registration order.
    pub fn models(&self) -> Vec<ModelSpec> {
        self.registry.specs().cloned().collect()
    }

    /// Run one chat request.
    pub async fn chat(&self, request: ChatRequest) -> GatewayResult<ChatOutcome> {
        if request.messages.is_empty() {
            return Err(GatewayError::validation("messages must not be empty"));
        }

        let backend = self.registry.resolve(request.model.as_deref());
        let spec = backend.model();
        let prompt = backend.compose_prompt(&request.messages)?;
        let budget = self.budgeter.check(spec, &prompt.budget_text())?;

        let mut params = GenerationParams::from_request(
            request.temperature,
            request.top_p,
            request.max_tokens,
            request.use_cache,
        );
        params.max_new_tokens = Some(budget.max_new_tokens(params.max_new_tokens));

        tracing::info!(
            model = %spec.id,
            messages = request.messages.len(),
            prompt_tokens = budget.tokens,
            max_new_tokens = ?params.max_new_tokens,
            stream = request.stream,
            "Chat request"
        );

        let body = backend
            .dispatch(&prompt, &params, request.credential.as_deref())
            .await?;
        let chunks = backend.normalize_response(body);

        if request.stream {
            return Ok(ChatOutcome::Stream {
                model: spec.id.clone(),
                chunks,
            });
        }

        let content = aggregate(chunks, backend.stop_sequence()).await;
        tracing::debug!(model = %spec.id, chars = content.len(), "Aggregated completion");
        Ok(ChatOutcome::Complete(ChunkEnvelope::new(&spec.id).complete(content)))
    }
}
