//! Public configuration for the upstream adapters.
//!
//! A [`GatewayConfig`] is built once and injected into the orchestrator; no
//! adapter reads the environment on its own.

use std::path::PathBuf;
use std::time::Duration;

use chatgate_core::{ModelSpec, builtin_models};

/// Browser user agent presented to the conversational backend.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Configuration for the gateway adapters.
///
/// # Example
///
/// ```
/// use chatgate_hf::GatewayConfig;
/// use std::time::Duration;
///
/// let config = GatewayConfig::new()
///     .with_handshake_timeout(Duration::from_secs(5))
///     .with_token("hf_example");
/// ```
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the text-generation-inference API
    pub(crate) inference_base_url: String,
    /// Base URL of the conversational chat API
    pub(crate) chat_base_url: String,
    /// Default upstream credential, overridden per request
    pub(crate) token: Option<String>,
    /// Timeout of each handshake call
    pub(crate) handshake_timeout: Duration,
    /// Outbound proxy for every upstream call
    pub(crate) proxy_url: Option<String>,
    /// Iteration bound of the proof-of-work search
    pub(crate) proof_max_iterations: u32,
    /// Wall-clock bound of the proof-of-work search
    pub(crate) proof_deadline: Option<Duration>,
    /// Directory holding pinned chat templates
    pub(crate) template_dir: Option<PathBuf>,
    /// User agent for the conversational backend
    pub(crate) user_agent: String,
    /// Registered models
    pub(crate) models: Vec<ModelSpec>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            inference_base_url: "https://api-inference.huggingface.co/models".to_string(),
            chat_base_url: "https://huggingface.co/chat".to_string(),
            token: None,
            handshake_timeout: Duration::from_secs(10),
            proxy_url: None,
            proof_max_iterations: 100_000,
            proof_deadline: Some(Duration::from_secs(5)),
            template_dir: None,
            user_agent: BROWSER_USER_AGENT.to_string(),
            models: builtin_models(),
        }
    }
}

impl GatewayConfig {
    /// Create a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the inference API base URL.
    ///
    /// Defaults to `https://api-inference.huggingface.co/models`.
    #[must_use]
    pub fn with_inference_base_url(mut self, url: impl Into<String>) -> Self {
        self.inference_base_url = url.into();
        self
    }

    /// Set the conversational API base URL.
    ///
    /// Defaults to `https://huggingface.co/chat`.
    #[must_use]
    pub fn with_chat_base_url(mut self, url: impl Into<String>) -> Self {
        self.chat_base_url = url.into();
        self
    }

    /// Set the default upstream credential.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set an optional default upstream credential.
    #[must_use]
    pub fn with_optional_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Set the per-call handshake timeout.
    ///
    /// Defaults to 10 seconds.
    #[must_use]
    pub const fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Route upstream calls through an HTTP proxy.
    #[must_use]
    pub fn with_proxy_url(mut self, url: Option<String>) -> Self {
        self.proxy_url = url;
        self
    }

    /// Set the proof-of-work iteration bound.
    ///
    /// Defaults to 100 000.
    #[must_use]
    pub const fn with_proof_max_iterations(mut self, iterations: u32) -> Self {
        self.proof_max_iterations = iterations;
        self
    }

    /// Set the proof-of-work wall-clock bound; `None` relies on the
    /// iteration bound alone.
    #[must_use]
    pub const fn with_proof_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.proof_deadline = deadline;
        self
    }

    /// Directory holding `{org}--{model}.jinja` chat templates.
    #[must_use]
    pub fn with_template_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.template_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Register an additional model, replacing any entry with the same id.
    #[must_use]
    pub fn with_model(mut self, spec: ModelSpec) -> Self {
        self.models.retain(|m| m.id != spec.id);
        self.models.push(spec);
        self
    }

    /// Registered models, in registration order.
    pub fn models(&self) -> &[ModelSpec] {
        &self.models
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

/// Mask a credential for logging: first three and last four characters kept.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 7 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}{}{tail}", "*".repeat(chars.len() - 7))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatgate_core::{BackendKind, DEFAULT_MODEL, TemplateFamily};

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::new();
        assert_eq!(
            config.inference_base_url,
            "https://api-inference.huggingface.co/models"
        );
        assert_eq!(config.chat_base_url, "https://huggingface.co/chat");
        assert_eq!(config.handshake_timeout, Duration::from_secs(10));
        assert_eq!(config.proof_max_iterations, 100_000);
        assert!(config.token.is_none());
        assert!(config.models().iter().any(|m| m.id == DEFAULT_MODEL));
    }

    #[test]
    fn test_builder_pattern() {
        let config = GatewayConfig::new()
            .with_inference_base_url("http://localhost:1/models")
            .with_chat_base_url("http://localhost:2/chat")
            .with_token("hf_secret")
            .with_handshake_timeout(Duration::from_secs(3))
            .with_proof_deadline(None)
            .with_template_dir("/tmp/templates");

        assert_eq!(config.inference_base_url, "http://localhost:1/models");
        assert_eq!(config.chat_base_url, "http://localhost:2/chat");
        assert_eq!(config.token(), Some("hf_secret"));
        assert_eq!(config.handshake_timeout, Duration::from_secs(3));
        assert!(config.proof_deadline.is_none());
        assert_eq!(config.template_dir, Some(PathBuf::from("/tmp/templates")));
    }

    #[test]
    fn test_with_model_replaces_same_id() {
        let before = GatewayConfig::new().models().len();
        let config = GatewayConfig::new().with_model(ModelSpec::new(
            "gemma-7b",
            "google/gemma-1.1-7b-it",
            BackendKind::Inference,
            TemplateFamily::Delegated,
            8192,
        ));
        assert_eq!(config.models().len(), before);
        let gemma = config.models().iter().find(|m| m.id == "gemma-7b").unwrap();
        assert_eq!(gemma.family, TemplateFamily::Delegated);
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("hf_abcdefgh1234"), "hf_********1234");
        assert_eq!(mask_secret("short"), "*****");
    }
}
