//! Error taxonomy shared by every chatgate crate.
//!
//! Adapters map their internal errors into [`GatewayError`] at the boundary,
//! the same way transport failures become `Upstream` and handshake failures
//! become `Session`. [`ParseError`] is the one recoverable kind: it describes a
//! single malformed stream line and never aborts a request.

use std::fmt;

use thiserror::Error;

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// The handshake step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStep {
    /// Settings negotiation (session cookie).
    Settings,
    /// Conversation creation.
    Conversation,
    /// Last-message-id discovery.
    LastMessageId,
}

impl HandshakeStep {
    /// Stable lowercase name used in logs and error bodies.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Settings => "settings",
            Self::Conversation => "conversation",
            Self::LastMessageId => "last_message_id",
        }
    }
}

impl fmt::Display for HandshakeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that abort an in-flight chat request.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Malformed caller input (missing role or content, empty message list).
    #[error("Invalid request: {0}")]
    Validation(String),

    /// The prompt does not fit the model's context window.
    #[error("Prompt exceeds the context window of '{model}': {tokens} > {limit}")]
    ContextLimit {
        /// Model identifier
        model: String,
        /// Estimated prompt tokens plus the reserved margin
        tokens: usize,
        /// Context window of the model
        limit: usize,
    },

    /// A step of the conversational handshake failed.
    #[error("Session handshake failed at {step}: {message}")]
    Session {
        /// Which step failed
        step: HandshakeStep,
        /// Description of the failure
        message: String,
    },

    /// The upstream returned a non-success status or the connection failed.
    #[error("Upstream request failed: {message}")]
    Upstream {
        /// HTTP status, when a response was received at all
        status: Option<u16>,
        /// Description of the failure
        message: String,
    },

    /// A delegated chat template could not be rendered.
    #[error("Chat template unavailable for '{model}': {message}")]
    Template {
        /// Upstream model id the template is keyed by
        model: String,
        /// Description of the failure
        message: String,
    },

    /// Invalid gateway configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a handshake error for the given step.
    pub fn session(step: HandshakeStep, message: impl Into<String>) -> Self {
        Self::Session {
            step,
            message: message.into(),
        }
    }

    /// Create an upstream error.
    pub fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            message: message.into(),
        }
    }

    /// Stable machine-readable code for transport layers.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "invalid_request",
            Self::ContextLimit { .. } => "context_length_exceeded",
            Self::Session { .. } => "session_error",
            Self::Upstream { .. } => "upstream_error",
            Self::Template { .. } => "template_error",
            Self::Config(_) => "config_error",
        }
    }
}

/// A single upstream stream line that could not be decoded.
///
/// Normalizers log and skip these; the stream continues.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The payload is not valid JSON or does not match the event schema.
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload parsed but lacks the expected field.
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    /// The upstream reported an error inside the stream.
    #[error("upstream error event: {0}")]
    UpstreamEvent(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_limit_message() {
        let error = GatewayError::ContextLimit {
            model: "gemma-7b".to_string(),
            tokens: 9000,
            limit: 8192,
        };
        let msg = error.to_string();
        assert!(msg.contains("gemma-7b"));
        assert!(msg.contains("9000 > 8192"));
        assert_eq!(error.code(), "context_length_exceeded");
    }

    #[test]
    fn test_session_error_names_step() {
        let error = GatewayError::session(HandshakeStep::LastMessageId, "no id found");
        assert_eq!(
            error.to_string(),
            "Session handshake failed at last_message_id: no id found"
        );
        assert_eq!(error.code(), "session_error");
    }

    #[test]
    fn test_codes_are_distinct() {
        let codes = [
            GatewayError::validation("x").code(),
            GatewayError::session(HandshakeStep::Settings, "x").code(),
            GatewayError::upstream(Some(502), "x").code(),
            GatewayError::Config("x".into()).code(),
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_parse_error_from_json() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let parse: ParseError = err.into();
        assert!(parse.to_string().starts_with("invalid JSON payload"));
    }
}
