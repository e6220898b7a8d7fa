//! Internal transport error types.
//!
//! These errors are internal to `chatgate-hf` and are mapped to
//! [`GatewayError`] at the boundary: plain calls become `Upstream`, handshake
//! calls become `Session` for the step that failed.

use chatgate_core::{GatewayError, HandshakeStep};
use thiserror::Error;

/// Result type alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors raised by an [`HttpTransport`](crate::HttpTransport).
#[derive(Debug, Error)]
pub enum TransportError {
    /// The upstream answered with a non-success status.
    #[error("upstream returned status {status} for {url}")]
    Status {
        /// HTTP status code
        status: u16,
        /// The URL that was requested
        url: String,
        /// Response body, truncated
        body: String,
    },

    /// The request never produced a response (DNS, TLS, timeout...).
    #[error("network error: {0}")]
    Network(String),

    /// The request could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A response body was not the JSON we expected.
    #[error("invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),
}

impl TransportError {
    /// HTTP status, when the upstream answered at all.
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Map into the error of a handshake step.
    pub fn into_session(self, step: HandshakeStep) -> GatewayError {
        GatewayError::session(step, self.to_string())
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<TransportError> for GatewayError {
    fn from(err: TransportError) -> Self {
        let status = err.status();
        let message = match &err {
            TransportError::Status { body, .. } if !body.is_empty() => {
                format!("{err}: {body}")
            }
            _ => err.to_string(),
        };
        Self::upstream(status, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_maps_to_upstream_with_status() {
        let err = TransportError::Status {
            status: 503,
            url: "https://api.example/models/x".to_string(),
            body: "Model is loading".to_string(),
        };
        let gateway: GatewayError = err.into();
        match gateway {
            GatewayError::Upstream { status, message } => {
                assert_eq!(status, Some(503));
                assert!(message.contains("Model is loading"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_network_error_has_no_status() {
        let gateway: GatewayError = TransportError::Network("connection refused".into()).into();
        assert!(matches!(gateway, GatewayError::Upstream { status: None, .. }));
    }

    #[test]
    fn test_into_session_keeps_step() {
        let err = TransportError::Status {
            status: 401,
            url: "u".into(),
            body: String::new(),
        }
        .into_session(HandshakeStep::Conversation);
        assert!(matches!(
            err,
            GatewayError::Session { step: HandshakeStep::Conversation, .. }
        ));
    }
}
