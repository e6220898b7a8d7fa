//! HTTP error mapping.
//!
//! Every failure leaves the server as an OpenAI-style error body with a
//! stable `code`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chatgate_core::{ErrorResponse, GatewayError};
use thiserror::Error;

/// Errors returned by the HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The presented key is neither the configured key nor an upstream token.
    #[error("Invalid API Key")]
    InvalidApiKey,

    /// The request body could not be parsed.
    #[error("Invalid request body: {0}")]
    BadRequest(String),

    /// The request failed inside the gateway.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidApiKey => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Gateway(err) => match err {
                GatewayError::Validation(_) | GatewayError::ContextLimit { .. } => {
                    StatusCode::BAD_REQUEST
                }
                GatewayError::Session { .. } => StatusCode::BAD_GATEWAY,
                GatewayError::Upstream { status, .. } => status
                    .filter(|s| (400..600).contains(s))
                    .and_then(|s| StatusCode::from_u16(s).ok())
                    .unwrap_or(StatusCode::BAD_GATEWAY),
                GatewayError::Template { .. } | GatewayError::Config(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    const fn code(&self) -> &'static str {
        match self {
            Self::InvalidApiKey => "invalid_api_key",
            Self::BadRequest(_) => "invalid_request",
            Self::Gateway(err) => err.code(),
        }
    }

    const fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidApiKey => "authentication_error",
            Self::BadRequest(_) => "invalid_request_error",
            Self::Gateway(
                GatewayError::Validation(_) | GatewayError::ContextLimit { .. },
            ) => "invalid_request_error",
            Self::Gateway(_) => "api_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %self, "Request rejected");
        }
        let body = ErrorResponse::new(self.to_string(), self.error_type()).with_code(self.code());
        (status, Json(body)).into_response()
    }
}
