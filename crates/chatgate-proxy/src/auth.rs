//! Caller authentication.
//!
//! A presented bearer token is either the gateway's own access key or a
//! HuggingFace token (`hf_...`) that is forwarded upstream as the caller's
//! credential.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;

use crate::error::ApiError;

const UPSTREAM_TOKEN_PREFIX: &str = "hf_";

/// The bearer token of a request, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then_some(token.trim())
        .filter(|token| !token.is_empty())
}

/// Check a presented token against the configured access key.
///
/// Returns the upstream credential to use, if the caller supplied one:
/// - no configured key: everyone is accepted, nothing is forwarded
/// - `hf_` token: accepted and forwarded
/// - the configured key: accepted, nothing is forwarded
pub fn authorize(
    configured: Option<&str>,
    presented: Option<&str>,
) -> Result<Option<String>, ApiError> {
    let Some(configured) = configured else {
        return Ok(None);
    };
    match presented {
        Some(token) if token.starts_with(UPSTREAM_TOKEN_PREFIX) => Ok(Some(token.to_string())),
        Some(token) if token == configured => Ok(None),
        _ => Err(ApiError::InvalidApiKey),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token(&headers("Bearer sk-1")), Some("sk-1"));
        assert_eq!(bearer_token(&headers("bearer  hf_x ")), Some("hf_x"));
        assert_eq!(bearer_token(&headers("Basic abc")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_no_configured_key_is_anonymous() {
        assert!(matches!(authorize(None, None), Ok(None)));
        assert!(matches!(authorize(None, Some("hf_abc")), Ok(None)));
        assert!(matches!(authorize(None, Some("whatever")), Ok(None)));
    }

    #[test]
    fn test_upstream_token_is_forwarded() {
        assert_eq!(
            authorize(Some("sk-local"), Some("hf_abc")).unwrap(),
            Some("hf_abc".to_string())
        );
    }

    #[test]
    fn test_configured_key_accepted_without_credential() {
        assert!(matches!(authorize(Some("sk-local"), Some("sk-local")), Ok(None)));
    }

    #[test]
    fn test_wrong_or_missing_key_rejected() {
        assert!(matches!(
            authorize(Some("sk-local"), Some("sk-other")),
            Err(ApiError::InvalidApiKey)
        ));
        assert!(matches!(authorize(Some("sk-local"), None), Err(ApiError::InvalidApiKey)));
    }
}
