//! CLI bootstrap - the composition root.
//!
//! Builds the gateway configuration from parsed arguments and installs the
//! tracing subscriber. Handlers receive fully built values and never read
//! the environment themselves.

use std::time::Duration;

use chatgate_hf::{GatewayConfig, mask_secret};
use tracing_subscriber::EnvFilter;

use crate::parser::GatewayArgs;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `info`, or `debug` with `--verbose`.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Gateway configuration for these arguments.
pub fn gateway_config(args: &GatewayArgs) -> GatewayConfig {
    let mut config = GatewayConfig::new()
        .with_optional_token(args.hf_token.clone().filter(|t| !t.is_empty()))
        .with_proxy_url(args.proxy_url.clone());

    if let Some(url) = &args.inference_url {
        config = config.with_inference_base_url(url);
    }
    if let Some(url) = &args.chat_url {
        config = config.with_chat_base_url(url);
    }
    if let Some(dir) = &args.template_dir {
        config = config.with_template_dir(dir);
    }
    if let Some(secs) = args.handshake_timeout {
        config = config.with_handshake_timeout(Duration::from_secs(secs));
    }

    if let Some(token) = config.token() {
        tracing::debug!(token = %mask_secret(token), "Using default upstream token");
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_token_is_ignored() {
        let args = GatewayArgs {
            hf_token: Some(String::new()),
            ..GatewayArgs::default()
        };
        assert!(gateway_config(&args).token().is_none());
    }

    #[test]
    fn test_token_is_carried() {
        let args = GatewayArgs {
            hf_token: Some("hf_abcdef".into()),
            ..GatewayArgs::default()
        };
        assert_eq!(gateway_config(&args).token(), Some("hf_abcdef"));
    }

    #[test]
    fn test_defaults_keep_builtin_models() {
        let config = gateway_config(&GatewayArgs::default());
        assert!(config.models().iter().any(|m| m.id == chatgate_core::DEFAULT_MODEL));
    }
}
