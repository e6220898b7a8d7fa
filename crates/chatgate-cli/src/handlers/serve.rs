//! Serve command handler.

use std::sync::Arc;

use anyhow::{Context, Result};
use chatgate_hf::ChatOrchestrator;
use chatgate_proxy::ServerConfig;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Run the HTTP server until Ctrl+C.
pub async fn execute(orchestrator: ChatOrchestrator, config: ServerConfig) -> Result<()> {
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
        }
        on_signal.cancel();
    });

    chatgate_proxy::serve(listener, Arc::new(orchestrator), &config, cancel).await
}
