//! Main CLI parser and top-level argument handling.
//!
//! Upstream settings are global so every subcommand sees the same gateway
//! configuration; each one falls back to an environment variable.

use std::path::PathBuf;

use clap::{Args, Parser};

use crate::commands::Commands;

/// Command-line interface of the chat gateway.
#[derive(Parser)]
#[command(name = "chatgate")]
#[command(about = "OpenAI-compatible gateway to HuggingFace chat models")]
#[command(version)]
pub struct Cli {
    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub gateway: GatewayArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Settings of the upstream adapters.
#[derive(Args, Debug, Clone, Default)]
pub struct GatewayArgs {
    /// Default HuggingFace token for the inference API
    #[arg(long, env = "HF_TOKEN", global = true, hide_env_values = true)]
    pub hf_token: Option<String>,

    /// Route upstream calls through this HTTP proxy
    #[arg(long, env = "CHATGATE_PROXY_URL", global = true)]
    pub proxy_url: Option<String>,

    /// Directory holding pinned `{org}--{model}.jinja` chat templates
    #[arg(long, env = "CHATGATE_TEMPLATE_DIR", global = true)]
    pub template_dir: Option<PathBuf>,

    /// Base URL of the text-generation-inference API
    #[arg(long, env = "CHATGATE_INFERENCE_URL", global = true)]
    pub inference_url: Option<String>,

    /// Base URL of the conversational chat API
    #[arg(long, env = "CHATGATE_CHAT_URL", global = true)]
    pub chat_url: Option<String>,

    /// Timeout of each session handshake call, in seconds
    #[arg(long, env = "CHATGATE_HANDSHAKE_TIMEOUT", global = true)]
    pub handshake_timeout: Option<u64>,
}
