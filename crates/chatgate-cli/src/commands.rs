//! Subcommands of the `chatgate` binary.

use std::net::SocketAddr;

use clap::Subcommand;

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the OpenAI-compatible HTTP server
    Serve {
        /// Address to listen on
        #[arg(
            long,
            env = "CHATGATE_BIND",
            default_value = chatgate_proxy::config::DEFAULT_BIND_ADDR
        )]
        bind: SocketAddr,
        /// Access key callers must present (unset accepts everyone)
        #[arg(long, env = "HF_LLM_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
        /// Seconds between SSE keep-alive comments
        #[arg(long, default_value_t = 15)]
        keep_alive: u64,
    },

    /// Send one question and print the answer
    Ask {
        /// The question
        question: String,
        /// Model id (see `chatgate models`)
        #[arg(short, long)]
        model: Option<String>,
        /// System prompt placed before the question
        #[arg(short, long)]
        system: Option<String>,
        /// Upper bound on generated tokens
        #[arg(long)]
        max_tokens: Option<i64>,
        /// Wait for the whole answer instead of streaming it
        #[arg(long)]
        no_stream: bool,
    },

    /// List the registered models
    Models,

    /// Print the prompt a model would receive, without sending it
    Prompt {
        /// The user message
        question: String,
        /// Model id (see `chatgate models`)
        #[arg(short, long)]
        model: Option<String>,
        /// System prompt placed before the question
        #[arg(short, long)]
        system: Option<String>,
    },
}
