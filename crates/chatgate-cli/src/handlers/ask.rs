//! Ask command handler.
//!
//! Sends one question through the orchestrator and writes the answer to the
//! terminal, token by token when streaming.

use std::io::Write;

use anyhow::Result;
use chatgate_hf::{ChatOrchestrator, ChatOutcome, ChatRequest};
use futures_util::StreamExt;
use tracing::debug;

use super::conversation;

/// Arguments of the ask command.
#[derive(Debug, Clone, Default)]
pub struct AskArgs {
    pub question: String,
    pub model: Option<String>,
    pub system: Option<String>,
    pub max_tokens: Option<i64>,
    pub stream: bool,
}

/// Execute the ask command.
pub async fn execute(
    orchestrator: &ChatOrchestrator,
    args: AskArgs,
    out: &mut impl Write,
) -> Result<()> {
    let mut request =
        ChatRequest::new(conversation(args.system, args.question)).with_stream(args.stream);
    if let Some(model) = args.model {
        request = request.with_model(model);
    }
    if let Some(max_tokens) = args.max_tokens {
        request = request.with_max_tokens(max_tokens);
    }

    match orchestrator.chat(request).await? {
        ChatOutcome::Stream { model, mut chunks } => {
            debug!(model = %model, "Streaming answer");
            while let Some(chunk) = chunks.next().await {
                write!(out, "{}", chunk.delta_content)?;
                out.flush()?;
            }
            writeln!(out)?;
        }
        ChatOutcome::Complete(completion) => {
            debug!(model = %completion.model, id = %completion.id, "Answer complete");
            writeln!(out, "{}", completion.content())?;
        }
    }
    Ok(())
}
