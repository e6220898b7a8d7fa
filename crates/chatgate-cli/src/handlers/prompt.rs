//! Prompt command handler.
//!
//! Shows exactly what a backend would send upstream for a conversation: the
//! merged inputs of inference models (rendered through the pinned chat
//! template for models registered with the delegated family), or the
//! preamble and flattened turns of conversational models. Nothing is sent.

use std::io::Write;

use anyhow::Result;
use chatgate_hf::ChatOrchestrator;

use super::conversation;

/// Execute the prompt command.
pub fn execute(
    orchestrator: &ChatOrchestrator,
    model: Option<&str>,
    system: Option<String>,
    question: String,
    out: &mut impl Write,
) -> Result<()> {
    let backend = orchestrator.registry().resolve(model);
    let prompt = backend.compose_prompt(&conversation(system, question))?;

    writeln!(out, "# model: {}", backend.model().id)?;
    if let Some(preamble) = prompt.preamble.as_deref() {
        writeln!(out, "# preamble")?;
        writeln!(out, "{preamble}")?;
        writeln!(out, "# inputs")?;
    }
    writeln!(out, "{}", prompt.text)?;
    Ok(())
}
