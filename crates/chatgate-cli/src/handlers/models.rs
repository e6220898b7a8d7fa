//! Models command handler.

use std::io::Write;

use anyhow::Result;
use chatgate_core::{BackendKind, DEFAULT_MODEL, ModelSpec};

/// Print the registered models as a table.
pub fn execute(models: &[ModelSpec], out: &mut impl Write) -> Result<()> {
    writeln!(out, "{:<18} {:<12} {:>8}  UPSTREAM", "ID", "BACKEND", "CONTEXT")?;
    for spec in models {
        let backend = match spec.backend {
            BackendKind::Inference => "inference",
            BackendKind::Conversation => "chat",
        };
        let marker = if spec.id == DEFAULT_MODEL { " (default)" } else { "" };
        writeln!(
            out,
            "{:<18} {:<12} {:>8}  {}{marker}",
            spec.id, backend, spec.context_window, spec.upstream_id
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatgate_core::builtin_models;

    #[test]
    fn test_lists_every_model_and_marks_default() {
        let models = builtin_models();
        let mut out = Vec::new();
        execute(&models, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(text.lines().count(), models.len() + 1);
        let default_line = text.lines().find(|l| l.starts_with(DEFAULT_MODEL)).unwrap();
        assert!(default_line.ends_with("(default)"));
        assert!(text.contains("zephyr-141b"));
    }
}
