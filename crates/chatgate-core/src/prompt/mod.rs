//! Prompt composition.
//!
//! [`PromptComposer`] linearises an ordered message list into the single
//! prompt string a model expects, according to its [`TemplateFamily`]. All
//! families except `Delegated` are implemented as pure folds in
//! [`families`]; `Delegated` calls the injected [`ChatTemplateRenderer`].

pub mod families;

use std::sync::Arc;

use crate::domain::{Message, ModelSpec, Role, TemplateFamily};
use crate::error::{GatewayError, GatewayResult};
use crate::ports::ChatTemplateRenderer;

/// A prompt ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedPrompt {
    /// Prompt text sent as the model input.
    pub text: String,
    /// System preamble sent separately by the conversational backend.
    pub preamble: Option<String>,
}

impl ComposedPrompt {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            preamble: None,
        }
    }

    /// Everything the upstream will see, for budgeting.
    #[must_use]
    pub fn budget_text(&self) -> String {
        match &self.preamble {
            Some(preamble) => format!("{preamble}{}", self.text),
            None => self.text.clone(),
        }
    }
}

/// Selects and applies the template family of a model.
#[derive(Clone, Default)]
pub struct PromptComposer {
    renderer: Option<Arc<dyn ChatTemplateRenderer>>,
}

impl std::fmt::Debug for PromptComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptComposer")
            .field("renderer", &self.renderer.is_some())
            .finish()
    }
}

impl PromptComposer {
    /// Create a composer; `renderer` serves the `Delegated` family.
    pub fn new(renderer: Option<Arc<dyn ChatTemplateRenderer>>) -> Self {
        Self { renderer }
    }

    /// Merge the whole conversation into one prompt string.
    pub fn merge(&self, messages: &[Message], spec: &ModelSpec) -> GatewayResult<String> {
        if messages.is_empty() {
            return Err(GatewayError::validation("messages must not be empty"));
        }
        let prompt = match spec.family {
            TemplateFamily::TurnBracket => families::turn_bracket(messages),
            TemplateFamily::RoleTag => families::role_tag(messages),
            TemplateFamily::TurnTag(style) => families::turn_tag(messages, style),
            TemplateFamily::Fallback => families::fallback(messages),
            TemplateFamily::Delegated => {
                let renderer = self.renderer.as_ref().ok_or_else(|| GatewayError::Template {
                    model: spec.upstream_id.clone(),
                    message: "no chat template renderer configured".to_string(),
                })?;
                renderer.render(&spec.upstream_id, messages)?
            }
        };
        Ok(prompt)
    }

    /// Split the conversation for the conversational backend.
    ///
    /// System messages become the preamble (newline-joined); the rest are
    /// merged with the fallback family and end with an open `assistant: `
    /// turn.
    pub fn decompose(&self, messages: &[Message]) -> GatewayResult<ComposedPrompt> {
        if messages.is_empty() {
            return Err(GatewayError::validation("messages must not be empty"));
        }
        let (system, rest): (Vec<&Message>, Vec<&Message>) = messages
            .iter()
            .partition(|message| message.role == Role::System);

        let preamble = system
            .iter()
            .map(|message| message.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let turns: Vec<Message> = rest
            .into_iter()
            .cloned()
            .chain(std::iter::once(Message::assistant("")))
            .collect();

        Ok(ComposedPrompt {
            text: families::fallback(&turns),
            preamble: Some(preamble),
        })
    }
}
