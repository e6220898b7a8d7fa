//! Pinned chat templates for the delegated template family.
//!
//! Some models only document their prompt format as a Jinja chat template.
//! [`JinjaTemplateRenderer`] renders a pinned copy of that template, either
//! registered in memory or read from `{template_dir}/{org}--{model}.jinja`,
//! with `add_generation_prompt = true` and the Python string methods
//! HuggingFace templates rely on.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chatgate_core::{ChatTemplateRenderer, GatewayError, GatewayResult, Message};
use minijinja::{Environment, Error, ErrorKind, context};
use serde::Serialize;

use crate::config::GatewayConfig;

/// A template source plus the special tokens it may reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinnedTemplate {
    source: String,
    bos_token: String,
    eos_token: String,
}

impl PinnedTemplate {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_bos_token(mut self, token: impl Into<String>) -> Self {
        self.bos_token = token.into();
        self
    }

    #[must_use]
    pub fn with_eos_token(mut self, token: impl Into<String>) -> Self {
        self.eos_token = token.into();
        self
    }
}

#[derive(Serialize)]
struct TemplateMessage<'a> {
    role: &'a str,
    content: &'a str,
}

fn raise_exception(message: String) -> Result<String, Error> {
    Err(Error::new(ErrorKind::InvalidOperation, message))
}

/// File name a template is pinned under: `org/model` → `org--model.jinja`.
pub fn template_file_name(model_id: &str) -> String {
    format!("{}.jinja", model_id.replace('/', "--"))
}

/// Renders pinned Jinja chat templates keyed by upstream model id.
pub struct JinjaTemplateRenderer {
    env: Environment<'static>,
    templates: HashMap<String, PinnedTemplate>,
    template_dir: Option<PathBuf>,
}

impl std::fmt::Debug for JinjaTemplateRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JinjaTemplateRenderer")
            .field("templates", &self.templates.keys().collect::<Vec<_>>())
            .field("template_dir", &self.template_dir)
            .finish_non_exhaustive()
    }
}

impl Default for JinjaTemplateRenderer {
    fn default() -> Self {
        // Same whitespace handling as transformers' apply_chat_template
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_unknown_method_callback(minijinja_contrib::pycompat::unknown_method_callback);
        env.add_function("raise_exception", raise_exception);
        Self {
            env,
            templates: HashMap::new(),
            template_dir: None,
        }
    }
}

impl JinjaTemplateRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        let renderer = Self::new();
        match &config.template_dir {
            Some(dir) => renderer.with_template_dir(dir),
            None => renderer,
        }
    }

    /// Look up `{dir}/{org}--{model}.jinja` for models without an in-memory
    /// template.
    #[must_use]
    pub fn with_template_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.template_dir = Some(dir.into());
        self
    }

    /// Pin a template in memory for `model_id`.
    #[must_use]
    pub fn with_template(mut self, model_id: impl Into<String>, template: PinnedTemplate) -> Self {
        self.templates.insert(model_id.into(), template);
        self
    }

    fn load(&self, model_id: &str) -> GatewayResult<PinnedTemplate> {
        if let Some(template) = self.templates.get(model_id) {
            return Ok(template.clone());
        }
        let template_error = |message: String| GatewayError::Template {
            model: model_id.to_string(),
            message,
        };
        let dir = self
            .template_dir
            .as_deref()
            .ok_or_else(|| {
                template_error("no template pinned and no template directory".to_string())
            })?;
        let path = dir.join(template_file_name(model_id));
        let source = read_template(&path).map_err(template_error)?;
        tracing::debug!(model = model_id, path = %path.display(), "Loaded pinned chat template");
        Ok(PinnedTemplate::new(source))
    }
}

fn read_template(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path).map_err(|e| format!("cannot read {}: {e}", path.display()))
}

impl ChatTemplateRenderer for JinjaTemplateRenderer {
    fn render(&self, model_id: &str, messages: &[Message]) -> GatewayResult<String> {
        let template = self.load(model_id)?;
        let messages: Vec<TemplateMessage<'_>> = messages
            .iter()
            .map(|m| TemplateMessage {
                role: m.role.as_str(),
                content: &m.content,
            })
            .collect();

        self.env
            .render_str(
                &template.source,
                context! {
                    messages => messages,
                    add_generation_prompt => true,
                    bos_token => template.bos_token,
                    eos_token => template.eos_token,
                },
            )
            .map_err(|e| {
                tracing::warn!(model = model_id, error = %e, "Chat template failed to render");
                GatewayError::Template {
                    model: model_id.to_string(),
                    message: e.to_string(),
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const TURN_TEMPLATE: &str = "{{ bos_token }}{% for message in messages %}\
<|{{ message['role'] }}|>{{ message['content'].strip() }}<|end|>\n\
{% endfor %}{% if add_generation_prompt %}<|assistant|>{% endif %}";

    const STRICT_TEMPLATE: &str = "{% for message in messages %}\
{% if message['role'] == 'system' %}{{ raise_exception('System role not supported') }}{% endif %}\
{{ message['content'] }}{% endfor %}";

    #[test]
    fn test_template_file_name() {
        assert_eq!(
            template_file_name("CohereForAI/c4ai-command-r-plus"),
            "CohereForAI--c4ai-command-r-plus.jinja"
        );
    }

    #[test]
    fn test_renders_in_memory_template() {
        let renderer = JinjaTemplateRenderer::new().with_template(
            "org/model",
            PinnedTemplate::new(TURN_TEMPLATE).with_bos_token("<BOS>"),
        );
        let prompt = renderer
            .render(
                "org/model",
                &[Message::system("  Be brief. "), Message::user("Hi")],
            )
            .unwrap();
        assert_eq!(
            prompt,
            "<BOS><|system|>Be brief.<|end|>\n<|user|>Hi<|end|>\n<|assistant|>"
        );
    }

    #[test]
    fn test_loads_template_from_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("org--model.jinja"), TURN_TEMPLATE).unwrap();

        let config = GatewayConfig::new().with_template_dir(dir.path());
        let renderer = JinjaTemplateRenderer::from_config(&config);
        let prompt = renderer.render("org/model", &[Message::user("Hi")]).unwrap();
        assert_eq!(prompt, "<|user|>Hi<|end|>\n<|assistant|>");
    }

    #[test]
    fn test_missing_template_is_template_error() {
        let dir = TempDir::new().unwrap();
        let renderer = JinjaTemplateRenderer::new().with_template_dir(dir.path());
        let err = renderer.render("org/absent", &[Message::user("Hi")]).unwrap_err();
        assert!(matches!(err, GatewayError::Template { ref model, .. } if model == "org/absent"));

        let err = JinjaTemplateRenderer::new()
            .render("org/absent", &[Message::user("Hi")])
            .unwrap_err();
        assert_eq!(err.code(), "template_error");
    }

    #[test]
    fn test_raise_exception_surfaces_as_template_error() {
        let renderer = JinjaTemplateRenderer::new()
            .with_template("org/strict", PinnedTemplate::new(STRICT_TEMPLATE));
        let err = renderer
            .render("org/strict", &[Message::system("x")])
            .unwrap_err();
        match err {
            GatewayError::Template { message, .. } => {
                assert!(message.contains("System role not supported"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
