//! OpenAI API request body.
//!
//! Response bodies live in `chatgate_core::contracts`; this module only maps
//! the incoming request onto a [`ChatRequest`].

use chatgate_core::{DEFAULT_MODEL, GatewayResult, Message, RawMessage};
use chatgate_hf::ChatRequest;
use serde::Deserialize;

const fn default_temperature() -> Option<f32> {
    Some(0.5)
}

const fn default_top_p() -> Option<f32> {
    Some(0.95)
}

const fn default_max_tokens() -> Option<i64> {
    Some(-1)
}

const fn default_stream() -> bool {
    true
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

/// Request to `/v1/chat/completions`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionsRequest {
    /// Model id; unknown ids are served by the default model.
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub messages: Vec<RawMessage>,
    /// `null` is accepted and treated as the lowest temperature.
    #[serde(default = "default_temperature")]
    pub temperature: Option<f32>,
    #[serde(default = "default_top_p")]
    pub top_p: Option<f32>,
    /// -1 (or any non-positive value) means "as much as the context allows".
    #[serde(default = "default_max_tokens")]
    pub max_tokens: Option<i64>,
    #[serde(default)]
    pub use_cache: bool,
    #[serde(default = "default_stream")]
    pub stream: bool,
}

impl ChatCompletionsRequest {
    /// Validate the messages and build the orchestrator request.
    pub fn into_chat_request(self, credential: Option<String>) -> GatewayResult<ChatRequest> {
        let messages = Message::parse_all(self.messages)?;
        Ok(ChatRequest {
            model: Some(self.model),
            messages,
            temperature: self.temperature,
            top_p: self.top_p,
            max_tokens: self.max_tokens,
            use_cache: self.use_cache,
            stream: self.stream,
            credential,
        })
    }
}
