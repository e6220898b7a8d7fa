//! Model registry entries.
//!
//! A [`ModelSpec`] ties a public model id to the upstream model, the backend
//! that serves it, its prompt template family, its context window and the stop
//! sequence the upstream emits at end of generation.

use serde::{Deserialize, Serialize};

/// Model used when the caller names none, or names one we do not know.
pub const DEFAULT_MODEL: &str = "nous-mixtral-8x7b";

/// Which upstream protocol serves a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Stateless text-generation-inference endpoint.
    Inference,
    /// Stateful conversational endpoint with a session handshake.
    Conversation,
}

/// Label set for the turn-tag family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnTagStyle {
    Zephyr,
    Gemma,
}

impl TurnTagStyle {
    /// Label that opens an instruction turn.
    #[must_use]
    pub const fn inst_label(self) -> &'static str {
        match self {
            Self::Zephyr => "zephyr-orpo-141b Correct User:\n",
            Self::Gemma => "<start_of_turn>user\n",
        }
    }

    /// Label that opens an answer turn; also the final generation opener.
    #[must_use]
    pub const fn answer_label(self) -> &'static str {
        match self {
            Self::Zephyr => "zephyr-orpo-141b Correct Assistant:\n",
            Self::Gemma => "<start_of_turn>model\n",
        }
    }

    /// Marker that closes every turn.
    #[must_use]
    pub const fn end_marker(self) -> &'static str {
        match self {
            Self::Zephyr => "<|end_of_turn|>",
            Self::Gemma => "<end_of_turn>",
        }
    }
}

/// How a conversation is linearised into a single prompt string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateFamily {
    /// `[INST] ... [/INST]` bracketed instruction turns.
    TurnBracket,
    /// `<|im_start|>role ... <|im_end|>` per message.
    RoleTag,
    /// Labelled turns closed by an end marker.
    TurnTag(TurnTagStyle),
    /// Rendered by an external chat template keyed by the upstream model id.
    Delegated,
    /// Plain `role: content` pairs.
    Fallback,
}

/// A registered model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Public id callers use.
    pub id: String,
    /// Id the upstream knows the model by.
    pub upstream_id: String,
    pub backend: BackendKind,
    pub family: TemplateFamily,
    /// Context window in tokens.
    pub context_window: usize,
    /// End-of-generation marker, when the upstream emits one in-band.
    pub stop_sequence: Option<String>,
}

impl ModelSpec {
    pub fn new(
        id: impl Into<String>,
        upstream_id: impl Into<String>,
        backend: BackendKind,
        family: TemplateFamily,
        context_window: usize,
    ) -> Self {
        Self {
            id: id.into(),
            upstream_id: upstream_id.into(),
            backend,
            family,
            context_window,
            stop_sequence: None,
        }
    }

    #[must_use]
    pub fn with_stop_sequence(mut self, stop: impl Into<String>) -> Self {
        self.stop_sequence = Some(stop.into());
        self
    }
}

/// The built-in model table.
#[must_use]
pub fn builtin_models() -> Vec<ModelSpec> {
    use BackendKind::{Conversation, Inference};
    use TemplateFamily::{Delegated, Fallback, RoleTag, TurnBracket, TurnTag};

    vec![
        ModelSpec::new(
            "mixtral-8x7b",
            "mistralai/Mixtral-8x7B-Instruct-v0.1",
            Inference,
            TurnBracket,
            32768,
        )
        .with_stop_sequence("</s>"),
        ModelSpec::new(
            DEFAULT_MODEL,
            "NousResearch/Nous-Hermes-2-Mixtral-8x7B-DPO",
            Inference,
            RoleTag,
            32768,
        )
        .with_stop_sequence("<|im_end|>"),
        ModelSpec::new(
            "mistral-7b",
            "mistralai/Mistral-7B-Instruct-v0.2",
            Inference,
            TurnBracket,
            32768,
        )
        .with_stop_sequence("</s>"),
        ModelSpec::new(
            "openchat-3.5",
            "openchat/openchat-3.5-0106",
            Inference,
            Fallback,
            8192,
        )
        .with_stop_sequence("<|end_of_turn|>"),
        ModelSpec::new(
            "gemma-7b",
            "google/gemma-1.1-7b-it",
            Inference,
            TurnTag(TurnTagStyle::Gemma),
            8192,
        )
        .with_stop_sequence("<eos>"),
        ModelSpec::new(
            "command-r-plus",
            "CohereForAI/c4ai-command-r-plus",
            Conversation,
            Delegated,
            32768,
        )
        .with_stop_sequence("<|END_OF_TURN_TOKEN|>"),
        ModelSpec::new(
            "llama3-70b",
            "meta-llama/Meta-Llama-3-70B-Instruct",
            Conversation,
            Fallback,
            8192,
        ),
        ModelSpec::new(
            "zephyr-141b",
            "HuggingFaceH4/zephyr-orpo-141b-A35b-v0.1",
            Conversation,
            TurnTag(TurnTagStyle::Zephyr),
            2048,
        ),
    ]
}
