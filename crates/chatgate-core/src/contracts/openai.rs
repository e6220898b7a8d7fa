//! OpenAI-compatible response bodies.
//!
//! `finish_reason` is always serialized, as `null` on incremental chunks, and
//! `delta.content` is always a string. Clients written against the OpenAI
//! streaming format rely on both.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::domain::{CanonicalChunk, FinishReason, ModelSpec};

const SYSTEM_FINGERPRINT: &str = "fp_chatgate";

/// Streaming chunk of `/v1/chat/completions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub system_fingerprint: String,
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: ChunkDelta,
    pub finish_reason: Option<FinishReason>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkDelta {
    pub content: String,
}

/// Non-streaming response of `/v1/chat/completions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletion {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub system_fingerprint: String,
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionChoice {
    pub index: u32,
    pub message: AssistantMessage,
    pub finish_reason: FinishReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub role: String,
    pub content: String,
}

impl ChatCompletion {
    /// The aggregated answer text.
    #[must_use]
    pub fn content(&self) -> &str {
        self.choices
            .first()
            .map_or("", |choice| choice.message.content.as_str())
    }
}

/// Shared identity of every chunk in one response.
///
/// All chunks of a stream carry the same id and timestamp.
#[derive(Debug, Clone)]
pub struct ChunkEnvelope {
    id: String,
    created: i64,
    model: String,
}

impl ChunkEnvelope {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            id: format!("chatcmpl-{}", uuid::Uuid::new_v4().simple()),
            created: Utc::now().timestamp(),
            model: model.into(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wrap one canonical chunk.
    #[must_use]
    pub fn wrap(&self, chunk: &CanonicalChunk) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk".to_string(),
            created: self.created,
            model: self.model.clone(),
            system_fingerprint: SYSTEM_FINGERPRINT.to_string(),
            choices: vec![ChunkChoice {
                index: chunk.index,
                delta: ChunkDelta {
                    content: chunk.delta_content.clone(),
                },
                finish_reason: chunk.finish_reason,
            }],
        }
    }

    /// Build the aggregated response.
    #[must_use]
    pub fn complete(&self, content: impl Into<String>) -> ChatCompletion {
        ChatCompletion {
            id: self.id.clone(),
            object: "chat.completion".to_string(),
            created: self.created,
            model: self.model.clone(),
            system_fingerprint: SYSTEM_FINGERPRINT.to_string(),
            choices: vec![CompletionChoice {
                index: 0,
                message: AssistantMessage {
                    role: "assistant".to_string(),
                    content: content.into(),
                },
                finish_reason: FinishReason::Stop,
            }],
        }
    }
}

/// Response of `/v1/models`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<ModelEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub owned_by: String,
}

impl ModelList {
    /// List the given registry entries, owner taken from the upstream org.
    pub fn from_specs<'a>(specs: impl IntoIterator<Item = &'a ModelSpec>) -> Self {
        Self {
            object: "list".to_string(),
            data: specs
                .into_iter()
                .map(|spec| ModelEntry {
                    id: spec.id.clone(),
                    object: "model".to_string(),
                    created: 0,
                    owned_by: spec
                        .upstream_id
                        .split_once('/')
                        .map_or("chatgate", |(org, _)| org)
                        .to_string(),
                })
                .collect(),
        }
    }
}

/// Error body matching the OpenAI format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    pub r#type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>, error_type: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                message: message.into(),
                r#type: error_type.into(),
                code: None,
            },
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.error.code = Some(code.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::builtin_models;
    use serde_json::json;

    #[test]
    fn test_incremental_chunk_serializes_null_finish_reason() {
        let envelope = ChunkEnvelope::new("mixtral-8x7b");
        let value = serde_json::to_value(envelope.wrap(&CanonicalChunk::completion("Hi"))).unwrap();
        assert_eq!(value["object"], "chat.completion.chunk");
        assert_eq!(value["model"], "mixtral-8x7b");
        assert_eq!(
            value["choices"],
            json!([{"index": 0, "delta": {"content": "Hi"}, "finish_reason": null}])
        );
    }

    #[test]
    fn test_terminal_chunk_serializes_stop_with_empty_content() {
        let envelope = ChunkEnvelope::new("m");
        let value = serde_json::to_value(envelope.wrap(&CanonicalChunk::finished())).unwrap();
        assert_eq!(value["choices"][0]["finish_reason"], "stop");
        assert_eq!(value["choices"][0]["delta"]["content"], "");
    }

    #[test]
    fn test_chunks_share_envelope_identity() {
        let envelope = ChunkEnvelope::new("m");
        let a = envelope.wrap(&CanonicalChunk::completion("a"));
        let b = envelope.wrap(&CanonicalChunk::finished());
        assert_eq!(a.id, b.id);
        assert!(a.id.starts_with("chatcmpl-"));
    }

    #[test]
    fn test_complete_shape() {
        let completion = ChunkEnvelope::new("m").complete("Hello there");
        let value = serde_json::to_value(&completion).unwrap();
        assert_eq!(value["object"], "chat.completion");
        assert_eq!(value["choices"][0]["message"]["role"], "assistant");
        assert_eq!(value["choices"][0]["finish_reason"], "stop");
        assert_eq!(completion.content(), "Hello there");
    }

    #[test]
    fn test_model_list_owner_from_upstream_org() {
        let specs = builtin_models();
        let list = ModelList::from_specs(&specs);
        assert_eq!(list.object, "list");
        assert_eq!(list.data.len(), specs.len());
        let gemma = list.data.iter().find(|m| m.id == "gemma-7b").unwrap();
        assert_eq!(gemma.owned_by, "google");
    }

    #[test]
    fn test_error_response_code_skipped_when_absent() {
        let value =
            serde_json::to_value(ErrorResponse::new("bad", "invalid_request_error")).unwrap();
        assert!(value["error"].get("code").is_none());
        let value = serde_json::to_value(
            ErrorResponse::new("bad", "invalid_request_error").with_code("x"),
        )
        .unwrap();
        assert_eq!(value["error"]["code"], "x");
    }
}
