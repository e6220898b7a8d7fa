//! Canonical streaming chunks.
//!
//! Every normalizer produces the same chunk type regardless of the upstream
//! framing. A well-formed chunk sequence ends with exactly one terminal chunk.

use serde::{Deserialize, Serialize};

/// Why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    Stop,
}

/// Kind of a canonical chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    /// Incremental content.
    Completions,
    /// Terminal marker.
    Finished,
}

/// One incremental unit of the unified streaming output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalChunk {
    pub index: u32,
    pub delta_content: String,
    pub finish_reason: Option<FinishReason>,
    pub content_type: ContentType,
}

impl CanonicalChunk {
    /// An incremental content chunk.
    pub fn completion(content: impl Into<String>) -> Self {
        Self {
            index: 0,
            delta_content: content.into(),
            finish_reason: None,
            content_type: ContentType::Completions,
        }
    }

    /// The terminal chunk: empty content, `finish_reason = stop`.
    #[must_use]
    pub const fn finished() -> Self {
        Self {
            index: 0,
            delta_content: String::new(),
            finish_reason: Some(FinishReason::Stop),
            content_type: ContentType::Finished,
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.content_type == ContentType::Finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finished_chunk_shape() {
        let chunk = CanonicalChunk::finished();
        assert!(chunk.is_terminal());
        assert!(chunk.delta_content.is_empty());
        assert_eq!(chunk.finish_reason, Some(FinishReason::Stop));
    }

    #[test]
    fn test_completion_chunk_is_not_terminal() {
        let chunk = CanonicalChunk::completion("Hi");
        assert!(!chunk.is_terminal());
        assert_eq!(chunk.finish_reason, None);
        assert_eq!(chunk.delta_content, "Hi");
    }

    #[test]
    fn test_finish_reason_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&FinishReason::Stop).unwrap(), "\"stop\"");
    }
}
