//! Decoder for conversational backend envelopes.
//!
//! Lines are JSON objects discriminated by `type`: `status` (progress),
//! `stream` (one `token` increment), `finalAnswer` (the full `text`, end of
//! generation) and assorted others we ignore. Output is built from the
//! increments alone; the final text is only compared against them.

use chatgate_core::{CanonicalChunk, ParseError};
use serde::Deserialize;

use super::{LineDecoder, Step};

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum ConversationEvent {
    Status {
        #[serde(default)]
        status: Option<String>,
    },
    Stream {
        #[serde(default)]
        token: Option<String>,
    },
    FinalAnswer {
        #[serde(default)]
        text: Option<String>,
    },
    #[serde(other)]
    Other,
}

/// Stateful decoder for one conversation stream.
#[derive(Debug, Clone, Default)]
pub struct ConversationDecoder {
    emitted: String,
}

impl ConversationDecoder {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Whether the final answer disagrees with the streamed increments.
///
/// Surrounding whitespace and NUL padding are ignored; the upstream pads
/// some increments.
pub fn answer_drift(emitted: &str, final_text: &str) -> bool {
    let clean = |s: &str| s.replace('\0', "").trim().to_string();
    clean(emitted) != clean(final_text)
}

impl LineDecoder for ConversationDecoder {
    fn decode(&mut self, payload: &str) -> Step {
        let event = match serde_json::from_str::<ConversationEvent>(payload) {
            Ok(event) => event,
            Err(e) => {
                let e = ParseError::from(e);
                tracing::warn!(error = %e, line = payload, "Skipping malformed conversation line");
                return Step::Skip;
            }
        };

        match event {
            ConversationEvent::Status { status } => {
                tracing::trace!(status = status.as_deref().unwrap_or(""), "Conversation status");
                Step::Skip
            }
            ConversationEvent::Stream { token } => {
                let token = token.unwrap_or_default();
                self.emitted.push_str(&token);
                Step::Emit(CanonicalChunk::completion(token))
            }
            ConversationEvent::FinalAnswer { text } => {
                if let Some(text) = text {
                    if answer_drift(&self.emitted, &text) {
                        tracing::warn!(
                            streamed = self.emitted.len(),
                            final_answer = text.len(),
                            "Final answer differs from streamed increments, keeping increments"
                        );
                    }
                }
                Step::Finish
            }
            ConversationEvent::Other => Step::Skip,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{body, broken_body};
    use super::super::{aggregate, normalize};
    use super::*;
    use futures_util::StreamExt;

    fn lines(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|l| format!("{l}\n")).collect()
    }

    async fn run(input: &[&str]) -> Vec<CanonicalChunk> {
        let owned = lines(input);
        let refs: Vec<&str> = owned.iter().map(String::as_str).collect();
        normalize(body(&refs), ConversationDecoder::new())
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_stream_then_final_answer() {
        let chunks = run(&[
            r#"{"type":"status","status":"started"}"#,
            r#"{"type":"stream","token":"Hel"}"#,
            r#"{"type":"stream","token":"lo"}"#,
            r#"{"type":"finalAnswer","text":"Hello"}"#,
            r#"{"type":"stream","token":"late"}"#,
        ])
        .await;
        let contents: Vec<_> = chunks.iter().map(|c| c.delta_content.as_str()).collect();
        assert_eq!(contents, vec!["Hel", "lo", ""]);
        assert_eq!(chunks.iter().filter(|c| c.is_terminal()).count(), 1);
        assert!(chunks[2].is_terminal());
    }

    #[tokio::test]
    async fn test_unknown_types_and_malformed_lines_ignored() {
        let chunks = run(&[
            r#"{"type":"webSearch","messageType":"update"}"#,
            r#"{"type":"title","title":"Greeting"}"#,
            r#"{"token":"no type"}"#,
            "{broken",
            r#"{"type":"stream","token":"ok"}"#,
        ])
        .await;
        let contents: Vec<_> = chunks.iter().map(|c| c.delta_content.as_str()).collect();
        assert_eq!(contents, vec!["ok", ""]);
        assert!(chunks.last().unwrap().is_terminal());
    }

    #[tokio::test]
    async fn test_null_token_is_an_empty_increment() {
        let chunks = run(&[
            r#"{"type":"stream","token":"A"}"#,
            r#"{"type":"stream","token":null}"#,
            r#"{"type":"stream"}"#,
            r#"{"type":"stream","token":"B"}"#,
            r#"{"type":"finalAnswer","text":"AB"}"#,
        ])
        .await;
        let contents: Vec<_> = chunks.iter().map(|c| c.delta_content.as_str()).collect();
        assert_eq!(contents, vec!["A", "", "", "B", ""]);
        assert_eq!(chunks.iter().filter(|c| c.is_terminal()).count(), 1);
    }

    #[tokio::test]
    async fn test_eof_without_final_answer_terminates_once() {
        let chunks = run(&[r#"{"type":"stream","token":"partial"}"#]).await;
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks.iter().filter(|c| c.is_terminal()).count(), 1);
    }

    #[tokio::test]
    async fn test_read_error_terminates_once() {
        let stream = normalize(
            broken_body(&["data: {\"type\":\"stream\",\"token\":\"x\"}\n"]),
            ConversationDecoder::new(),
        );
        let chunks: Vec<_> = stream.collect().await;
        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].is_terminal());
    }

    #[tokio::test]
    async fn test_drifting_final_answer_keeps_increments() {
        let owned = lines(&[
            r#"{"type":"stream","token":" The answer"}"#,
            r#"{"type":"stream","token":" is 4. "}"#,
            r#"{"type":"finalAnswer","text":"The answer is 42."}"#,
        ]);
        let refs: Vec<&str> = owned.iter().map(String::as_str).collect();
        let stream = normalize(body(&refs), ConversationDecoder::new());
        assert_eq!(aggregate(stream, None).await, "The answer is 4.");
    }

    #[test]
    fn test_answer_drift_detection() {
        assert!(!answer_drift(" Hello ", "Hello"));
        assert!(!answer_drift("Hi\0\0", "Hi"));
        assert!(answer_drift("The answer is 4.", "The answer is 42."));
    }
}
