//! Decoder for text-generation-inference token streams.
//!
//! Each line carries one token: `data: {"token": {"text": "..."}, ...}`.
//! The stream may end with an in-band stop sequence token or simply close.

use chatgate_core::{CanonicalChunk, ParseError};
use serde::Deserialize;

use super::{LineDecoder, Step};

#[derive(Debug, Deserialize)]
struct InferenceEvent {
    #[serde(default)]
    token: Option<TokenPayload>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenPayload {
    text: Option<String>,
}

fn parse_fragment(payload: &str) -> Result<String, ParseError> {
    let event: InferenceEvent = serde_json::from_str(payload)?;
    if let Some(error) = event.error {
        return Err(ParseError::UpstreamEvent(error));
    }
    event
        .token
        .and_then(|token| token.text)
        .ok_or(ParseError::MissingField("token.text"))
}

/// Stateful decoder for one inference stream.
#[derive(Debug, Clone, Default)]
pub struct InferenceDecoder {
    stop_sequence: Option<String>,
    seen_content: bool,
}

impl InferenceDecoder {
    pub fn new(stop_sequence: Option<String>) -> Self {
        Self {
            stop_sequence: stop_sequence.filter(|s| !s.is_empty()),
            seen_content: false,
        }
    }
}

impl LineDecoder for InferenceDecoder {
    fn decode(&mut self, payload: &str) -> Step {
        let fragment = match parse_fragment(payload) {
            Ok(fragment) => fragment,
            Err(e) => {
                tracing::warn!(error = %e, line = payload, "Skipping malformed inference line");
                return Step::Skip;
            }
        };

        if self.stop_sequence.as_deref() == Some(fragment.trim()) {
            return Step::Finish;
        }

        if self.seen_content {
            Step::Emit(CanonicalChunk::completion(fragment))
        } else {
            self.seen_content = true;
            Step::Emit(CanonicalChunk::completion(fragment.trim_start()))
        }
    }
}
