//! Response normalizers.
//!
//! Both upstream families frame their stream as newline-delimited JSON,
//! optionally behind a `data:` prefix. [`normalize`] owns the framing and the
//! termination guarantee; a [`LineDecoder`] owns the schema of one family.
//!
//! Termination: exactly one terminal chunk is emitted, always last, whether
//! the decoder signals the end, the body ends, or the body fails mid-read.
//! Once the terminal chunk is out the upstream body is dropped.

pub mod conversation;
pub mod inference;

use bytes::BytesMut;
use chatgate_core::{ByteStream, CanonicalChunk, ChunkStream};
use futures_util::StreamExt;

pub use conversation::ConversationDecoder;
pub use inference::InferenceDecoder;

/// What a decoder made of one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Nothing to emit (status line, malformed line, unknown event).
    Skip,
    /// An incremental chunk.
    Emit(CanonicalChunk),
    /// The upstream signalled the end of generation.
    Finish,
}

/// Decodes the payload of one framed line.
pub trait LineDecoder: Send + 'static {
    /// `payload` has the `data:` prefix and surrounding whitespace removed
    /// and is never empty.
    fn decode(&mut self, payload: &str) -> Step;
}

/// Strip the `data:` prefix and surrounding whitespace.
///
/// Returns `None` for blank lines and SSE comments.
pub(crate) fn payload(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with(':') {
        return None;
    }
    let payload = trimmed.strip_prefix("data:").map_or(trimmed, str::trim_start);
    (!payload.is_empty()).then_some(payload)
}

fn find_newline(buf: &[u8]) -> Option<usize> {
    buf.iter().position(|&b| b == b'\n')
}

/// State threaded through the `unfold` stream.
struct NormalizeState<D> {
    body: Option<ByteStream>,
    buf: BytesMut,
    decoder: D,
    eof: bool,
    done: bool,
}

impl<D> NormalizeState<D> {
    /// Next complete line; after EOF the unterminated remainder counts too.
    fn next_line(&mut self) -> Option<String> {
        if let Some(end) = find_newline(&self.buf) {
            let line = self.buf.split_to(end + 1);
            return Some(String::from_utf8_lossy(&line).into_owned());
        }
        if self.eof && !self.buf.is_empty() {
            let line = self.buf.split();
            return Some(String::from_utf8_lossy(&line).into_owned());
        }
        None
    }

    fn finish(&mut self) -> CanonicalChunk {
        self.done = true;
        self.body = None;
        CanonicalChunk::finished()
    }
}

/// Turn a raw upstream body into canonical chunks.
pub fn normalize<D: LineDecoder>(body: ByteStream, decoder: D) -> ChunkStream {
    let state = NormalizeState {
        body: Some(body),
        buf: BytesMut::new(),
        decoder,
        eof: false,
        done: false,
    };

    futures_util::stream::unfold(state, |mut st| async move {
        if st.done {
            return None;
        }

        loop {
            if let Some(line) = st.next_line() {
                let Some(data) = payload(&line) else {
                    continue;
                };
                match st.decoder.decode(data) {
                    Step::Skip => continue,
                    Step::Emit(chunk) => return Some((chunk, st)),
                    Step::Finish => {
                        let terminal = st.finish();
                        return Some((terminal, st));
                    }
                }
            }

            if st.eof {
                // Stream ended without a terminal signal
                let terminal = st.finish();
                return Some((terminal, st));
            }

            let next = match st.body.as_mut() {
                Some(body) => body.next().await,
                None => None,
            };
            match next {
                Some(Ok(bytes)) => st.buf.extend_from_slice(&bytes),
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Upstream stream error, closing response");
                    st.eof = true;
                }
                None => st.eof = true,
            }
        }
    })
    .boxed()
}

/// Drain a chunk stream into the aggregated answer.
///
/// Increments are concatenated up to the terminal chunk, the stop sequence is
/// removed, and surrounding whitespace is trimmed once.
pub async fn aggregate(mut chunks: ChunkStream, stop_sequence: Option<&str>) -> String {
    let mut content = String::new();
    while let Some(chunk) = chunks.next().await {
        if chunk.is_terminal() {
            break;
        }
        content.push_str(&chunk.delta_content);
    }
    if let Some(stop) = stop_sequence.filter(|s| !s.is_empty()) {
        content = content.replace(stop, "");
    }
    content.trim().to_string()
}
