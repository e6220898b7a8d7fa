//! Command handlers.
//!
//! Handlers take an already built [`ChatOrchestrator`](chatgate_hf::ChatOrchestrator)
//! (or configuration) plus the parsed arguments, and format output for the
//! terminal. They hold no gateway logic of their own.

pub mod ask;
pub mod models;
pub mod prompt;
pub mod serve;

use chatgate_core::Message;

/// Conversation of an optional system prompt followed by one question.
pub(crate) fn conversation(system: Option<String>, question: String) -> Vec<Message> {
    system
        .filter(|s| !s.is_empty())
        .map(Message::system)
        .into_iter()
        .chain(std::iter::once(Message::user(question)))
        .collect()
}
