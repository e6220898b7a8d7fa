//! Template family renderers.
//!
//! Each function is a pure fold over the message slice. Nothing survives
//! between calls.

use crate::domain::{Message, Role, RoleClass, TurnTagStyle};

/// A collapsed turn: one role class with the newline-joined content of every
/// adjacent message in that class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub class: RoleClass,
    pub content: String,
}

/// Merge adjacent messages of the same role class.
#[must_use]
pub fn collapse(messages: &[Message]) -> Vec<Turn> {
    messages.iter().fold(Vec::new(), |mut turns: Vec<Turn>, message| {
        let class = message.role.class();
        match turns.last_mut() {
            Some(last) if last.class == class => {
                last.content.push('\n');
                last.content.push_str(&message.content);
            }
            _ => turns.push(Turn {
                class,
                content: message.content.clone(),
            }),
        }
        turns
    })
}

/// `<s> [INST] q [/INST] a </s>` turns, trailing instruction left open.
#[must_use]
pub fn turn_bracket(messages: &[Message]) -> String {
    let (mut merged, pending) = collapse(messages).into_iter().fold(
        (String::new(), None::<String>),
        |(mut merged, pending), turn| match turn.class {
            RoleClass::Inst => (merged, Some(format!("[INST] {} [/INST]", turn.content))),
            RoleClass::Answer => {
                let instruction = pending.unwrap_or_default();
                merged.push_str(&format!("<s> {instruction} {} </s>\n", turn.content));
                (merged, None)
            }
        },
    );
    if let Some(instruction) = pending {
        merged.push_str(&instruction);
    }
    merged
}

/// `<|im_start|>role\ncontent<|im_end|>` per message, uncollapsed.
#[must_use]
pub fn role_tag(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|message| {
            let role = match &message.role {
                Role::Other(_) => Role::User.as_str(),
                known => known.as_str(),
            };
            format!("<|im_start|>{role}\n{}<|im_end|>", message.content)
        })
        .chain(std::iter::once("<|im_start|>assistant".to_string()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Labelled turns closed by the style's end marker, then an open answer label.
#[must_use]
pub fn turn_tag(messages: &[Message], style: TurnTagStyle) -> String {
    collapse(messages)
        .into_iter()
        .map(|turn| {
            let label = match turn.class {
                RoleClass::Inst => style.inst_label(),
                RoleClass::Answer => style.answer_label(),
            };
            format!("{label}{}{}", turn.content, style.end_marker())
        })
        .chain(std::iter::once(style.answer_label().to_string()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `role: content` pairs separated by a blank line.
#[must_use]
pub fn fallback(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|message| format!("{}: {}", message.role, message.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}
