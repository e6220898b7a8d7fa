//! Chat messages and the role taxonomy.

use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, GatewayResult};

/// The role of a message sender.
///
/// Callers send free text; the three well-known roles are recognised and
/// everything else is preserved verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    System,
    User,
    Assistant,
    Other(String),
}

/// Collapse class used by the turn-based template families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleClass {
    /// Instruction-like turn (user, system, and unrecognised roles).
    Inst,
    /// Answer-like turn.
    Answer,
}

impl Role {
    /// Parse a role from caller-supplied text. Never fails.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "system" => Self::System,
            "user" => Self::User,
            "assistant" => Self::Assistant,
            other => Self::Other(other.to_string()),
        }
    }

    /// The role as the caller spelled it.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Other(name) => name,
        }
    }

    /// Map the role into the two-class collapse taxonomy.
    #[must_use]
    pub fn class(&self) -> RoleClass {
        match self {
            Self::Assistant => RoleClass::Answer,
            Self::Other(name) if matches!(name.as_str(), "bot" | "answer" | "model") => {
                RoleClass::Answer
            }
            _ => RoleClass::Inst,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// A message as received from the caller, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl Message {
    /// Create a message from a known role.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Validate an ordered list of raw messages.
    ///
    /// Fails on the first message missing its role or content, and on an
    /// empty list.
    pub fn parse_all(raw: Vec<RawMessage>) -> GatewayResult<Vec<Self>> {
        if raw.is_empty() {
            return Err(GatewayError::validation("messages must not be empty"));
        }
        raw.into_iter()
            .enumerate()
            .map(|(index, message)| {
                Self::try_from(message)
                    .map_err(|e| GatewayError::validation(format!("messages[{index}]: {e}")))
            })
            .collect()
    }
}

impl TryFrom<RawMessage> for Message {
    type Error = String;

    fn try_from(raw: RawMessage) -> Result<Self, Self::Error> {
        let role = raw.role.ok_or("missing `role`")?;
        let content = raw.content.ok_or("missing `content`")?;
        Ok(Self {
            role: Role::parse(&role),
            content,
        })
    }
}
