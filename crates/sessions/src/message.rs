//! Conversation turns.
//!
//! The JSON shape mirrors what the Gemini `contents` array expects
//! (`{"role": "user", "parts": ["..."]}`), which keeps debug dumps of a
//! history readable next to request bodies.

use serde::{Deserialize, Serialize};

/// Origin of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message of a conversation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    role: Role,
    parts: Vec<String>,
}

impl Turn {
    pub fn new(role: Role, parts: Vec<String>) -> Self {
        Self { role, parts }
    }

    /// Create a user turn with a single text part.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![text.into()])
    }

    /// Create a model turn with a single text part.
    pub fn model(text: impl Into<String>) -> Self {
        Self::new(Role::Model, vec![text.into()])
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// All text parts joined, for logging and assertions.
    #[must_use]
    pub fn text(&self) -> String {
        self.parts.concat()
    }
}
