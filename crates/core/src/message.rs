//! Chat turn domain types.
//!
//! A chat session is an append-only ordered sequence of turns:
//! User asks → Context is selected → Backend answers → both turns are stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The role of a turn's author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// System instructions
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// A single `{role, content}` turn, as exchanged with clients and backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    /// Create a new user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create a new assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Create a new system turn.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// A turn as persisted in a session transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredTurn {
    /// Unique turn ID
    pub id: String,

    /// Who wrote this turn
    pub role: Role,

    /// The text content
    pub content: String,

    /// When the turn was appended
    #[serde(skip_serializing, default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// The content of the most recent user turn, or `""` when there is none.
pub fn last_user_utterance(turns: &[ChatTurn]) -> &str {
    turns
        .iter()
        .rev()
        .find(|t| t.role == Role::User)
        .map(|t| t.content.as_str())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatTurn::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }

    #[test]
    fn role_parses_from_str() {
        assert_eq!("system".parse::<Role>().unwrap(), Role::System);
        assert!("tool".parse::<Role>().is_err());
    }

    #[test]
    fn last_user_utterance_skips_trailing_assistant() {
        let turns = vec![
            ChatTurn::user("first"),
            ChatTurn::assistant("reply"),
            ChatTurn::user("second"),
            ChatTurn::assistant("another reply"),
        ];
        assert_eq!(last_user_utterance(&turns), "second");
    }

    #[test]
    fn last_user_utterance_empty_without_user_turns() {
        let turns = vec![ChatTurn::system("rules")];
        assert_eq!(last_user_utterance(&turns), "");
    }
}
