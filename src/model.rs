//! Client-side projections of backend records
//!
//! The client never assigns identity; every id here comes from the backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named AI persona with an instruction template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    /// Backend-assigned identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Instruction text ("system prompt")
    #[serde(default)]
    pub prompt: String,
    /// Creation timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Fields for creating an agent
#[derive(Debug, Clone, Serialize)]
pub struct AgentDraft {
    pub name: String,
    pub prompt: String,
}

/// Partial update of an agent; unset fields are left untouched by the backend
#[derive(Debug, Clone, Default, Serialize)]
pub struct AgentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl AgentPatch {
    /// True if the patch would change nothing
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.prompt.is_none()
    }
}

/// A conversation thread scoped to one agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Backend-assigned identifier
    pub id: String,
    /// Owning agent
    pub agent_id: String,
    /// Title, generated by the backend when not supplied
    #[serde(default)]
    pub title: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Title for display, falling back to the id
    #[must_use]
    pub fn label(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }
}

/// Fields for creating a session
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Assistant => f.write_str("assistant"),
        }
    }
}

/// One turn in a session; immutable once created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub session_id: String,
    pub role: Role,
    pub content: String,
    /// Playable audio reference for voice replies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The user message and generated assistant reply returned by a send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePair {
    pub user_message: Message,
    pub assistant_message: Message,
}
