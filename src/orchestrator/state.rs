//! Selection state owned by the orchestrator
//!
//! Rendering is a pure projection of [`ConversationState`]; it is only
//! mutated through orchestrator actions.

use crate::Error;
use crate::model::{Agent, Message, Session};

/// Message list of the selected session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Transcript {
    /// No list for the current selection (no session, or not loaded yet)
    #[default]
    Absent,
    /// Loaded, no messages
    Empty,
    /// Loaded, in backend order
    Messages(Vec<Message>),
}

impl Transcript {
    /// Wrap a loaded list, keeping backend order
    #[must_use]
    pub fn loaded(messages: Vec<Message>) -> Self {
        if messages.is_empty() {
            Self::Empty
        } else {
            Self::Messages(messages)
        }
    }

    /// Messages, empty for both `Absent` and `Empty`
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        match self {
            Self::Messages(messages) => messages,
            Self::Absent | Self::Empty => &[],
        }
    }

    /// True once a list has been loaded
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        !matches!(self, Self::Absent)
    }
}

/// Result of an orchestrator action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The action completed and its result was applied
    Applied,
    /// Precondition not met; nothing happened
    Ignored,
    /// A response arrived for a selection that is no longer current and was discarded
    Stale,
    /// The action failed; the latest-error slot holds the reason
    Failed,
}

/// Orchestrator action names, for error reporting and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    LoadAgents,
    SelectAgent,
    CreateAgent,
    UpdateAgent,
    DeleteAgent,
    SelectSession,
    CreateSession,
    DeleteSession,
    SendText,
    SendVoice,
}

impl Action {
    /// Human-readable verb phrase
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::LoadAgents => "load agents",
            Self::SelectAgent => "load sessions",
            Self::CreateAgent => "create agent",
            Self::UpdateAgent => "update agent",
            Self::DeleteAgent => "delete agent",
            Self::SelectSession => "load messages",
            Self::CreateSession => "create session",
            Self::DeleteSession => "delete session",
            Self::SendText => "send message",
            Self::SendVoice => "send voice message",
        }
    }
}

/// The most recent failure, shown until dismissed or superseded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionError {
    pub action: Action,
    pub message: String,
    /// HTTP status for backend errors
    pub status: Option<u16>,
}

impl ActionError {
    pub(crate) fn new(action: Action, error: &Error) -> Self {
        Self {
            action,
            message: error.to_string(),
            status: error.status(),
        }
    }
}

impl std::fmt::Display for ActionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to {}: {}", self.action.describe(), self.message)
    }
}

/// Identifiers a fetch was issued for, checked again when it resolves
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Ticket {
    pub agent_id: String,
    pub session_id: Option<String>,
    pub seq: u64,
}

/// Agents, selection, transcript and dispatch state
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    /// All agents, unordered
    pub agents: Vec<Agent>,
    /// Sessions of the selected agent
    pub sessions: Vec<Session>,
    /// Selected agent id
    pub agent_id: Option<String>,
    /// Selected session id; always one of `sessions`' agent
    pub session_id: Option<String>,
    /// Messages of the selected session
    pub transcript: Transcript,
    /// A message send is in flight
    pub sending: bool,
    /// Latest failure
    pub last_error: Option<ActionError>,

    agents_seq: u64,
    sessions_seq: u64,
    messages_seq: u64,
    /// Bumped whenever the session selection changes
    selection_seq: u64,
}

impl ConversationState {
    /// The selected agent record
    #[must_use]
    pub fn selected_agent(&self) -> Option<&Agent> {
        let id = self.agent_id.as_deref()?;
        self.agents.iter().find(|a| a.id == id)
    }

    /// The selected session record
    #[must_use]
    pub fn selected_session(&self) -> Option<&Session> {
        let id = self.session_id.as_deref()?;
        self.sessions.iter().find(|s| s.id == id)
    }

    /// Whether a send may be dispatched now
    #[must_use]
    pub const fn can_send(&self) -> bool {
        !self.sending && self.agent_id.is_some() && self.session_id.is_some()
    }

    /// Select an agent, tearing down everything below it
    pub(crate) fn set_agent(&mut self, agent_id: Option<String>) {
        self.agent_id = agent_id;
        self.sessions.clear();
        self.clear_session();
        // Invalidate in-flight session fetches for the previous agent
        self.sessions_seq += 1;
    }

    /// Drop the selected session and its transcript
    pub(crate) fn clear_session(&mut self) {
        self.session_id = None;
        self.transcript = Transcript::Absent;
        self.messages_seq += 1;
        self.selection_seq += 1;
    }

    /// Select a session; its transcript is unknown until fetched
    pub(crate) fn set_session(&mut self, session_id: &str) {
        self.session_id = Some(session_id.to_string());
        self.transcript = Transcript::Absent;
        self.selection_seq += 1;
    }

    /// Marker that changes on every session selection change
    pub(crate) const fn selection_mark(&self) -> u64 {
        self.selection_seq
    }

    pub(crate) fn issue_agents_fetch(&mut self) -> u64 {
        self.agents_seq += 1;
        self.agents_seq
    }

    pub(crate) const fn agents_fetch_current(&self, seq: u64) -> bool {
        self.agents_seq == seq
    }

    pub(crate) fn issue_sessions_fetch(&mut self, agent_id: &str) -> Ticket {
        self.sessions_seq += 1;
        Ticket {
            agent_id: agent_id.to_string(),
            session_id: None,
            seq: self.sessions_seq,
        }
    }

    pub(crate) fn sessions_fetch_current(&self, ticket: &Ticket) -> bool {
        self.sessions_seq == ticket.seq && self.agent_id.as_deref() == Some(ticket.agent_id.as_str())
    }

    pub(crate) fn issue_messages_fetch(&mut self, agent_id: &str, session_id: &str) -> Ticket {
        self.messages_seq += 1;
        Ticket {
            agent_id: agent_id.to_string(),
            session_id: Some(session_id.to_string()),
            seq: self.messages_seq,
        }
    }

    pub(crate) fn messages_fetch_current(&self, ticket: &Ticket) -> bool {
        self.messages_seq == ticket.seq
            && self.agent_id.as_deref() == Some(ticket.agent_id.as_str())
            && self.session_id == ticket.session_id
    }

    /// Selection still targets the same agent and session
    pub(crate) fn targets(&self, agent_id: &str, session_id: &str) -> bool {
        self.agent_id.as_deref() == Some(agent_id) && self.session_id.as_deref() == Some(session_id)
    }
}
