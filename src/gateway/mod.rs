//! Backend gateway
//!
//! The backend owns agents, sessions and messages. The client only consumes
//! its contract through the [`BackendGateway`] trait.

pub mod http;

use async_trait::async_trait;

use crate::Result;
use crate::model::{Agent, AgentDraft, AgentPatch, Message, MessagePair, Session, SessionDraft};
use crate::voice::AudioPayload;

pub use http::HttpGateway;

/// Agent, session, message and voice operations of the backend
///
/// Mutations return `Option` because the backend may answer with an empty
/// 204, which counts as success.
#[async_trait]
pub trait BackendGateway: Send + Sync {
    /// List all agents
    async fn list_agents(&self) -> Result<Vec<Agent>>;

    /// Fetch one agent
    async fn get_agent(&self, agent_id: &str) -> Result<Agent>;

    /// Create an agent
    async fn create_agent(&self, draft: &AgentDraft) -> Result<Option<Agent>>;

    /// Update an agent
    async fn update_agent(&self, agent_id: &str, patch: &AgentPatch) -> Result<Option<Agent>>;

    /// Delete an agent
    async fn delete_agent(&self, agent_id: &str) -> Result<()>;

    /// List an agent's sessions
    async fn list_sessions(&self, agent_id: &str) -> Result<Vec<Session>>;

    /// Create a session for an agent
    async fn create_session(&self, agent_id: &str, draft: &SessionDraft) -> Result<Option<Session>>;

    /// Delete a session
    async fn delete_session(&self, agent_id: &str, session_id: &str) -> Result<()>;

    /// List a session's messages in chronological order
    async fn list_messages(&self, agent_id: &str, session_id: &str) -> Result<Vec<Message>>;

    /// Send a text message and receive the assistant reply
    async fn send_message(
        &self,
        agent_id: &str,
        session_id: &str,
        content: &str,
    ) -> Result<Option<MessagePair>>;

    /// Upload a recording and receive the transcribed user message and reply
    async fn send_voice(
        &self,
        agent_id: &str,
        session_id: &str,
        payload: AudioPayload,
    ) -> Result<Option<MessagePair>>;
}
