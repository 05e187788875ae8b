//! Conversation orchestration
//!
//! Owns agent selection, session selection and the message list, and the
//! rules for invalidating and reloading each tier when an ancestor changes.
//!
//! Actions take `&self` and may interleave at every gateway call. State is
//! only touched in short critical sections between those calls, and every
//! fetch carries a [`Ticket`] so a response for a selection that has since
//! changed is discarded instead of applied. After a mutation the affected
//! collection is always reloaded in full from the backend.

mod state;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::gateway::BackendGateway;
use crate::model::{Agent, AgentDraft, AgentPatch, Message, Session, SessionDraft};
use crate::voice::{AudioPayload, AudioPlayer};
use crate::{Error, Result};

use state::Ticket;
pub use state::{Action, ActionError, ActionOutcome, ConversationState, Transcript};

/// How a fetched result landed on the current state
enum Landing {
    Applied,
    Stale,
    Failed(Error),
}

struct Inner {
    gateway: Arc<dyn BackendGateway>,
    player: Arc<dyn AudioPlayer>,
    state: Mutex<ConversationState>,
}

/// Shared handle to the conversation state machine
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    /// Create an orchestrator over a gateway and a reply player
    #[must_use]
    pub fn new(gateway: Arc<dyn BackendGateway>, player: Arc<dyn AudioPlayer>) -> Self {
        Self {
            inner: Arc::new(Inner {
                gateway,
                player,
                state: Mutex::new(ConversationState::default()),
            }),
        }
    }

    /// Copy of the current state for rendering
    #[must_use]
    pub fn snapshot(&self) -> ConversationState {
        self.state().clone()
    }

    /// The gateway actions are dispatched through
    #[must_use]
    pub fn gateway(&self) -> &Arc<dyn BackendGateway> {
        &self.inner.gateway
    }

    fn state(&self) -> MutexGuard<'_, ConversationState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Clear the latest error
    pub fn dismiss_error(&self) {
        self.state().last_error = None;
    }

    // Agents

    /// Fetch the full agent collection
    pub async fn load_agents(&self) -> ActionOutcome {
        self.reload_agents(Action::LoadAgents).await
    }

    /// Select an agent, tearing down the session tier, then load its sessions
    pub async fn select_agent(&self, agent_id: &str) -> ActionOutcome {
        let ticket = {
            let mut s = self.state();
            if !s.agents.iter().any(|a| a.id == agent_id) {
                tracing::warn!(agent_id, "ignoring selection of unknown agent");
                return ActionOutcome::Ignored;
            }
            s.set_agent(Some(agent_id.to_string()));
            s.issue_sessions_fetch(agent_id)
        };

        tracing::debug!(agent_id, "agent selected, loading sessions");
        let result = self.inner.gateway.list_sessions(agent_id).await;
        self.land_sessions(Action::SelectAgent, &ticket, result)
    }

    /// Clear the agent selection and everything below it
    pub fn clear_agent(&self) -> ActionOutcome {
        let mut s = self.state();
        s.set_agent(None);
        s.last_error = None;
        ActionOutcome::Applied
    }

    /// Create an agent, then reload the collection
    pub async fn create_agent(&self, draft: AgentDraft) -> ActionOutcome {
        match self.inner.gateway.create_agent(&draft).await {
            Ok(created) => {
                tracing::info!(
                    agent_id = created.as_ref().map(|a| a.id.as_str()),
                    name = %draft.name,
                    "agent created"
                );
                self.reload_agents(Action::CreateAgent).await
            }
            Err(e) => self.fail(Action::CreateAgent, &e),
        }
    }

    /// Update an agent, then reload the collection
    ///
    /// The selection is kept by id, so a selected agent shows its new fields
    /// once the reload lands.
    pub async fn update_agent(&self, agent_id: &str, patch: AgentPatch) -> ActionOutcome {
        if patch.is_empty() {
            return ActionOutcome::Ignored;
        }

        match self.inner.gateway.update_agent(agent_id, &patch).await {
            Ok(_) => {
                tracing::info!(agent_id, "agent updated");
                self.reload_agents(Action::UpdateAgent).await
            }
            Err(e) => self.fail(Action::UpdateAgent, &e),
        }
    }

    /// Delete an agent, clearing the selection if it was selected, then reload
    pub async fn delete_agent(&self, agent_id: &str) -> ActionOutcome {
        if let Err(e) = self.inner.gateway.delete_agent(agent_id).await {
            return self.fail(Action::DeleteAgent, &e);
        }

        {
            let mut s = self.state();
            if s.agent_id.as_deref() == Some(agent_id) {
                s.set_agent(None);
            }
        }

        tracing::info!(agent_id, "agent deleted");
        self.reload_agents(Action::DeleteAgent).await
    }

    async fn reload_agents(&self, action: Action) -> ActionOutcome {
        let seq = self.state().issue_agents_fetch();
        let result = self.inner.gateway.list_agents().await;

        let mut s = self.state();
        if !s.agents_fetch_current(seq) {
            tracing::debug!(seq, "discarding superseded agent list");
            return ActionOutcome::Stale;
        }

        match result {
            Ok(agents) => {
                tracing::debug!(count = agents.len(), "agents loaded");
                s.agents = agents;
                let selected_gone = s
                    .agent_id
                    .as_deref()
                    .is_some_and(|id| !s.agents.iter().any(|a| a.id == id));
                if selected_gone {
                    tracing::debug!("selected agent no longer exists, clearing selection");
                    s.set_agent(None);
                }
                s.last_error = None;
                ActionOutcome::Applied
            }
            Err(e) => record_failure(&mut s, action, &e),
        }
    }

    // Sessions

    /// Select a session of the current agent and load its messages
    pub async fn select_session(&self, session_id: &str) -> ActionOutcome {
        let ticket = {
            let mut s = self.state();
            let Some(agent_id) = s.agent_id.clone() else {
                return ActionOutcome::Ignored;
            };
            if !s.sessions.iter().any(|x| x.id == session_id) {
                tracing::warn!(session_id, "ignoring selection of session outside current agent");
                return ActionOutcome::Ignored;
            }
            s.set_session(session_id);
            s.issue_messages_fetch(&agent_id, session_id)
        };

        tracing::debug!(session_id, "session selected, loading messages");
        self.load_transcript(Action::SelectSession, ticket).await
    }

    /// Create a session for the current agent and select it
    ///
    /// The new session is not selected if the user picked another session
    /// while the create was in flight.
    pub async fn create_session(&self, title: Option<String>) -> ActionOutcome {
        let (agent_id, mark) = {
            let s = self.state();
            let Some(agent_id) = s.agent_id.clone() else {
                return ActionOutcome::Ignored;
            };
            (agent_id, s.selection_mark())
        };

        let draft = SessionDraft { title };
        let created = match self.inner.gateway.create_session(&agent_id, &draft).await {
            Ok(created) => created,
            Err(e) => return self.fail(Action::CreateSession, &e),
        };

        let ticket = {
            let mut s = self.state();
            if s.agent_id.as_deref() != Some(agent_id.as_str()) {
                return ActionOutcome::Stale;
            }
            s.issue_sessions_fetch(&agent_id)
        };

        let listed = self.inner.gateway.list_sessions(&agent_id).await;

        let messages_ticket = {
            let mut s = self.state();
            if s.agent_id.as_deref() != Some(agent_id.as_str()) {
                tracing::debug!(agent_id = %agent_id, "agent changed while creating session");
                return ActionOutcome::Stale;
            }
            let current = s.sessions_fetch_current(&ticket);

            let sessions = match listed {
                Ok(sessions) => sessions,
                Err(e) => {
                    if current {
                        s.sessions.clear();
                        s.clear_session();
                    }
                    return record_failure(&mut s, Action::CreateSession, &e);
                }
            };

            let chosen = pick_created(created.as_ref(), &sessions);
            if current {
                s.sessions = sessions;
            }

            let Some(chosen) = chosen else {
                tracing::debug!("create returned no session record, nothing to select");
                s.last_error = None;
                return ActionOutcome::Applied;
            };

            if !s.sessions.iter().any(|x| x.id == chosen.id) {
                // Newest first, matching the backend's list order
                s.sessions.insert(0, chosen.clone());
            }

            tracing::info!(session_id = %chosen.id, "session created");
            if s.selection_mark() != mark {
                tracing::debug!(
                    session_id = %chosen.id,
                    "session selection changed while creating, keeping it"
                );
                s.last_error = None;
                return ActionOutcome::Applied;
            }

            s.set_session(&chosen.id);
            s.issue_messages_fetch(&agent_id, &chosen.id)
        };

        self.load_transcript(Action::CreateSession, messages_ticket)
            .await
    }

    /// Delete a session of the current agent, then reload the collection
    pub async fn delete_session(&self, session_id: &str) -> ActionOutcome {
        let Some(agent_id) = self.state().agent_id.clone() else {
            return ActionOutcome::Ignored;
        };

        if let Err(e) = self
            .inner
            .gateway
            .delete_session(&agent_id, session_id)
            .await
        {
            return self.fail(Action::DeleteSession, &e);
        }

        let ticket = {
            let mut s = self.state();
            if s.agent_id.as_deref() != Some(agent_id.as_str()) {
                return ActionOutcome::Stale;
            }
            if s.session_id.as_deref() == Some(session_id) {
                s.clear_session();
            }
            s.issue_sessions_fetch(&agent_id)
        };

        tracing::info!(session_id, "session deleted");
        let result = self.inner.gateway.list_sessions(&agent_id).await;
        self.land_sessions(Action::DeleteSession, &ticket, result)
    }

    fn land_sessions(
        &self,
        action: Action,
        ticket: &Ticket,
        result: Result<Vec<Session>>,
    ) -> ActionOutcome {
        let mut s = self.state();
        if !s.sessions_fetch_current(ticket) {
            tracing::debug!(agent_id = %ticket.agent_id, "discarding stale session list");
            return ActionOutcome::Stale;
        }

        match result {
            Ok(sessions) => {
                tracing::debug!(count = sessions.len(), "sessions loaded");
                s.sessions = sessions;
                let selected_gone = s
                    .session_id
                    .as_deref()
                    .is_some_and(|id| !s.sessions.iter().any(|x| x.id == id));
                if selected_gone {
                    s.clear_session();
                }
                s.last_error = None;
                ActionOutcome::Applied
            }
            Err(e) => {
                s.sessions.clear();
                s.clear_session();
                record_failure(&mut s, action, &e)
            }
        }
    }

    // Messages

    /// Send a text message to the selected session
    ///
    /// A no-op while another send is in flight or nothing is selected.
    pub async fn send_text(&self, content: &str) -> ActionOutcome {
        let content = content.trim();
        if content.is_empty() {
            return ActionOutcome::Ignored;
        }

        let Some((agent_id, session_id)) = self.begin_send() else {
            return ActionOutcome::Ignored;
        };

        tracing::debug!(session_id = %session_id, chars = content.len(), "sending text message");
        let sent = self
            .inner
            .gateway
            .send_message(&agent_id, &session_id, content)
            .await
            .map(|_| ());

        self.finish_send(Action::SendText, &agent_id, &session_id, sent)
            .await
    }

    /// Upload a recording to the selected session and play the spoken reply
    ///
    /// A no-op while another send is in flight, nothing is selected, or the
    /// payload is empty. Playback failures are logged, never surfaced.
    pub async fn send_voice(&self, payload: AudioPayload) -> ActionOutcome {
        if payload.is_empty() {
            tracing::warn!("ignoring empty recording");
            return ActionOutcome::Ignored;
        }

        let Some((agent_id, session_id)) = self.begin_send() else {
            return ActionOutcome::Ignored;
        };

        tracing::debug!(session_id = %session_id, bytes = payload.len(), "sending voice message");
        let sent = self
            .inner
            .gateway
            .send_voice(&agent_id, &session_id, payload)
            .await;

        if let Ok(Some(pair)) = &sent {
            if let Some(url) = pair.assistant_message.audio_url.as_deref() {
                if let Err(e) = self.inner.player.play(url) {
                    tracing::warn!(url, error = %e, "could not play reply audio");
                }
            }
        }

        self.finish_send(Action::SendVoice, &agent_id, &session_id, sent.map(|_| ()))
            .await
    }

    /// Check-and-set the sending flag, returning the send target
    fn begin_send(&self) -> Option<(String, String)> {
        let mut s = self.state();
        if !s.can_send() {
            tracing::debug!(sending = s.sending, "send not possible now");
            return None;
        }
        let target = (s.agent_id.clone()?, s.session_id.clone()?);
        s.sending = true;
        Some(target)
    }

    /// Reload the transcript after a send and clear the sending flag
    async fn finish_send(
        &self,
        action: Action,
        agent_id: &str,
        session_id: &str,
        sent: Result<()>,
    ) -> ActionOutcome {
        let ticket = {
            let mut s = self.state();
            s.targets(agent_id, session_id)
                .then(|| s.issue_messages_fetch(agent_id, session_id))
        };

        let reload = match ticket {
            Some(ticket) => {
                let result = self
                    .inner
                    .gateway
                    .list_messages(agent_id, session_id)
                    .await;
                Some((ticket, result))
            }
            None => None,
        };

        let mut s = self.state();
        s.sending = false;
        let landing = reload.map(|(ticket, result)| land_messages(&mut s, &ticket, result, false));

        match (sent, landing) {
            (Err(e), _) | (Ok(()), Some(Landing::Failed(e))) => record_failure(&mut s, action, &e),
            (Ok(()), Some(Landing::Applied)) => {
                s.last_error = None;
                ActionOutcome::Applied
            }
            (Ok(()), Some(Landing::Stale) | None) => ActionOutcome::Stale,
        }
    }

    async fn load_transcript(&self, action: Action, ticket: Ticket) -> ActionOutcome {
        let Some(session_id) = ticket.session_id.clone() else {
            return ActionOutcome::Ignored;
        };

        let result = self
            .inner
            .gateway
            .list_messages(&ticket.agent_id, &session_id)
            .await;

        let mut s = self.state();
        match land_messages(&mut s, &ticket, result, true) {
            Landing::Applied => {
                s.last_error = None;
                ActionOutcome::Applied
            }
            Landing::Stale => ActionOutcome::Stale,
            Landing::Failed(e) => record_failure(&mut s, action, &e),
        }
    }

    fn fail(&self, action: Action, error: &Error) -> ActionOutcome {
        record_failure(&mut self.state(), action, error)
    }
}

/// Apply a message fetch if its ticket is still current
fn land_messages(
    s: &mut ConversationState,
    ticket: &Ticket,
    result: Result<Vec<Message>>,
    empty_on_failure: bool,
) -> Landing {
    if !s.messages_fetch_current(ticket) {
        tracing::debug!(
            session_id = ticket.session_id.as_deref(),
            "discarding stale message list"
        );
        return Landing::Stale;
    }

    match result {
        Ok(messages) => {
            tracing::debug!(count = messages.len(), "messages loaded");
            s.transcript = Transcript::loaded(messages);
            Landing::Applied
        }
        Err(e) => {
            if empty_on_failure {
                s.transcript = Transcript::Empty;
            }
            Landing::Failed(e)
        }
    }
}

/// Match the created session against the reloaded list, else use the raw record
fn pick_created(created: Option<&Session>, listed: &[Session]) -> Option<Session> {
    let created = created?;
    listed
        .iter()
        .find(|x| x.id == created.id)
        .cloned()
        .or_else(|| Some(created.clone()))
}

fn record_failure(s: &mut ConversationState, action: Action, error: &Error) -> ActionOutcome {
    tracing::warn!(action = action.describe(), error = %error, "action failed");
    s.last_error = Some(ActionError::new(action, error));
    ActionOutcome::Failed
}

/// Agents sorted by name for display; the collection itself stays unordered
#[must_use]
pub fn agents_by_name(agents: &[Agent]) -> Vec<&Agent> {
    let mut sorted: Vec<&Agent> = agents.iter().collect();
    sorted.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    sorted
}
