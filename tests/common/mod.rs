//! Shared test utilities

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agent_console::voice::{AudioPayload, AudioPlayer, Encoding};
use agent_console::{
    Agent, AgentDraft, AgentPatch, BackendGateway, Error, Message, MessagePair, Orchestrator,
    Result, Role, Session, SessionDraft,
};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Notify;

/// Reply content the mock assistant always gives
pub const REPLY: &str = "hi there";

/// Audio reference attached to voice replies
pub const REPLY_AUDIO: &str = "/audio/r1.mp3";

#[derive(Default)]
struct Store {
    agents: Vec<Agent>,
    sessions: Vec<Session>,
    messages: HashMap<String, Vec<Message>>,
    next_agent: u32,
    next_session: u32,
    next_message: u32,
    clock: i64,
}

impl Store {
    fn tick(&mut self) -> DateTime<Utc> {
        self.clock += 1;
        Utc.timestamp_opt(1_700_000_000 + self.clock, 0)
            .single()
            .expect("valid timestamp")
    }

    fn message(&mut self, session_id: &str, role: Role, content: &str, audio_url: Option<&str>) -> Message {
        self.next_message += 1;
        let created_at = self.tick();
        let message = Message {
            id: format!("m{}", self.next_message),
            session_id: session_id.to_string(),
            role,
            content: content.to_string(),
            audio_url: audio_url.map(ToString::to_string),
            created_at,
        };
        self.messages
            .entry(session_id.to_string())
            .or_default()
            .push(message.clone());
        message
    }
}

/// In-memory backend with per-call gates and injected failures
///
/// Every call is logged under a key like `list_messages:s1` before it waits
/// on a gate (if one is armed) and before checking for an injected failure.
#[derive(Default)]
pub struct MockGateway {
    store: Mutex<Store>,
    calls: Mutex<Vec<String>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    failures: Mutex<HashSet<String>>,
    /// Create responses come back as empty bodies
    empty_creates: Mutex<bool>,
}

impl MockGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add an agent directly to the store
    pub fn seed_agent(&self, name: &str) -> Agent {
        let mut store = self.store.lock().unwrap();
        store.next_agent += 1;
        let agent = Agent {
            id: format!("a{}", store.next_agent),
            name: name.to_string(),
            prompt: format!("You are {name}."),
            created_at: Some(store.tick()),
            updated_at: None,
        };
        store.agents.push(agent.clone());
        agent
    }

    /// Add a session directly to the store
    pub fn seed_session(&self, agent_id: &str, title: &str) -> Session {
        let mut store = self.store.lock().unwrap();
        store.next_session += 1;
        let session = Session {
            id: format!("s{}", store.next_session),
            agent_id: agent_id.to_string(),
            title: Some(title.to_string()),
            created_at: store.tick(),
        };
        store.sessions.push(session.clone());
        session
    }

    /// Add a message directly to the store
    pub fn seed_message(&self, session_id: &str, role: Role, content: &str) -> Message {
        self.store
            .lock()
            .unwrap()
            .message(session_id, role, content, None)
    }

    /// Hold calls with this key until [`release`](Self::release)
    pub fn gate(&self, key: &str) {
        self.gates
            .lock()
            .unwrap()
            .insert(key.to_string(), Arc::new(Notify::new()));
    }

    /// Let one held call with this key through
    pub fn release(&self, key: &str) {
        if let Some(gate) = self.gates.lock().unwrap().remove(key) {
            gate.notify_one();
        }
    }

    /// Make calls with this key fail with a 500
    pub fn fail(&self, key: &str) {
        self.failures.lock().unwrap().insert(key.to_string());
    }

    /// Stop failing calls with this key
    pub fn heal(&self, key: &str) {
        self.failures.lock().unwrap().remove(key);
    }

    /// Answer creates with an empty body
    pub fn empty_creates(&self) {
        *self.empty_creates.lock().unwrap() = true;
    }

    /// Number of calls made with this key
    pub fn count(&self, key: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == key).count()
    }

    pub fn called(&self, key: &str) -> bool {
        self.count(key) > 0
    }

    async fn enter(&self, key: String) -> Result<()> {
        self.calls.lock().unwrap().push(key.clone());

        let gate = self.gates.lock().unwrap().get(&key).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.failures.lock().unwrap().contains(&key) {
            return Err(Error::Backend {
                status: 500,
                body: format!("{key} exploded"),
            });
        }
        Ok(())
    }

    fn reply(&self, session_id: &str, content: &str, audio_url: Option<&str>) -> MessagePair {
        let mut store = self.store.lock().unwrap();
        let user_message = store.message(session_id, Role::User, content, None);
        let assistant_message = store.message(session_id, Role::Assistant, REPLY, audio_url);
        MessagePair {
            user_message,
            assistant_message,
        }
    }
}

#[async_trait]
impl BackendGateway for MockGateway {
    async fn list_agents(&self) -> Result<Vec<Agent>> {
        self.enter("list_agents".to_string()).await?;
        Ok(self.store.lock().unwrap().agents.clone())
    }

    async fn get_agent(&self, agent_id: &str) -> Result<Agent> {
        self.enter(format!("get_agent:{agent_id}")).await?;
        self.store
            .lock()
            .unwrap()
            .agents
            .iter()
            .find(|a| a.id == agent_id)
            .cloned()
            .ok_or_else(|| Error::Backend {
                status: 404,
                body: "agent not found".to_string(),
            })
    }

    async fn create_agent(&self, draft: &AgentDraft) -> Result<Option<Agent>> {
        self.enter("create_agent".to_string()).await?;
        let agent = self.seed_agent(&draft.name);
        {
            let mut store = self.store.lock().unwrap();
            if let Some(stored) = store.agents.iter_mut().find(|a| a.id == agent.id) {
                stored.prompt.clone_from(&draft.prompt);
            }
        }
        if *self.empty_creates.lock().unwrap() {
            return Ok(None);
        }
        Ok(Some(agent))
    }

    async fn update_agent(&self, agent_id: &str, patch: &AgentPatch) -> Result<Option<Agent>> {
        self.enter(format!("update_agent:{agent_id}")).await?;
        let mut store = self.store.lock().unwrap();
        let agent = store
            .agents
            .iter_mut()
            .find(|a| a.id == agent_id)
            .ok_or_else(|| Error::Backend {
                status: 404,
                body: "agent not found".to_string(),
            })?;
        if let Some(name) = &patch.name {
            agent.name.clone_from(name);
        }
        if let Some(prompt) = &patch.prompt {
            agent.prompt.clone_from(prompt);
        }
        Ok(Some(agent.clone()))
    }

    async fn delete_agent(&self, agent_id: &str) -> Result<()> {
        self.enter(format!("delete_agent:{agent_id}")).await?;
        let mut store = self.store.lock().unwrap();
        store.agents.retain(|a| a.id != agent_id);
        store.sessions.retain(|s| s.agent_id != agent_id);
        Ok(())
    }

    async fn list_sessions(&self, agent_id: &str) -> Result<Vec<Session>> {
        self.enter(format!("list_sessions:{agent_id}")).await?;
        let mut sessions: Vec<Session> = self
            .store
            .lock()
            .unwrap()
            .sessions
            .iter()
            .filter(|s| s.agent_id == agent_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn create_session(&self, agent_id: &str, draft: &SessionDraft) -> Result<Option<Session>> {
        self.enter(format!("create_session:{agent_id}")).await?;
        let title = draft.title.clone().unwrap_or_else(|| "New chat".to_string());
        let session = self.seed_session(agent_id, &title);
        if *self.empty_creates.lock().unwrap() {
            return Ok(None);
        }
        Ok(Some(session))
    }

    async fn delete_session(&self, agent_id: &str, session_id: &str) -> Result<()> {
        self.enter(format!("delete_session:{session_id}")).await?;
        let mut store = self.store.lock().unwrap();
        store
            .sessions
            .retain(|s| !(s.id == session_id && s.agent_id == agent_id));
        store.messages.remove(session_id);
        Ok(())
    }

    async fn list_messages(&self, _agent_id: &str, session_id: &str) -> Result<Vec<Message>> {
        self.enter(format!("list_messages:{session_id}")).await?;
        Ok(self
            .store
            .lock()
            .unwrap()
            .messages
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn send_message(
        &self,
        _agent_id: &str,
        session_id: &str,
        content: &str,
    ) -> Result<Option<MessagePair>> {
        self.enter(format!("send_message:{session_id}")).await?;
        Ok(Some(self.reply(session_id, content, None)))
    }

    async fn send_voice(
        &self,
        _agent_id: &str,
        session_id: &str,
        payload: AudioPayload,
    ) -> Result<Option<MessagePair>> {
        self.enter(format!("send_voice:{session_id}")).await?;
        let transcript = format!("({} bytes of {})", payload.len(), payload.mime_type());
        Ok(Some(self.reply(session_id, &transcript, Some(REPLY_AUDIO))))
    }
}

/// Player that records what it was asked to play
#[derive(Default)]
pub struct RecordingPlayer {
    played: Mutex<Vec<String>>,
    broken: bool,
}

impl RecordingPlayer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A player whose output device is missing
    pub fn broken() -> Arc<Self> {
        Arc::new(Self {
            played: Mutex::default(),
            broken: true,
        })
    }

    pub fn played(&self) -> Vec<String> {
        self.played.lock().unwrap().clone()
    }
}

impl AudioPlayer for RecordingPlayer {
    fn play(&self, url: &str) -> Result<()> {
        self.played.lock().unwrap().push(url.to_string());
        if self.broken {
            return Err(Error::Playback("no output device".to_string()));
        }
        Ok(())
    }
}

/// Orchestrator over a fresh mock backend and player
pub fn orchestrator() -> (Orchestrator, Arc<MockGateway>, Arc<RecordingPlayer>) {
    let gateway = MockGateway::new();
    let player = RecordingPlayer::new();
    let orchestrator = Orchestrator::new(gateway.clone(), player.clone());
    (orchestrator, gateway, player)
}

/// A small non-empty recording
pub fn voice_payload() -> AudioPayload {
    AudioPayload {
        data: vec![0x1a, 0x45, 0xdf, 0xa3, 0, 1, 2, 3],
        encoding: Encoding::WebmOpus,
    }
}

/// Poll until `condition` holds, yielding to other tasks in between
pub async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}
