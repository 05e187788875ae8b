//! Transcript view: renders a state snapshot as terminal lines

use crate::model::{Message, Role};
use crate::orchestrator::{ConversationState, Transcript, agents_by_name};

/// Render the selected conversation
#[must_use]
pub fn render(state: &ConversationState) -> Vec<String> {
    let mut lines = Vec::new();

    match (state.selected_agent(), state.selected_session()) {
        (Some(agent), Some(session)) => {
            lines.push(format!("== {} / {} ==", agent.name, session.label()));
        }
        (Some(agent), None) => lines.push(format!("== {} ==", agent.name)),
        (None, _) => lines.push("== no agent selected ==".to_string()),
    }

    match &state.transcript {
        Transcript::Absent => lines.push("[no session selected]".to_string()),
        Transcript::Empty => lines.push("[no messages yet]".to_string()),
        Transcript::Messages(messages) => lines.extend(messages.iter().map(render_message)),
    }

    if state.sending {
        lines.push("... waiting for reply".to_string());
    }

    if let Some(error) = &state.last_error {
        lines.push(format!("! {error} (/dismiss to clear)"));
    }

    lines
}

/// Render one message
#[must_use]
pub fn render_message(message: &Message) -> String {
    let speaker = match message.role {
        Role::User => "you",
        Role::Assistant => "assistant",
    };
    let audio = if message.audio_url.is_some() { " [audio]" } else { "" };
    format!("{speaker}> {}{audio}", message.content)
}

/// Render the agent collection, marking the selected one
#[must_use]
pub fn render_agents(state: &ConversationState) -> Vec<String> {
    if state.agents.is_empty() {
        return vec!["[no agents]".to_string()];
    }

    agents_by_name(&state.agents)
        .into_iter()
        .map(|agent| {
            let marker = if state.agent_id.as_deref() == Some(agent.id.as_str()) {
                "*"
            } else {
                " "
            };
            format!("{marker} {}  {}", agent.id, agent.name)
        })
        .collect()
}

/// Render the sessions of the selected agent, marking the selected one
#[must_use]
pub fn render_sessions(state: &ConversationState) -> Vec<String> {
    if state.agent_id.is_none() {
        return vec!["[no agent selected]".to_string()];
    }
    if state.sessions.is_empty() {
        return vec!["[no sessions]".to_string()];
    }

    state
        .sessions
        .iter()
        .map(|session| {
            let marker = if state.session_id.as_deref() == Some(session.id.as_str()) {
                "*"
            } else {
                " "
            };
            format!(
                "{marker} {}  {}  ({})",
                session.id,
                session.label(),
                session.created_at.format("%Y-%m-%d %H:%M")
            )
        })
        .collect()
}
