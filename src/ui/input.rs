//! Input surface: turns typed lines into gestures

use crate::orchestrator::ConversationState;

/// A gesture entered at the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputCommand {
    /// Reload and list agents
    Agents,
    /// Select an agent
    SelectAgent(String),
    /// Deselect the agent
    ClearAgent,
    /// List sessions of the selected agent
    Sessions,
    /// Create a session, optionally titled
    NewSession(Option<String>),
    /// Select a session
    OpenSession(String),
    /// Delete a session
    DeleteSession(String),
    /// Start or stop a voice recording
    ToggleRecording,
    /// Clear the error line
    Dismiss,
    Help,
    Quit,
    /// Plain text to send
    Text(String),
    /// Nothing to do (blank line)
    Empty,
    /// Unrecognized or malformed command
    Invalid(String),
}

/// Help text listing every command
pub const HELP: &str = "\
commands:
  /agents            list agents
  /agent <id>        select an agent
  /close             deselect the agent
  /sessions          list sessions of the selected agent
  /new [title]       create and open a session
  /open <id>         open a session
  /rm <id>           delete a session
  /record            start or stop a voice message
  /dismiss           clear the error line
  /quit              exit
anything else is sent as a text message";

/// Parse one line of input
#[must_use]
pub fn parse(line: &str) -> InputCommand {
    let line = line.trim();
    if line.is_empty() {
        return InputCommand::Empty;
    }

    let Some(command) = line.strip_prefix('/') else {
        return InputCommand::Text(line.to_string());
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, Some(rest.trim()).filter(|r| !r.is_empty())),
        None => (command, None),
    };

    match (name, arg) {
        ("agents", None) => InputCommand::Agents,
        ("agent", Some(id)) => InputCommand::SelectAgent(id.to_string()),
        ("close", None) => InputCommand::ClearAgent,
        ("sessions", None) => InputCommand::Sessions,
        ("new", title) => InputCommand::NewSession(title.map(ToString::to_string)),
        ("open", Some(id)) => InputCommand::OpenSession(id.to_string()),
        ("rm", Some(id)) => InputCommand::DeleteSession(id.to_string()),
        ("record" | "rec", None) => InputCommand::ToggleRecording,
        ("dismiss", None) => InputCommand::Dismiss,
        ("help" | "?", None) => InputCommand::Help,
        ("quit" | "exit", None) => InputCommand::Quit,
        ("agent" | "open" | "rm", None) => InputCommand::Invalid(format!("/{name} needs an id")),
        _ => InputCommand::Invalid(format!("unknown command: /{name}")),
    }
}

/// Whether message input is accepted in this state
///
/// Disabled while a send is in flight so text and voice sends stay
/// mutually exclusive.
#[must_use]
pub const fn send_enabled(state: &ConversationState) -> bool {
    state.can_send()
}

/// Prompt shown before each line
#[must_use]
pub fn prompt(state: &ConversationState, recording: bool) -> String {
    if recording {
        return "(recording, /record to send) > ".to_string();
    }
    if state.sending {
        return "(sending...) > ".to_string();
    }
    match (state.selected_agent(), state.selected_session()) {
        (Some(agent), Some(session)) => format!("{} / {} > ", agent.name, session.label()),
        (Some(agent), None) => format!("{} > ", agent.name),
        _ => "> ".to_string(),
    }
}
