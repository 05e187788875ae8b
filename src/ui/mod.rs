//! Terminal rendering and input for the interactive chat
//!
//! Both halves are thin: the view is a pure function of a
//! [`ConversationState`](crate::orchestrator::ConversationState) snapshot,
//! and the input surface only parses gestures for the orchestrator.

pub mod input;
pub mod transcript;

pub use input::{HELP, InputCommand, parse, prompt, send_enabled};
pub use transcript::{render, render_agents, render_message, render_sessions};
