//! Agent Console - terminal client for conversational AI agents
//!
//! This library provides the client side of an agent platform:
//! - Agent, session and message management against the backend
//! - Voice messages recorded from the microphone
//! - Playback of spoken assistant replies
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              Terminal (ui: view + input)             │
//! └────────────────────┬────────────────────────────────┘
//!                      │ actions / snapshots
//! ┌────────────────────▼────────────────────────────────┐
//! │                  Orchestrator                        │
//! │   agent → session → transcript   │   sending flag   │
//! └──────────┬─────────────────────────────┬────────────┘
//!            │                             │
//! ┌──────────▼──────────┐       ┌──────────▼──────────┐
//! │   BackendGateway     │       │   Voice              │
//! │   HTTP/JSON          │       │   capture, playback  │
//! └──────────────────────┘       └─────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod gateway;
pub mod model;
pub mod orchestrator;
pub mod ui;
pub mod voice;

pub use config::Config;
pub use error::{Error, Result};
pub use gateway::{BackendGateway, HttpGateway};
pub use model::{Agent, AgentDraft, AgentPatch, Message, MessagePair, Role, Session, SessionDraft};
pub use orchestrator::{ActionOutcome, ConversationState, Orchestrator, Transcript};
pub use voice::{AudioCapture, AudioPayload, AudioPlayer, Microphone};
