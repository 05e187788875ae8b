//! Error types for the agent console

use thiserror::Error;

/// Result type alias for agent console operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the agent console
#[derive(Debug, Error)]
pub enum Error {
    /// The platform refused microphone access
    #[error("microphone permission denied")]
    PermissionDenied,

    /// No usable capture device
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// `start()` called while a recording is already open
    #[error("a recording is already in progress")]
    AlreadyRecording,

    /// Audio stream or encoding error
    #[error("audio error: {0}")]
    Audio(String),

    /// Reply playback error
    #[error("playback error: {0}")]
    Playback(String),

    /// Transport-level failure talking to the backend
    #[error("network failure: {0}")]
    Network(#[from] reqwest::Error),

    /// Backend answered with a non-2xx status
    #[error("backend error {status}: {body}")]
    Backend {
        /// HTTP status code
        status: u16,
        /// Response body, kept as diagnostic text
        body: String,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Malformed URL
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// HTTP status carried by a backend error, if any
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Backend { status, .. } => Some(*status),
            _ => None,
        }
    }
}
