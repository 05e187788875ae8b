//! Configuration management for the agent console

pub mod file;

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::{Error, Result};

use file::ConsoleConfigFile;

/// Default backend base URL
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// Default route prefix of the backend API
pub const DEFAULT_API_PREFIX: &str = "/api";

/// Default capture sample rate (16kHz for speech)
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;

/// Agent console configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend connection configuration
    pub backend: BackendConfig,

    /// Microphone capture configuration
    pub audio: AudioConfig,

    /// Reply playback configuration
    pub playback: PlaybackConfig,
}

/// Backend connection configuration
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL without the API prefix
    pub base_url: String,

    /// Path prefix for every route
    pub api_prefix: String,

    /// Per-request timeout
    pub timeout: Duration,

    /// Optional bearer token (from `AGENT_CONSOLE_API_KEY` env)
    pub api_key: Option<String>,
}

/// Microphone capture configuration
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Requested capture sample rate in Hz
    pub sample_rate: u32,

    /// Upper bound on waiting for the recorder to drain on stop
    pub drain_timeout: Duration,

    /// Prefer opus-in-container over the container default codec
    pub prefer_compressed: bool,
}

/// Reply playback configuration
#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    /// Play assistant voice replies
    pub enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::resolve(ConsoleConfigFile::default(), |_| None)
    }
}

impl Config {
    /// Load configuration from env and the default config file
    ///
    /// # Errors
    ///
    /// Returns error if the resolved backend URL is invalid
    pub fn load() -> Result<Self> {
        let config = Self::resolve(file::load_config_file(), |key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from env and an explicit config file
    ///
    /// Unlike [`Config::load`], a missing or malformed file is an error.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed, or the backend URL is invalid
    pub fn load_from(path: &Path) -> Result<Self> {
        let fc = file::read_config_file(path)?;
        tracing::info!(path = %path.display(), "loaded config file");
        let config = Self::resolve(fc, |key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Resolve configuration with priority env > toml > default
    ///
    /// `env` looks up a variable by name, which keeps resolution testable
    /// without touching the process environment.
    pub fn resolve(fc: ConsoleConfigFile, env: impl Fn(&str) -> Option<String>) -> Self {
        let backend = BackendConfig {
            base_url: env("AGENT_CONSOLE_BACKEND_URL")
                .or(fc.backend.url)
                .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string()),
            api_prefix: env("AGENT_CONSOLE_API_PREFIX")
                .or(fc.backend.api_prefix)
                .unwrap_or_else(|| DEFAULT_API_PREFIX.to_string()),
            timeout: Duration::from_secs(
                parse_env(&env, "AGENT_CONSOLE_TIMEOUT_SECS")
                    .or(fc.backend.timeout_secs)
                    .unwrap_or(60),
            ),
            api_key: env("AGENT_CONSOLE_API_KEY").or(fc.backend.api_key),
        };

        let audio = AudioConfig {
            sample_rate: parse_env(&env, "AGENT_CONSOLE_SAMPLE_RATE")
                .or(fc.audio.sample_rate)
                .unwrap_or(DEFAULT_SAMPLE_RATE),
            drain_timeout: Duration::from_millis(fc.audio.drain_timeout_ms.unwrap_or(2_000)),
            prefer_compressed: fc.audio.prefer_compressed.unwrap_or(true),
        };

        let playback_disabled = env("AGENT_CONSOLE_DISABLE_PLAYBACK")
            .is_some_and(|v| matches!(v.as_str(), "1" | "true" | "yes"));
        let playback = PlaybackConfig {
            enabled: !playback_disabled && fc.playback.enabled.unwrap_or(true),
        };

        Self {
            backend,
            audio,
            playback,
        }
    }

    /// Override the backend base URL (CLI flag)
    #[must_use]
    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend.base_url = url.into();
        self
    }

    /// Check that the configuration is usable
    ///
    /// # Errors
    ///
    /// Returns error if the backend URL does not parse or is not http(s)
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.backend.base_url)
            .map_err(|e| Error::Config(format!("invalid backend url {}: {e}", self.backend.base_url)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "backend url must be http or https, got {}",
                url.scheme()
            )));
        }

        if self.backend.timeout.is_zero() {
            return Err(Error::Config("request timeout must be positive".to_string()));
        }

        if self.audio.sample_rate == 0 {
            return Err(Error::Config("sample rate must be positive".to_string()));
        }

        Ok(())
    }
}

/// Parse a numeric env var, warning when it is set but malformed
fn parse_env<T: FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = env(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable environment variable");
            None
        }
    }
}
