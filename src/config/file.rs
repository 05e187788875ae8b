//! TOML configuration file loading
//!
//! Supports `~/.config/agent-console/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ConsoleConfigFile {
    /// Backend connection settings
    #[serde(default)]
    pub backend: BackendFileConfig,

    /// Microphone capture settings
    #[serde(default)]
    pub audio: AudioFileConfig,

    /// Reply playback settings
    #[serde(default)]
    pub playback: PlaybackFileConfig,
}

/// Backend connection configuration
#[derive(Debug, Default, Deserialize)]
pub struct BackendFileConfig {
    /// Base URL (e.g. "http://localhost:8000")
    pub url: Option<String>,

    /// Path prefix for every route (e.g. "/api")
    pub api_prefix: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,

    /// Bearer token sent with every request
    pub api_key: Option<String>,
}

/// Microphone capture configuration
#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    /// Capture sample rate in Hz
    pub sample_rate: Option<u32>,

    /// Upper bound on the stop handshake, in milliseconds
    pub drain_timeout_ms: Option<u64>,

    /// Prefer opus-in-container when the device supports it
    pub prefer_compressed: Option<bool>,
}

/// Reply playback configuration
#[derive(Debug, Default, Deserialize)]
pub struct PlaybackFileConfig {
    /// Play assistant voice replies
    pub enabled: Option<bool>,
}

/// Load the TOML config file from the standard path
///
/// Returns `ConsoleConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> ConsoleConfigFile {
    let Some(path) = config_file_path() else {
        return ConsoleConfigFile::default();
    };

    if !path.exists() {
        return ConsoleConfigFile::default();
    }

    match read_config_file(&path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "loaded config file");
            config
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            ConsoleConfigFile::default()
        }
    }
}

/// Read and parse a config file at an explicit path
///
/// # Errors
///
/// Returns error if the file cannot be read or is not valid TOML
pub fn read_config_file(path: &Path) -> Result<ConsoleConfigFile> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Return the config file path: `~/.config/agent-console/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("agent-console").join("config.toml"))
}
