//! TOML configuration file loading
//!
//! Supports `~/.config/parley/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::providers::ChatBackend;
use crate::trigger::TriggerPolicy;
use crate::voice::SpeechBackend;
use crate::{Error, Result};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ParleyConfigFile {
    /// Chat backend configuration
    #[serde(default)]
    pub chat: ChatFileConfig,

    /// Speech synthesis configuration
    #[serde(default)]
    pub speech: SpeechFileConfig,

    /// Messaging channel configuration
    #[serde(default)]
    pub channel: ChannelFileConfig,

    /// Conversation behavior
    #[serde(default)]
    pub conversation: ConversationFileConfig,
}

/// Chat backend configuration
#[derive(Debug, Default, Deserialize)]
pub struct ChatFileConfig {
    /// Backend to use ("claude" or "openai")
    pub provider: Option<ChatBackend>,
    pub api_key: Option<String>,
    /// Model identifier (e.g. "claude-sonnet-4-20250514")
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub base_url: Option<String>,
}

/// Speech synthesis configuration
#[derive(Debug, Default, Deserialize)]
pub struct SpeechFileConfig {
    /// Backend to use ("openai" or "elevenlabs")
    pub provider: Option<SpeechBackend>,
    pub api_key: Option<String>,
    /// Voice identifier (e.g. "onyx", or an `ElevenLabs` voice id)
    pub voice: Option<String>,
    pub model: Option<String>,
    /// Playback speed multiplier
    pub speed: Option<f32>,
    pub base_url: Option<String>,
}

/// Messaging channel configuration
#[derive(Debug, Default, Deserialize)]
pub struct ChannelFileConfig {
    pub account_id: Option<String>,
    pub auth_token: Option<String>,
    /// Address messages are sent from (e.g. "+14155238886")
    pub sender_address: Option<String>,
    /// Address of the human in the conversation
    pub recipient_address: Option<String>,
    pub base_url: Option<String>,
}

/// Conversation behavior configuration
#[derive(Debug, Default, Deserialize)]
pub struct ConversationFileConfig {
    /// Max turns kept in history
    pub history_limit: Option<usize>,
    pub system_prompt: Option<String>,
    /// Call trigger phrases, highest priority first
    pub triggers: Option<Vec<String>>,
    pub trigger_policy: Option<TriggerPolicy>,
    pub default_call_context: Option<String>,
    /// Reply sent before a requested call is placed
    pub acknowledgment: Option<String>,
    /// Reply sent when the chat backend fails
    pub apology: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `ParleyConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> ParleyConfigFile {
    let Some(path) = config_file_path() else {
        return ParleyConfigFile::default();
    };

    if !path.exists() {
        return ParleyConfigFile::default();
    }

    match read_config_file(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            ParleyConfigFile::default()
        }
    }
}

/// Read and parse a config file at an explicit path
///
/// # Errors
///
/// Returns error if the file cannot be read or is not valid TOML
pub fn read_config_file(path: &Path) -> Result<ParleyConfigFile> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("failed to read {}: {e}", path.display()))
    })?;
    let config = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Return the config file path: `~/.config/parley/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("parley").join("config.toml"))
}
