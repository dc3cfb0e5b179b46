//! Chat response providers
//!
//! Each backend implements [`ResponseProvider`]; the backend in use is picked
//! from [`ChatBackend`] when the gateway is configured.

mod claude;
mod openai;

use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use claude::ClaudeProvider;
pub use openai::OpenAiProvider;

use crate::config::ChatConfig;
use crate::conversation::ConversationTurn;
use crate::{Error, Result};

/// Chat backend variant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatBackend {
    /// Anthropic Messages API
    #[default]
    #[serde(rename = "claude")]
    Claude,
    /// `OpenAI` Chat Completions API
    #[serde(rename = "openai")]
    OpenAi,
}

impl FromStr for ChatBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "claude" | "anthropic" => Ok(Self::Claude),
            "openai" => Ok(Self::OpenAi),
            other => Err(Error::Config(format!("unknown chat provider: {other}"))),
        }
    }
}

/// Turns a system prompt and conversation history into one reply
#[async_trait]
pub trait ResponseProvider: Send + Sync {
    /// Generate the next assistant reply
    ///
    /// `history` is the full ordered conversation, oldest first. Roles
    /// usually alternate but implementations must not rely on it.
    ///
    /// # Errors
    ///
    /// Returns `Error::Upstream` on a non-success response and
    /// `Error::Protocol` if the response carries no reply text
    async fn generate_response(
        &self,
        system_prompt: &str,
        history: &[ConversationTurn],
    ) -> Result<String>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

/// Build the provider selected by `config`
///
/// # Errors
///
/// Returns `Error::Config` if the selected backend has no API key
pub fn build_response_provider(config: &ChatConfig) -> Result<Box<dyn ResponseProvider>> {
    let provider: Box<dyn ResponseProvider> = match config.provider {
        ChatBackend::Claude => Box::new(ClaudeProvider::new(config)?),
        ChatBackend::OpenAi => Box::new(OpenAiProvider::new(config)?),
    };
    tracing::info!(provider = provider.name(), "chat provider ready");
    Ok(provider)
}

/// Return the configured API key, rejecting missing or blank values
pub(crate) fn require_api_key(api_key: Option<&str>, service: &str) -> Result<String> {
    match api_key.map(str::trim) {
        Some(key) if !key.is_empty() => Ok(key.to_string()),
        _ => Err(Error::Config(format!("{service} API key required"))),
    }
}
