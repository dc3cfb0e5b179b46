//! Anthropic Claude chat provider

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ResponseProvider, require_api_key};
use crate::config::ChatConfig;
use crate::conversation::ConversationTurn;
use crate::{Error, Result};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const API_VERSION: &str = "2023-06-01";

/// Claude provider using the Messages API
pub struct ClaudeProvider {
    client: Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    base_url: String,
}

impl ClaudeProvider {
    /// Create a new Claude provider
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(config: &ChatConfig) -> Result<Self> {
        let api_key = require_api_key(config.api_key.as_deref(), "Anthropic")?;

        Ok(Self {
            client: Client::new(),
            api_key,
            model: config.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: config.max_tokens,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }

    /// Model used for requests
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ResponseProvider for ClaudeProvider {
    async fn generate_response(
        &self,
        system_prompt: &str,
        history: &[ConversationTurn],
    ) -> Result<String> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: system_prompt,
            messages: history,
        };

        tracing::debug!(model = %self.model, turns = history.len(), "requesting Claude response");

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::upstream("anthropic", response).await);
        }

        let body = response.bytes().await?;
        let result: MessagesResponse = serde_json::from_slice(&body)
            .map_err(|e| Error::Protocol(format!("unexpected Claude response: {e}")))?;

        result
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| Error::Protocol("no text response from Claude".to_string()))
    }

    fn name(&self) -> &'static str {
        "claude"
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: &'a [ConversationTurn],
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}
