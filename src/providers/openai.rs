//! `OpenAI` chat completions provider

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ResponseProvider, require_api_key};
use crate::config::ChatConfig;
use crate::conversation::ConversationTurn;
use crate::{Error, Result};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// `OpenAI` provider using the Chat Completions API
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    base_url: String,
}

impl OpenAiProvider {
    /// Create a new `OpenAI` chat provider
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(config: &ChatConfig) -> Result<Self> {
        let api_key = require_api_key(config.api_key.as_deref(), "OpenAI")?;

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
}

#[async_trait]
impl ResponseProvider for OpenAiProvider {
    async fn generate_response(
        &self,
        system_prompt: &str,
        history: &[ConversationTurn],
    ) -> Result<String> {
        let messages = std::iter::once(Message {
            role: "system",
            content: system_prompt,
        })
        .chain(history.iter().map(|turn| Message {
            role: turn.role().as_str(),
            content: turn.content(),
        }))
        .collect();

        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
        };

        tracing::debug!(model = %self.model, turns = history.len(), "requesting OpenAI response");

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::upstream("openai", response).await);
        }

        let body = response.bytes().await?;
        let result: ChatCompletionResponse = serde_json::from_slice(&body)
            .map_err(|e| Error::Protocol(format!("unexpected OpenAI response: {e}")))?;

        result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| Error::Protocol("no text response from OpenAI".to_string()))
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use serde_json::json;

    use super::*;

    fn provider(base_url: String) -> OpenAiProvider {
        OpenAiProvider::new(&ChatConfig {
            api_key: Some("sk-test".to_string()),
            model: Some("gpt-test".to_string()),
            base_url: Some(base_url),
            ..ChatConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_system_prompt_leads_messages() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({
                "model": "gpt-test",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "hi"}
                ]
            })))
            .with_status(200)
            .with_body(json!({"choices": [{"message": {"role": "assistant", "content": "hey"}}]}).to_string())
            .create_async()
            .await;

        let reply = provider(server.url())
            .generate_response("be brief", &[ConversationTurn::user("hi")])
            .await
            .unwrap();

        assert_eq!(reply, "hey");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_choices_is_protocol_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(json!({"choices": []}).to_string())
            .create_async()
            .await;

        let err = provider(server.url())
            .generate_response("be brief", &[ConversationTurn::user("hi")])
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn test_unauthorized_is_upstream_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(401)
            .with_body("invalid api key")
            .create_async()
            .await;

        let err = provider(server.url())
            .generate_response("be brief", &[ConversationTurn::user("hi")])
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(401));
    }
}
