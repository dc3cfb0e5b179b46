//! `WhatsApp` channel adapter
//!
//! Uses the Twilio Messages API for sending. Inbound messages arrive as
//! form-encoded Twilio webhook payloads, parsed with
//! [`WhatsAppChannel::parse_inbound`].

use std::borrow::Cow;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{Channel, DeliveryReceipt, InboundMessage, OutgoingMessage};
use crate::config::ChannelConfig;
use crate::{Error, Result};

/// Address scheme Twilio uses for `WhatsApp` numbers
pub const WHATSAPP_SCHEME: &str = "whatsapp:";

const DEFAULT_BASE_URL: &str = "https://api.twilio.com";

/// `WhatsApp` channel adapter
pub struct WhatsAppChannel {
    /// Twilio account SID
    account_id: String,
    auth_token: String,
    /// Number messages are sent from
    sender_address: String,
    /// Number of the user on the other end
    recipient_address: String,
    base_url: String,
    client: Client,
}

impl WhatsAppChannel {
    /// Create a new `WhatsApp` channel adapter
    ///
    /// # Errors
    ///
    /// Returns error if the account id, auth token or sender address is missing
    pub fn new(config: &ChannelConfig) -> Result<Self> {
        if config.account_id.trim().is_empty() {
            return Err(Error::Config("Twilio account SID required".to_string()));
        }
        if config.auth_token.trim().is_empty() {
            return Err(Error::Config("Twilio auth token required".to_string()));
        }
        if config.sender_address.trim().is_empty() {
            return Err(Error::Config("WhatsApp sender number required".to_string()));
        }

        Ok(Self {
            account_id: config.account_id.trim().to_string(),
            auth_token: config.auth_token.trim().to_string(),
            sender_address: strip_scheme(config.sender_address.trim()).to_string(),
            recipient_address: strip_scheme(config.recipient_address.trim()).to_string(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            client: Client::new(),
        })
    }

    /// Parse a form-encoded Twilio webhook payload
    ///
    /// Returns `None` if `From`, `To` or `Body` is missing or empty. A body of
    /// only whitespace counts as empty.
    #[must_use]
    pub fn parse_inbound(payload: &str) -> Option<InboundMessage> {
        Self::parse_inbound_pairs(url::form_urlencoded::parse(payload.as_bytes()))
    }

    /// Parse already-decoded webhook fields
    ///
    /// The first occurrence of each field wins.
    #[must_use]
    pub fn parse_inbound_pairs<'a, I>(pairs: I) -> Option<InboundMessage>
    where
        I: IntoIterator<Item = (Cow<'a, str>, Cow<'a, str>)>,
    {
        let mut from = None;
        let mut to = None;
        let mut body = None;

        for (key, value) in pairs {
            let slot = match key.as_ref() {
                "From" => &mut from,
                "To" => &mut to,
                "Body" => &mut body,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }

        let (Some(from), Some(to), Some(body)) = (from, to, body) else {
            tracing::debug!("webhook payload missing From, To or Body");
            return None;
        };
        if from.is_empty() || to.is_empty() || body.trim().is_empty() {
            tracing::debug!("webhook payload has empty From, To or Body");
            return None;
        }

        Some(InboundMessage {
            sender: strip_scheme(&from).to_string(),
            recipient: strip_scheme(&to).to_string(),
            body: body.into_owned(),
        })
    }

    /// Send a text message to the configured user number
    ///
    /// # Errors
    ///
    /// Returns error if no user number is configured or the API request fails
    pub async fn send_text(&self, body: &str) -> Result<DeliveryReceipt> {
        if self.recipient_address.is_empty() {
            return Err(Error::Config("WhatsApp user number required".to_string()));
        }
        self.send_to(&self.recipient_address, body).await
    }

    /// Send a text message to a `WhatsApp` number
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails
    pub async fn send_to(&self, to: &str, body: &str) -> Result<DeliveryReceipt> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.account_id
        );

        let from = with_scheme(&self.sender_address);
        let to_address = with_scheme(to);

        tracing::debug!(
            to = strip_scheme(to),
            preview = %preview(body),
            "sending WhatsApp message"
        );

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.account_id, Some(&self.auth_token))
            .form(&[("From", from.as_str()), ("To", to_address.as_str()), ("Body", body)])
            .send()
            .await?;

        if !response.status().is_success() {
            let err = Error::upstream("twilio", response).await;
            tracing::error!(error = %err, "WhatsApp send failed");
            return Err(err);
        }

        let payload = response.bytes().await?;
        let resource: MessageResource = serde_json::from_slice(&payload)
            .map_err(|e| Error::Protocol(format!("unexpected Twilio response: {e}")))?;
        let Some(id) = resource.sid else {
            return Err(Error::Protocol(
                "Twilio response missing message sid".to_string(),
            ));
        };

        tracing::info!(sid = %id, "WhatsApp message sent");
        Ok(DeliveryReceipt {
            id,
            status: resource.status,
        })
    }

    /// Number of the user on the other end of the conversation
    #[must_use]
    pub fn recipient_address(&self) -> &str {
        &self.recipient_address
    }
}

#[async_trait]
impl Channel for WhatsAppChannel {
    fn name(&self) -> &'static str {
        "whatsapp"
    }

    async fn send(&self, message: OutgoingMessage) -> Result<DeliveryReceipt> {
        self.send_to(&message.to, &message.content).await
    }
}

/// Twilio message resource (subset)
#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: Option<String>,
    status: Option<String>,
}

/// Remove the `whatsapp:` scheme if present
fn strip_scheme(address: &str) -> &str {
    address.strip_prefix(WHATSAPP_SCHEME).unwrap_or(address)
}

/// Add the `whatsapp:` scheme if absent
fn with_scheme(address: &str) -> String {
    format!("{WHATSAPP_SCHEME}{}", strip_scheme(address))
}

/// First 50 characters of a message, for logs
fn preview(body: &str) -> Cow<'_, str> {
    match body.char_indices().nth(50) {
        Some((idx, _)) => Cow::Owned(format!("{}...", &body[..idx])),
        None => Cow::Borrowed(body),
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use serde_json::json;

    use super::*;

    fn config(base_url: String) -> ChannelConfig {
        ChannelConfig {
            account_id: "AC123".to_string(),
            auth_token: "secret".to_string(),
            sender_address: "+14155238886".to_string(),
            recipient_address: "whatsapp:+15551234567".to_string(),
            base_url: Some(base_url),
        }
    }

    #[test]
    fn test_parse_inbound_strips_scheme() {
        let msg = WhatsAppChannel::parse_inbound(
            "From=whatsapp%3A%2B15551234567&To=whatsapp%3A%2B14155238886&Body=Hello+there&SmsSid=SM1",
        )
        .unwrap();

        assert_eq!(msg.sender, "+15551234567");
        assert_eq!(msg.recipient, "+14155238886");
        assert_eq!(msg.body, "Hello there");
    }

    #[test]
    fn test_parse_inbound_missing_fields() {
        assert!(WhatsAppChannel::parse_inbound("To=whatsapp%3A%2B1&Body=hi").is_none());
        assert!(WhatsAppChannel::parse_inbound("From=whatsapp%3A%2B1&Body=hi").is_none());
        assert!(WhatsAppChannel::parse_inbound("From=whatsapp%3A%2B1&To=whatsapp%3A%2B2").is_none());
        assert!(WhatsAppChannel::parse_inbound("From=a&To=b&Body=").is_none());
    }

    #[test]
    fn test_parse_inbound_rejects_blank_body() {
        assert!(WhatsAppChannel::parse_inbound("From=a&To=b&Body=+++").is_none());
        assert!(WhatsAppChannel::parse_inbound("From=a&To=b&Body=%0A%09+").is_none());

        let msg = WhatsAppChannel::parse_inbound("From=a&To=b&Body=+hi+").unwrap();
        assert_eq!(msg.body, " hi ");
    }

    #[test]
    fn test_parse_inbound_tolerates_garbage() {
        assert!(WhatsAppChannel::parse_inbound("").is_none());
        assert!(WhatsAppChannel::parse_inbound("%%%&&==&From").is_none());
        assert!(WhatsAppChannel::parse_inbound("\u{0}\u{ff}").is_none());
    }

    #[test]
    fn test_parse_inbound_without_scheme() {
        let msg = WhatsAppChannel::parse_inbound("From=%2B1&To=%2B2&Body=yo").unwrap();
        assert_eq!(msg.sender, "+1");
        assert_eq!(msg.recipient, "+2");
    }

    #[test]
    fn test_parse_inbound_first_field_wins() {
        let msg = WhatsAppChannel::parse_inbound("From=a&To=b&Body=first&Body=second").unwrap();
        assert_eq!(msg.body, "first");
    }

    #[test]
    fn test_new_requires_credentials() {
        let mut cfg = config("http://localhost".to_string());
        cfg.auth_token = "  ".to_string();
        assert!(matches!(WhatsAppChannel::new(&cfg), Err(Error::Config(_))));
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let long = "é".repeat(60);
        let short = preview(&long);
        assert_eq!(short.chars().count(), 53);
        assert_eq!(preview("short"), "short");
    }

    #[tokio::test]
    async fn test_send_text_posts_form() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/2010-04-01/Accounts/AC123/Messages.json")
            .match_header("authorization", "Basic QUMxMjM6c2VjcmV0")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("From".to_string(), "whatsapp:+14155238886".to_string()),
                Matcher::UrlEncoded("To".to_string(), "whatsapp:+15551234567".to_string()),
                Matcher::UrlEncoded("Body".to_string(), "Hi & welcome".to_string()),
            ]))
            .with_status(201)
            .with_body(json!({"sid": "SM42", "status": "queued"}).to_string())
            .create_async()
            .await;

        let channel = WhatsAppChannel::new(&config(server.url())).unwrap();
        let receipt = channel.send_text("Hi & welcome").await.unwrap();

        assert_eq!(receipt.id, "SM42");
        assert_eq!(receipt.status.as_deref(), Some("queued"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_failure_carries_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/2010-04-01/Accounts/AC123/Messages.json")
            .with_status(401)
            .with_body(r#"{"code":20003,"message":"Authenticate"}"#)
            .create_async()
            .await;

        let channel = WhatsAppChannel::new(&config(server.url())).unwrap();
        let err = channel
            .send(OutgoingMessage::text("+15551234567", "hello"))
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(401));
    }

    #[tokio::test]
    async fn test_success_without_sid_is_protocol_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/2010-04-01/Accounts/AC123/Messages.json")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let channel = WhatsAppChannel::new(&config(server.url())).unwrap();
        let err = channel.send_text("hello").await.unwrap_err();

        assert!(matches!(err, Error::Protocol(_)));
    }
}
