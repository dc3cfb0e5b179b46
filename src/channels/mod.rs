//! Messaging channel adapters
//!
//! A channel parses inbound transport payloads into [`InboundMessage`]s and
//! delivers [`OutgoingMessage`]s through the transport's API.

mod whatsapp;

use async_trait::async_trait;

pub use whatsapp::{WHATSAPP_SCHEME, WhatsAppChannel};

use crate::Result;

/// A normalized message received from a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Sender address, scheme prefix removed
    pub sender: String,

    /// Recipient address, scheme prefix removed
    pub recipient: String,

    /// Message text as received
    pub body: String,
}

/// A message to send to a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Recipient address
    pub to: String,

    /// Message content (plain text)
    pub content: String,
}

impl OutgoingMessage {
    /// Create a simple `text` message
    #[must_use]
    pub fn text(to: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            content: content.into(),
        }
    }
}

/// Transport acknowledgment of a delivered message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Transport-assigned message identifier
    pub id: String,

    /// Delivery status reported by the transport (e.g. "queued")
    pub status: Option<String>,
}

/// Trait for messaging channel adapters
#[async_trait]
pub trait Channel: Send + Sync {
    /// Get the channel name
    fn name(&self) -> &'static str;

    /// Send a message
    ///
    /// # Errors
    ///
    /// Returns `Error::Upstream` if the transport rejects the delivery
    async fn send(&self, message: OutgoingMessage) -> Result<DeliveryReceipt>;
}
