//! Shared test utilities

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parley_gateway::{
    Channel, ConversationTurn, DeliveryReceipt, Error, OutgoingMessage, ResponseProvider, Result,
};
use tokio::sync::Mutex;

/// Shared, ordered log of what the doubles observed
pub type EventLog = Arc<Mutex<Vec<String>>>;

/// Mock channel that records sent messages
pub struct MockChannel {
    sent_messages: Arc<Mutex<Vec<OutgoingMessage>>>,
    events: EventLog,
    fail_with_status: Option<u16>,
}

impl MockChannel {
    pub fn new(events: EventLog) -> Self {
        Self {
            sent_messages: Arc::new(Mutex::new(Vec::new())),
            events,
            fail_with_status: None,
        }
    }

    /// Channel whose every delivery is rejected with `status`
    pub fn failing(events: EventLog, status: u16) -> Self {
        Self {
            fail_with_status: Some(status),
            ..Self::new(events)
        }
    }

    pub async fn get_sent_messages(&self) -> Vec<OutgoingMessage> {
        self.sent_messages.lock().await.clone()
    }
}

#[async_trait]
impl Channel for MockChannel {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn send(&self, message: OutgoingMessage) -> Result<DeliveryReceipt> {
        self.events.lock().await.push(format!("send:{}", message.content));

        if let Some(status) = self.fail_with_status {
            return Err(Error::Upstream {
                service: "mock",
                status,
                body: "delivery rejected".to_string(),
            });
        }

        let mut sent = self.sent_messages.lock().await;
        sent.push(message);
        Ok(DeliveryReceipt {
            id: format!("SM{}", sent.len()),
            status: Some("queued".to_string()),
        })
    }
}

/// Provider that replays scripted results and records the histories it saw
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<String>>>,
    seen: Mutex<Vec<Vec<ConversationTurn>>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Histories passed to each call, in call order
    pub async fn seen(&self) -> Vec<Vec<ConversationTurn>> {
        self.seen.lock().await.clone()
    }
}

#[async_trait]
impl ResponseProvider for ScriptedProvider {
    async fn generate_response(
        &self,
        _system_prompt: &str,
        history: &[ConversationTurn],
    ) -> Result<String> {
        self.seen.lock().await.push(history.to_vec());
        self.script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(Error::Protocol("script exhausted".to_string())))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Provider that replies "reply N" to a message "msg N"
pub struct NumberedProvider;

#[async_trait]
impl ResponseProvider for NumberedProvider {
    async fn generate_response(
        &self,
        _system_prompt: &str,
        history: &[ConversationTurn],
    ) -> Result<String> {
        let last = history.last().map_or("", ConversationTurn::content);
        Ok(last.replace("msg", "reply"))
    }

    fn name(&self) -> &'static str {
        "numbered"
    }
}

pub fn new_event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn inbound(body: &str) -> parley_gateway::InboundMessage {
    parley_gateway::InboundMessage {
        sender: "+15551234567".to_string(),
        recipient: "+14155238886".to_string(),
        body: body.to_string(),
    }
}
