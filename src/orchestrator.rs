//! Conversation orchestration
//!
//! Each inbound message is classified as a call request or a chat turn:
//!
//! ```text
//! Idle ──inbound──▶ Classifying ──trigger──▶ CallFlow ──▶ Idle
//!                              └──otherwise─▶ ChatFlow ──▶ Idle
//! ```
//!
//! Chat backend failures are answered with an apology so the channel stays
//! responsive. Delivery failures are not recoverable here and propagate.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::channels::{Channel, InboundMessage, OutgoingMessage};
use crate::config::ConversationConfig;
use crate::conversation::{ConversationState, ConversationTurn};
use crate::providers::ResponseProvider;
use crate::trigger::TriggerDetector;
use crate::voice::{SpeechProvider, SpeechStream};
use crate::{Error, Result};

/// System prompt sent with every chat request
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Claude, an AI assistant chatting via WhatsApp.
Keep responses concise and suitable for mobile messaging (1-3 short paragraphs max).
Be helpful, friendly, and conversational.
Don't use markdown formatting - plain text only.
If the user asks you to call them, let them know they can say \"call me\" and you'll phone them.";

/// Reply sent before a requested call is placed
pub const DEFAULT_ACKNOWLEDGMENT: &str = "Got it! I'm calling you now...";

/// Reply sent when the chat backend fails
pub const DEFAULT_APOLOGY: &str = "Sorry, I encountered an error. Please try again.";

/// Result text reported for a handled call request
pub const CALL_INITIATED: &str = "Call initiated";

/// A request to place a voice call, consumed by the [`CallHandler`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    /// What the call should be about
    pub context: String,

    /// Trigger phrase that matched
    pub trigger: String,

    /// Address of the user who asked for the call
    pub requester: String,
}

/// Places voice calls on request
///
/// Implemented for async closures taking a [`CallRequest`].
#[async_trait]
pub trait CallHandler: Send + Sync {
    /// Start a call for the request
    ///
    /// # Errors
    ///
    /// Returns error if the call could not be started
    async fn on_call_requested(&self, request: CallRequest) -> Result<()>;
}

#[async_trait]
impl<F, Fut> CallHandler for F
where
    F: Fn(CallRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn on_call_requested(&self, request: CallRequest) -> Result<()> {
        self(request).await
    }
}

/// How an inbound message was handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A call was requested and handed to the call handler
    CallInitiated(CallRequest),
    /// The chat backend replied
    Reply(String),
    /// The chat backend failed; the apology was sent instead
    Apology(String),
}

impl Outcome {
    /// Text reported to the caller for this outcome
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::CallInitiated(_) => CALL_INITIATED,
            Self::Reply(text) | Self::Apology(text) => text,
        }
    }
}

/// Drives one two-party conversation
///
/// Owns the conversation history. Messages must be handled one at a time;
/// `handle_incoming` takes `&mut self` to enforce it.
pub struct Orchestrator {
    responder: Arc<dyn ResponseProvider>,
    channel: Arc<dyn Channel>,
    detector: TriggerDetector,
    speech: Option<Arc<dyn SpeechProvider>>,
    call_handler: Option<Box<dyn CallHandler>>,
    state: ConversationState,
    system_prompt: String,
    acknowledgment: String,
    apology: String,
}

impl Orchestrator {
    /// Create an orchestrator with default conversation settings
    #[must_use]
    pub fn new(responder: Arc<dyn ResponseProvider>, channel: Arc<dyn Channel>) -> Self {
        Self {
            responder,
            channel,
            detector: TriggerDetector::default(),
            speech: None,
            call_handler: None,
            state: ConversationState::default(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            acknowledgment: DEFAULT_ACKNOWLEDGMENT.to_string(),
            apology: DEFAULT_APOLOGY.to_string(),
        }
    }

    /// Create an orchestrator from conversation configuration
    ///
    /// # Errors
    ///
    /// Returns error if a trigger phrase is invalid
    pub fn from_config(
        config: &ConversationConfig,
        responder: Arc<dyn ResponseProvider>,
        channel: Arc<dyn Channel>,
    ) -> Result<Self> {
        let detector = TriggerDetector::new(&config.triggers)?
            .with_policy(config.trigger_policy)
            .with_default_context(config.default_call_context.clone());

        Ok(Self {
            detector,
            state: ConversationState::new(config.history_limit),
            system_prompt: config.system_prompt.clone(),
            acknowledgment: config.acknowledgment.clone(),
            apology: config.apology.clone(),
            ..Self::new(responder, channel)
        })
    }

    /// Attach a speech provider for rendering replies to audio
    #[must_use]
    pub fn with_speech(mut self, speech: Arc<dyn SpeechProvider>) -> Self {
        self.speech = Some(speech);
        self
    }

    /// Replace the trigger detector
    #[must_use]
    pub fn with_detector(mut self, detector: TriggerDetector) -> Self {
        self.detector = detector;
        self
    }

    /// Register the call handler
    ///
    /// Without a handler, trigger phrases are treated as ordinary chat.
    ///
    /// # Errors
    ///
    /// Returns error if a handler is already registered
    pub fn set_call_handler(&mut self, handler: impl CallHandler + 'static) -> Result<()> {
        if self.call_handler.is_some() {
            return Err(Error::Config("call handler already registered".to_string()));
        }
        self.call_handler = Some(Box::new(handler));
        Ok(())
    }

    /// Handle one inbound message
    ///
    /// # Errors
    ///
    /// Returns error if the body is blank, if a reply cannot be delivered
    /// through the channel, or if the call handler fails after the
    /// acknowledgment was sent
    pub async fn handle_incoming(&mut self, message: &InboundMessage) -> Result<Outcome> {
        let text = message.body.trim();
        if text.is_empty() {
            tracing::debug!(from = %message.sender, "ignoring blank message");
            return Err(Error::Protocol("inbound message body is blank".to_string()));
        }
        tracing::info!(from = %message.sender, text, "received message");

        if let Some(handler) = &self.call_handler
            && let Some(found) = self.detector.detect(text)
        {
            self.deliver(&message.sender, &self.acknowledgment).await?;

            let request = CallRequest {
                context: found.context,
                trigger: found.phrase,
                requester: message.sender.clone(),
            };
            tracing::info!(context = %request.context, "call requested");

            handler
                .on_call_requested(request.clone())
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "call handler failed");
                    Error::CallRequest(e.to_string())
                })?;

            return Ok(Outcome::CallInitiated(request));
        }

        self.state.push(ConversationTurn::user(text));

        let generated = self
            .responder
            .generate_response(&self.system_prompt, self.state.turns())
            .await;

        match generated {
            Ok(reply) => {
                self.state.push(ConversationTurn::assistant(reply.clone()));
                self.deliver(&message.sender, &reply).await?;
                Ok(Outcome::Reply(reply))
            }
            Err(e) => {
                tracing::error!(
                    provider = self.responder.name(),
                    error = %e,
                    "error generating response"
                );
                self.deliver(&message.sender, &self.apology).await?;
                Ok(Outcome::Apology(self.apology.clone()))
            }
        }
    }

    /// Render text to streaming audio with the attached speech provider
    ///
    /// # Errors
    ///
    /// Returns error if no speech provider is attached or synthesis fails
    pub async fn speak(&self, text: &str) -> Result<SpeechStream> {
        let Some(speech) = &self.speech else {
            return Err(Error::Config("no speech provider configured".to_string()));
        };
        tracing::debug!(provider = speech.name(), chars = text.len(), "rendering speech");
        speech.synthesize_stream(text).await
    }

    /// Conversation history, oldest turn first
    #[must_use]
    pub const fn history(&self) -> &ConversationState {
        &self.state
    }

    /// Forget the conversation so far
    pub fn reset(&mut self) {
        self.state.clear();
        tracing::debug!("conversation reset");
    }

    async fn deliver(&self, to: &str, content: &str) -> Result<()> {
        let receipt = self
            .channel
            .send(OutgoingMessage::text(to, content))
            .await?;
        tracing::debug!(channel = self.channel.name(), id = %receipt.id, "reply delivered");
        Ok(())
    }
}
