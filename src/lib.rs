//! Parley Gateway - Messaging conversation gateway for AI assistants
//!
//! This library provides the conversation layer behind a messaging number:
//! - Bounded conversation history
//! - Call-request detection in inbound text
//! - Pluggable chat response and speech synthesis backends
//! - `WhatsApp` channel adapter (Twilio)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              Channel (WhatsApp via Twilio)           │
//! └────────────────────┬────────────────────────────────┘
//!                      │ InboundMessage / OutgoingMessage
//! ┌────────────────────▼────────────────────────────────┐
//! │                  Orchestrator                        │
//! │   Trigger detection  │  Conversation state          │
//! └──────────┬─────────────────────────┬────────────────┘
//!            │                         │
//! ┌──────────▼──────────┐   ┌──────────▼──────────┐   ┌──────────────┐
//! │  ResponseProvider   │   │   SpeechProvider    │   │ CallHandler  │
//! │  Claude │ OpenAI    │   │ OpenAI │ ElevenLabs │   │ (telephony)  │
//! └─────────────────────┘   └─────────────────────┘   └──────────────┘
//! ```

pub mod channels;
pub mod config;
pub mod conversation;
pub mod error;
pub mod orchestrator;
pub mod providers;
pub mod trigger;
pub mod voice;

pub use channels::{Channel, DeliveryReceipt, InboundMessage, OutgoingMessage, WhatsAppChannel};
pub use config::Config;
pub use conversation::{ConversationState, ConversationTurn, Role};
pub use error::{Error, Result};
pub use orchestrator::{CallHandler, CallRequest, Orchestrator, Outcome};
pub use providers::{ChatBackend, ResponseProvider, build_response_provider};
pub use trigger::{TriggerDetector, TriggerMatch, TriggerPolicy};
pub use voice::{AudioChunk, SpeechBackend, SpeechProvider, SpeechStream, TextToSpeech};
