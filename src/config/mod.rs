//! Configuration management for Parley gateway

pub mod file;

use std::path::Path;

use crate::orchestrator::{DEFAULT_ACKNOWLEDGMENT, DEFAULT_APOLOGY, DEFAULT_SYSTEM_PROMPT};
use crate::providers::ChatBackend;
use crate::trigger::{DEFAULT_CALL_CONTEXT, DEFAULT_TRIGGERS, TriggerPolicy};
use crate::voice::SpeechBackend;
use crate::{Result, conversation::DEFAULT_HISTORY_LIMIT};

use self::file::ParleyConfigFile;

/// Parley gateway configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Chat backend
    pub chat: ChatConfig,

    /// Speech synthesis backend
    pub speech: SpeechConfig,

    /// Messaging channel
    pub channel: ChannelConfig,

    /// Conversation behavior
    pub conversation: ConversationConfig,
}

/// Chat backend configuration
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Backend variant
    pub provider: ChatBackend,

    /// API key; validated when the provider is built
    pub api_key: Option<String>,

    /// Model override (provider default if unset)
    pub model: Option<String>,

    /// Max tokens per reply
    pub max_tokens: u32,

    /// API base URL override
    pub base_url: Option<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            provider: ChatBackend::default(),
            api_key: None,
            model: None,
            max_tokens: 300,
            base_url: None,
        }
    }
}

/// Speech synthesis configuration
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// Backend variant
    pub provider: SpeechBackend,

    /// API key; validated when the provider is built
    pub api_key: Option<String>,

    /// Voice override (provider default if unset)
    pub voice: Option<String>,

    /// Model override (provider default if unset)
    pub model: Option<String>,

    /// Speed multiplier (0.25 to 4.0)
    pub speed: f32,

    /// API base URL override
    pub base_url: Option<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            provider: SpeechBackend::default(),
            api_key: None,
            voice: None,
            model: None,
            speed: 1.0,
            base_url: None,
        }
    }
}

/// Messaging channel configuration (Twilio `WhatsApp`)
#[derive(Debug, Clone, Default)]
pub struct ChannelConfig {
    /// Twilio account SID
    pub account_id: String,

    /// Twilio auth token
    pub auth_token: String,

    /// Address replies are sent from, without scheme prefix
    pub sender_address: String,

    /// Address of the human in the conversation, without scheme prefix
    pub recipient_address: String,

    /// API base URL override
    pub base_url: Option<String>,
}

/// Conversation behavior configuration
#[derive(Debug, Clone)]
pub struct ConversationConfig {
    /// Max turns kept in history
    pub history_limit: usize,

    /// System prompt sent with every chat request
    pub system_prompt: String,

    /// Call trigger phrases, highest priority first
    pub triggers: Vec<String>,

    /// Selection rule when several triggers are present
    pub trigger_policy: TriggerPolicy,

    /// Context used when nothing follows a trigger phrase
    pub default_call_context: String,

    /// Reply sent before a requested call is placed
    pub acknowledgment: String,

    /// Reply sent when the chat backend fails
    pub apology: String,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            triggers: DEFAULT_TRIGGERS.iter().map(ToString::to_string).collect(),
            trigger_policy: TriggerPolicy::default(),
            default_call_context: DEFAULT_CALL_CONTEXT.to_string(),
            acknowledgment: DEFAULT_ACKNOWLEDGMENT.to_string(),
            apology: DEFAULT_APOLOGY.to_string(),
        }
    }
}

impl Config {
    /// Load configuration (env > toml > default)
    ///
    /// With an explicit `path` the file must exist and parse; otherwise the
    /// standard path is tried and silently skipped when absent.
    ///
    /// # Errors
    ///
    /// Returns error if an explicit config file cannot be read or parsed,
    /// or an environment override is invalid
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let fc = match path {
            Some(path) => file::read_config_file(path)?,
            None => file::load_config_file(),
        };

        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Merge a parsed config file with an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if an environment override names an unknown provider
    pub fn from_sources<F>(fc: ParleyConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let chat_provider = match env("PARLEY_CHAT_PROVIDER") {
            Some(name) => name.parse()?,
            None => fc.chat.provider.unwrap_or_default(),
        };
        let chat_key_var = match chat_provider {
            ChatBackend::Claude => "ANTHROPIC_API_KEY",
            ChatBackend::OpenAi => "OPENAI_API_KEY",
        };
        let chat = ChatConfig {
            provider: chat_provider,
            api_key: env(chat_key_var).or(fc.chat.api_key),
            model: env("PARLEY_CHAT_MODEL").or(fc.chat.model),
            max_tokens: fc.chat.max_tokens.unwrap_or(300),
            base_url: fc.chat.base_url,
        };

        let speech_provider = match env("PARLEY_SPEECH_PROVIDER") {
            Some(name) => name.parse()?,
            None => fc.speech.provider.unwrap_or_default(),
        };
        let speech_key_var = match speech_provider {
            SpeechBackend::OpenAi => "OPENAI_API_KEY",
            SpeechBackend::ElevenLabs => "ELEVENLABS_API_KEY",
        };
        let speech = SpeechConfig {
            provider: speech_provider,
            api_key: env(speech_key_var).or(fc.speech.api_key),
            voice: env("PARLEY_TTS_VOICE").or(fc.speech.voice),
            model: env("PARLEY_TTS_MODEL").or(fc.speech.model),
            speed: fc.speech.speed.unwrap_or(1.0),
            base_url: fc.speech.base_url,
        };

        let channel = ChannelConfig {
            account_id: env("TWILIO_ACCOUNT_SID")
                .or(fc.channel.account_id)
                .unwrap_or_default(),
            auth_token: env("TWILIO_AUTH_TOKEN")
                .or(fc.channel.auth_token)
                .unwrap_or_default(),
            sender_address: env("TWILIO_WHATSAPP_NUMBER")
                .or(fc.channel.sender_address)
                .unwrap_or_default(),
            recipient_address: env("USER_WHATSAPP_NUMBER")
                .or(fc.channel.recipient_address)
                .unwrap_or_default(),
            base_url: fc.channel.base_url,
        };

        let defaults = ConversationConfig::default();
        let conv = fc.conversation;
        let conversation = ConversationConfig {
            history_limit: conv.history_limit.unwrap_or(defaults.history_limit),
            system_prompt: conv.system_prompt.unwrap_or(defaults.system_prompt),
            triggers: conv.triggers.unwrap_or(defaults.triggers),
            trigger_policy: conv.trigger_policy.unwrap_or(defaults.trigger_policy),
            default_call_context: conv
                .default_call_context
                .unwrap_or(defaults.default_call_context),
            acknowledgment: conv.acknowledgment.unwrap_or(defaults.acknowledgment),
            apology: conv.apology.unwrap_or(defaults.apology),
        };

        Ok(Self {
            chat,
            speech,
            channel,
            conversation,
        })
    }
}
