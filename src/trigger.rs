//! Call trigger detection
//!
//! Scans inbound text for phrases asking for a phone call and extracts the
//! text that follows the phrase as the call's context.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Trigger phrases recognized out of the box, highest priority first
pub const DEFAULT_TRIGGERS: &[&str] = &["call me", "call now", "phone me", "give me a call", "ring me"];

/// Context used when nothing follows the trigger phrase
pub const DEFAULT_CALL_CONTEXT: &str = "User requested a call via WhatsApp";

/// How to choose between several trigger phrases present in one message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerPolicy {
    /// First phrase in list order that occurs anywhere in the text
    #[default]
    Priority,
    /// Phrase whose occurrence starts earliest in the text
    Earliest,
}

/// A detected call request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerMatch {
    /// Normalized trigger phrase that matched
    pub phrase: String,
    /// Text following the phrase, or the default context
    pub context: String,
}

struct Trigger {
    phrase: String,
    pattern: Regex,
}

/// Detects call-request phrases in message text
pub struct TriggerDetector {
    triggers: Vec<Trigger>,
    policy: TriggerPolicy,
    default_context: String,
}

impl TriggerDetector {
    /// Create a detector for the given phrases, in priority order
    ///
    /// Phrases are trimmed and lowercased; blank phrases are dropped.
    ///
    /// # Errors
    ///
    /// Returns error if a phrase cannot be compiled into a matcher
    pub fn new<I, S>(phrases: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut triggers = Vec::new();
        for phrase in phrases {
            let phrase = phrase.as_ref().trim().to_lowercase();
            if phrase.is_empty() {
                continue;
            }
            let pattern = Regex::new(&format!("(?i){}", regex::escape(&phrase)))
                .map_err(|e| Error::Config(format!("invalid trigger phrase {phrase:?}: {e}")))?;
            triggers.push(Trigger { phrase, pattern });
        }

        tracing::debug!(
            triggers = ?triggers.iter().map(|t| t.phrase.as_str()).collect::<Vec<_>>(),
            "trigger detector initialized"
        );

        Ok(Self {
            triggers,
            policy: TriggerPolicy::default(),
            default_context: DEFAULT_CALL_CONTEXT.to_string(),
        })
    }

    /// Set the selection policy when several phrases are present
    #[must_use]
    pub const fn with_policy(mut self, policy: TriggerPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the context used when nothing follows the phrase
    #[must_use]
    pub fn with_default_context(mut self, context: impl Into<String>) -> Self {
        self.default_context = context.into();
        self
    }

    /// Check text for a trigger phrase
    ///
    /// Returns `None` when no configured phrase occurs in the text.
    #[must_use]
    pub fn detect(&self, text: &str) -> Option<TriggerMatch> {
        let (trigger, found) = match self.policy {
            TriggerPolicy::Priority => self
                .triggers
                .iter()
                .find_map(|t| t.pattern.find(text).map(|m| (t, m)))?,
            TriggerPolicy::Earliest => self
                .triggers
                .iter()
                .filter_map(|t| t.pattern.find(text).map(|m| (t, m)))
                .min_by_key(|(_, m)| m.start())?,
        };

        let remainder = text[found.end()..].trim();
        let context = if remainder.is_empty() {
            self.default_context.clone()
        } else {
            remainder.to_string()
        };

        tracing::info!(trigger = %trigger.phrase, context = %context, "call trigger detected");

        Some(TriggerMatch {
            phrase: trigger.phrase.clone(),
            context,
        })
    }

    /// Configured phrases in priority order
    pub fn phrases(&self) -> impl Iterator<Item = &str> {
        self.triggers.iter().map(|t| t.phrase.as_str())
    }

    #[must_use]
    pub const fn policy(&self) -> TriggerPolicy {
        self.policy
    }
}

impl Default for TriggerDetector {
    fn default() -> Self {
        Self::new(DEFAULT_TRIGGERS.iter().copied()).expect("valid built-in triggers")
    }
}
