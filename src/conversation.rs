//! Bounded conversation history
//!
//! The history is a sliding window: appending past the limit evicts the
//! oldest turns instead of rejecting the new one.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Default number of turns kept per conversation
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Author of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human on the other end of the channel
    User,
    /// The automated responder
    Assistant,
}

impl Role {
    /// Wire name of the role
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationTurn {
    role: Role,
    content: String,
}

impl ConversationTurn {
    /// Create a turn authored by the user
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create a turn authored by the assistant
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Ordered conversation history, oldest turn first
#[derive(Debug, Clone)]
pub struct ConversationState {
    turns: VecDeque<ConversationTurn>,
    limit: usize,
}

impl ConversationState {
    /// Create an empty history holding at most `limit` turns
    ///
    /// A limit of zero is raised to one so the latest turn is always kept.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            turns: VecDeque::with_capacity(limit),
            limit,
        }
    }

    /// Append a turn, evicting the oldest turns past the limit
    pub fn push(&mut self, turn: ConversationTurn) {
        self.turns.push_back(turn);
        while self.turns.len() > self.limit {
            self.turns.pop_front();
        }
        self.turns.make_contiguous();
    }

    /// Contiguous view of the turns, oldest first
    #[must_use]
    pub fn turns(&self) -> &[ConversationTurn] {
        let (front, back) = self.turns.as_slices();
        debug_assert!(back.is_empty());
        front
    }

    /// Iterate turns oldest first
    pub fn iter(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter()
    }

    /// Most recent turn
    #[must_use]
    pub fn last(&self) -> Option<&ConversationTurn> {
        self.turns.back()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Drop all turns
    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}
