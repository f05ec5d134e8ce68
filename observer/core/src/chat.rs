//! Chat Log
//!
//! Append-only record of the conversation. Each message is categorized once,
//! at insertion, from its sender and sender id.
//!
//! Messages sent by `System` are stored (so they survive in the log and can be
//! replayed) but never drawn.

use serde::{Deserialize, Serialize};

use crate::agent::AgentId;

/// Reserved sender for upstream failures
pub const ERROR_SENDER: &str = "Error";

/// Reserved sender for bookkeeping notes
pub const SYSTEM_SENDER: &str = "System";

/// Visual category of a chat line
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageCategory {
    /// Spoken by agent 0
    AgentLeft,
    /// Spoken by agent 1
    AgentRight,
    /// Upstream failure
    Error,
    /// Anything else
    System,
}

impl MessageCategory {
    /// Categorize a message from its sender fields
    #[must_use]
    pub fn classify(sender: &str, sender_id: Option<AgentId>) -> Self {
        if sender == ERROR_SENDER {
            return Self::Error;
        }
        match sender_id {
            Some(AgentId(0)) => Self::AgentLeft,
            Some(AgentId(1)) => Self::AgentRight,
            _ => Self::System,
        }
    }

    /// CSS-style class name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AgentLeft => "agent-left",
            Self::AgentRight => "agent-right",
            Self::Error => "error",
            Self::System => "system",
        }
    }
}

/// Optional presentation extras carried by a message
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageExtra {
    /// Emotion tag shown instead of the content
    #[serde(default)]
    pub emotion: Option<String>,
    /// The literal speech, kept as hover detail
    #[serde(default, alias = "originalSpeech")]
    pub original_speech: Option<String>,
}

impl MessageExtra {
    /// Emotion to show, if it is not empty
    #[must_use]
    pub fn emotion_tag(&self) -> Option<&str> {
        self.emotion.as_deref().filter(|e| !e.is_empty())
    }
}

/// A stored chat message
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    /// Display name or reserved token
    pub sender: String,
    /// Agent that spoke, if any
    pub sender_id: Option<AgentId>,
    /// Literal content
    pub content: String,
    /// Presentation extras
    pub extra: MessageExtra,
    /// Category fixed at insertion
    pub category: MessageCategory,
}

impl ChatMessage {
    /// Whether surfaces should draw this message
    #[must_use]
    pub fn is_rendered(&self) -> bool {
        self.sender != SYSTEM_SENDER
    }

    /// The line a surface draws for this message
    #[must_use]
    pub fn line(&self) -> ChatLine {
        let body = match self.extra.emotion_tag() {
            Some(emotion) => format!("[{emotion}]"),
            None => self.content.clone(),
        };
        ChatLine {
            category: self.category,
            sender: self.sender.clone(),
            body,
            hover: self.extra.original_speech.clone(),
        }
    }
}

/// Render instruction payload for one chat line
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatLine {
    /// Visual category
    pub category: MessageCategory,
    /// Sender label
    pub sender: String,
    /// Primary text (content or bracketed emotion)
    pub body: String,
    /// Supplementary detail
    pub hover: Option<String>,
}

/// The ordered message log
#[derive(Clone, Debug, Default)]
pub struct ChatLog {
    messages: Vec<ChatMessage>,
}

impl ChatLog {
    /// Create an empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message, returning the stored entry
    pub fn append(
        &mut self,
        sender: impl Into<String>,
        content: impl Into<String>,
        sender_id: Option<AgentId>,
        extra: MessageExtra,
    ) -> &ChatMessage {
        let sender = sender.into();
        let category = MessageCategory::classify(&sender, sender_id);
        self.messages.push(ChatMessage {
            sender,
            sender_id,
            content: content.into(),
            extra,
            category,
        });
        &self.messages[self.messages.len() - 1]
    }

    /// Empty the log (restoration only)
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// All stored messages
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Stored message count, hidden ones included
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the log is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
