//! Core types shared between the chat backend and its clients

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Title used when a conversation has no user text to derive one from
pub const DEFAULT_TITLE: &str = "新会话";

/// Maximum number of characters taken from the first message for a title
const TITLE_MAX_CHARS: usize = 30;

/// Kind of conversation; selects the assistant persona on the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationType {
    /// Thinking-process analysis
    Analysis,
    /// Mapping practice quotes onto neuroscience
    Mapping,
    /// General assistant that can build tools
    #[default]
    Assistant,
}

impl ConversationType {
    /// All conversation types, in display order
    pub const ALL: [ConversationType; 3] = [
        ConversationType::Analysis,
        ConversationType::Mapping,
        ConversationType::Assistant,
    ];

    /// Wire name of this type
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationType::Analysis => "analysis",
            ConversationType::Mapping => "mapping",
            ConversationType::Assistant => "assistant",
        }
    }

    /// Prompt shown to the user when asking for input
    pub fn input_hint(&self) -> &'static str {
        match self {
            ConversationType::Analysis => "请输入您的思维过程...",
            ConversationType::Mapping => "请输入您的修行语录...",
            ConversationType::Assistant => "请输入您的工具需求...",
        }
    }
}

impl fmt::Display for ConversationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversationType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "analysis" => Ok(ConversationType::Analysis),
            "mapping" => Ok(ConversationType::Mapping),
            "assistant" => Ok(ConversationType::Assistant),
            other => Err(Error::InvalidConfig(format!(
                "unknown conversation type '{}' (expected analysis, mapping or assistant)",
                other
            ))),
        }
    }
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Identifier, unique within its conversation
    #[serde(default)]
    pub id: String,
    /// Message text
    #[serde(default)]
    pub content: String,
    /// Whether the user (rather than the assistant) wrote this message
    #[serde(default, alias = "isUser")]
    pub is_user: bool,
    /// Creation time
    #[serde(default = "Utc::now", alias = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Create a user message
    pub fn user(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            is_user: true,
            created_at: Utc::now(),
        }
    }

    /// Create an assistant message
    pub fn assistant(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            is_user: false,
            created_at: Utc::now(),
        }
    }
}

/// A conversation as stored by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Backend-assigned identifier; absent until the first exchange completes
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Owning user, when the backend reports it
    #[serde(default, alias = "userId", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Conversation kind
    #[serde(rename = "type")]
    pub conversation_type: ConversationType,
    /// Display title
    #[serde(default)]
    pub title: String,
    /// Ordered messages
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Creation time
    #[serde(default = "Utc::now", alias = "createdAt")]
    pub created_at: DateTime<Utc>,
    /// Last modification time
    #[serde(default = "Utc::now", alias = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// Derive a conversation title from its first message
pub fn default_title(messages: &[Message]) -> String {
    let title: String = messages
        .first()
        .map(|m| m.content.trim().chars().take(TITLE_MAX_CHARS).collect())
        .unwrap_or_default();
    if title.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        title
    }
}

/// Body of a chat-send request
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Conversation so far, ending with the new user message
    pub messages: Vec<Message>,
    /// Conversation kind
    pub conversation_type: ConversationType,
    /// Existing conversation id, empty for a new conversation
    pub conversation_id: String,
}

impl ChatRequest {
    /// Create a request; `None` asks the backend to create a conversation
    pub fn new(
        messages: Vec<Message>,
        conversation_type: ConversationType,
        conversation_id: Option<String>,
    ) -> Self {
        Self {
            messages,
            conversation_type,
            conversation_id: conversation_id.unwrap_or_default(),
        }
    }

    /// The existing conversation id, if this request continues one
    pub fn existing_conversation_id(&self) -> Option<&str> {
        if self.conversation_id.is_empty() {
            None
        } else {
            Some(&self.conversation_id)
        }
    }
}
