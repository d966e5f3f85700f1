//! Conversation event types

use neuroguide_protocol::ConversationType;
use serde::{Deserialize, Serialize};

/// Events emitted when caller-owned conversation state changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationEvent {
    /// A new conversation received its backend id
    IdentityAssigned {
        conversation_id: String,
        conversation_type: ConversationType,
    },

    /// Cached conversation summaries (title, timestamps, counts) are stale
    HistoryInvalidated {
        conversation_id: Option<String>,
        conversation_type: ConversationType,
    },
}
