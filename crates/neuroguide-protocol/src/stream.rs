//! Streaming event types

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_stream::Stream;

use crate::error::Result;
use crate::types::Message;

/// One decoded frame of the chat event stream.
///
/// Every field is optional on the wire. `full_content` is kept as an
/// `Option` because the completion frame omits it and an absent value must
/// not blank out text already shown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProtocolEvent {
    /// Latest delta; informational only
    #[serde(default)]
    pub content: String,
    /// Cumulative reply text; authoritative when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_content: Option<String>,
    /// Conversation id, empty until the backend assigns one
    #[serde(default)]
    pub conversation_id: String,
    /// Full message list; present at least on the completing frame
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Set on the final frame of a successful exchange
    #[serde(default)]
    pub completed: bool,
    /// Set when the backend aborted the exchange
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProtocolEvent {
    /// The conversation id carried by this frame, if non-empty
    pub fn conversation_id(&self) -> Option<&str> {
        if self.conversation_id.is_empty() {
            None
        } else {
            Some(&self.conversation_id)
        }
    }

    /// Check if this is a terminal event (completed or error)
    pub fn is_terminal(&self) -> bool {
        self.completed || self.error.is_some()
    }
}

/// A raw response body
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// A stream of decoded protocol events
pub type EventStream = Pin<Box<dyn Stream<Item = Result<ProtocolEvent>> + Send>>;
