//! Caller-owned conversation state and reconciliation of exchange results

use chrono::{DateTime, Utc};
use neuroguide_protocol::{Conversation, ConversationType, DEFAULT_TITLE, Message, default_title};
use tokio::sync::broadcast;

use crate::error::{Error, FALLBACK_REPLY};
use crate::events::ConversationEvent;
use crate::session::{Progress, TerminalResult};

/// A conversation as the UI sees it
#[derive(Debug, Clone)]
pub struct ConversationState {
    /// Backend-assigned identifier, once known
    pub id: Option<String>,
    pub conversation_type: ConversationType,
    pub title: String,
    /// Ordered messages, ending with the placeholder while an exchange runs
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pending_id: Option<String>,
    // Cleared once IdentityAssigned has been emitted for this conversation
    unannounced: bool,
}

impl ConversationState {
    /// Start a new, unsaved conversation
    pub fn new(conversation_type: ConversationType) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            conversation_type,
            title: DEFAULT_TITLE.to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
            pending_id: None,
            unannounced: true,
        }
    }

    /// Resume a conversation loaded from the backend
    pub fn from_conversation(conversation: Conversation) -> Self {
        let unannounced = conversation.id.is_none();
        Self {
            id: conversation.id,
            conversation_type: conversation.conversation_type,
            title: conversation.title,
            messages: conversation.messages,
            created_at: conversation.created_at,
            updated_at: conversation.updated_at,
            pending_id: None,
            unannounced,
        }
    }

    /// Whether an exchange is in flight
    pub fn is_pending(&self) -> bool {
        self.pending_id.is_some()
    }

    /// The in-flight assistant placeholder
    pub fn placeholder(&self) -> Option<&Message> {
        let id = self.pending_id.as_deref()?;
        self.messages.iter().rev().find(|m| m.id == id)
    }

    fn placeholder_mut(&mut self) -> Option<&mut Message> {
        let id = self.pending_id.as_deref()?;
        self.messages.iter_mut().rev().find(|m| m.id == id)
    }

    /// Append the user's message and an empty assistant placeholder.
    ///
    /// Returns the outgoing message list (without the placeholder) and the
    /// placeholder itself.
    pub fn begin_exchange(&mut self, text: impl Into<String>) -> (Vec<Message>, Message) {
        if self.is_pending() {
            tracing::warn!("Starting an exchange while another is pending");
            self.discard_placeholder();
        }

        let user = Message::user(format!("user-{}", uuid::Uuid::new_v4()), text);
        let placeholder = Message::assistant(format!("ai-{}", uuid::Uuid::new_v4()), "");

        self.messages.push(user);
        let outgoing = self.messages.clone();
        self.messages.push(placeholder.clone());
        self.pending_id = Some(placeholder.id.clone());

        (outgoing, placeholder)
    }

    /// Mirror streamed progress into the placeholder
    pub fn apply_progress(&mut self, progress: &Progress) {
        if let Some(message) = self.placeholder_mut() {
            message.content.clone_from(&progress.content);
        }
        if self.id.is_none() {
            if let Some(id) = &progress.conversation_id {
                self.id = Some(id.clone());
            }
        }
    }

    /// Settle the placeholder after a failed exchange.
    ///
    /// Cancellation keeps whatever partial text arrived; an empty placeholder
    /// is dropped. Every other failure shows the fallback reply.
    pub fn apply_failure(&mut self, error: &Error) {
        match error.fallback_reply() {
            Some(reply) => {
                if let Some(message) = self.placeholder_mut() {
                    message.content = reply.to_string();
                }
            }
            None => {
                if self.placeholder().is_some_and(|m| m.content.is_empty()) {
                    self.discard_placeholder();
                }
            }
        }
        self.pending_id = None;
    }

    /// Remove the placeholder without a reply
    pub fn discard_placeholder(&mut self) {
        if let Some(id) = self.pending_id.take() {
            self.messages.retain(|m| m.id != id);
        }
    }

    /// Whether the last message is the fallback reply
    pub fn last_reply_failed(&self) -> bool {
        self.messages
            .last()
            .is_some_and(|m| !m.is_user && m.content == FALLBACK_REPLY)
    }
}

/// What a reconciliation changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub identity_assigned: bool,
    pub messages_replaced: bool,
}

impl Reconciliation {
    pub fn changed(&self) -> bool {
        self.identity_assigned || self.messages_replaced
    }
}

/// Folds terminal results into caller-owned conversation state
pub struct Reconciler {
    event_tx: broadcast::Sender<ConversationEvent>,
}

impl Reconciler {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self { event_tx }
    }

    /// Subscribe to conversation events
    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.event_tx.subscribe()
    }

    /// Apply a terminal result. Idempotent.
    pub fn reconcile(&self, state: &mut ConversationState, result: &TerminalResult) -> Reconciliation {
        let mut outcome = Reconciliation::default();

        match (&state.id, &result.conversation_id) {
            (None, Some(id)) => state.id = Some(id.clone()),
            (Some(current), Some(id)) if current != id => {
                tracing::warn!("Ignoring conversation id {} for conversation {}", id, current);
            }
            _ => {}
        }

        if state.unannounced {
            if let Some(id) = &state.id {
                outcome.identity_assigned = true;
                state.unannounced = false;
                let _ = self.event_tx.send(ConversationEvent::IdentityAssigned {
                    conversation_id: id.clone(),
                    conversation_type: state.conversation_type,
                });
            }
        }

        state.pending_id = None;
        if state.messages != result.messages {
            state.messages = result.messages.clone();
            outcome.messages_replaced = true;
        }

        if outcome.changed() {
            if state.title == DEFAULT_TITLE {
                state.title = default_title(&state.messages);
            }
            state.updated_at = Utc::now();
            tracing::debug!(
                "Reconciled conversation {:?}: {} messages",
                state.id,
                state.messages.len()
            );
            let _ = self.event_tx.send(ConversationEvent::HistoryInvalidated {
                conversation_id: state.id.clone(),
                conversation_type: state.conversation_type,
            });
        }

        outcome
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}
