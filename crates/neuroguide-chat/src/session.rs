//! Stream session: drives one chat exchange from request to terminal result

use futures::StreamExt;
use neuroguide_protocol::{
    ChatBackend, ChatRequest, Error as ProtocolError, EventStream, Message, ProtocolEvent,
    TransportReader, decode_events,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Authoritative outcome of a completed exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalResult {
    /// Conversation id adopted during the exchange
    pub conversation_id: Option<String>,
    /// Server-confirmed message list
    pub messages: Vec<Message>,
}

/// Snapshot handed to progress callbacks after each event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Progress {
    /// Cumulative reply text
    pub content: String,
    /// Conversation id, once known
    pub conversation_id: Option<String>,
}

/// Callback type for callers that do not want progress
pub type NoProgress = fn(&Progress);

/// A later frame disagreed with the adopted conversation id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationIdConflict {
    pub adopted: String,
    pub received: String,
}

/// State of one exchange.
///
/// Owns the in-flight assistant placeholder and the session-scoped
/// conversation id. Never reused across exchanges.
#[derive(Debug)]
pub struct StreamSession {
    request: ChatRequest,
    pending: Message,
    conversation_id: Option<String>,
    terminal: Option<TerminalResult>,
    conflicts: Vec<ConversationIdConflict>,
}

impl StreamSession {
    /// Start a session for a request with a freshly generated placeholder
    pub fn new(request: ChatRequest) -> Self {
        let placeholder = Message::assistant(format!("ai-{}", uuid::Uuid::new_v4()), "");
        Self::with_placeholder(request, placeholder)
    }

    /// Start a session that fills in a caller-created placeholder
    pub fn with_placeholder(request: ChatRequest, placeholder: Message) -> Self {
        let conversation_id = request.existing_conversation_id().map(str::to_string);
        Self {
            request,
            pending: placeholder,
            conversation_id,
            terminal: None,
            conflicts: Vec::new(),
        }
    }

    /// The request this session sends
    pub fn request(&self) -> &ChatRequest {
        &self.request
    }

    /// The in-flight assistant message
    pub fn pending(&self) -> &Message {
        &self.pending
    }

    /// Conversation id adopted so far
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    /// Terminal result, once a completed frame has arrived
    pub fn terminal(&self) -> Option<&TerminalResult> {
        self.terminal.as_ref()
    }

    /// Conversation id conflicts observed so far
    pub fn conflicts(&self) -> &[ConversationIdConflict] {
        &self.conflicts
    }

    /// Current progress snapshot
    pub fn progress(&self) -> Progress {
        Progress {
            content: self.pending.content.clone(),
            conversation_id: self.conversation_id.clone(),
        }
    }

    /// Message list as the caller should display it right now.
    ///
    /// Outgoing messages followed by the placeholder, or the server's list
    /// once the exchange has completed.
    pub fn messages(&self) -> Vec<Message> {
        match &self.terminal {
            Some(result) => result.messages.clone(),
            None => self.local_messages(),
        }
    }

    /// Fold one event into the session.
    ///
    /// Fails only for a server-reported error frame; the session is left
    /// unchanged in that case.
    pub fn apply(&mut self, event: ProtocolEvent) -> Result<()> {
        let ProtocolEvent {
            full_content,
            conversation_id,
            messages,
            completed,
            error,
            ..
        } = event;

        if let Some(message) = error {
            return Err(Error::StreamFailed(ProtocolError::Server(message)));
        }

        // Cumulative replace; the server sends the running total
        if let Some(full_content) = full_content {
            self.pending.content = full_content;
        }

        if !conversation_id.is_empty() {
            self.adopt(conversation_id);
        }

        if completed {
            let messages = if messages.is_empty() {
                tracing::debug!("Completed frame carried no messages, using local list");
                self.local_messages()
            } else {
                messages
            };
            if self.terminal.is_some() {
                tracing::debug!("Replacing earlier terminal result");
            }
            self.terminal = Some(TerminalResult {
                conversation_id: self.conversation_id.clone(),
                messages,
            });
        }

        Ok(())
    }

    /// Settle the session after end of stream
    pub fn finish(self) -> Result<TerminalResult> {
        if !self.conflicts.is_empty() {
            tracing::warn!(
                "Exchange saw {} conversation id conflict(s); kept {:?}",
                self.conflicts.len(),
                self.conversation_id
            );
        }
        self.terminal.ok_or(Error::IncompleteStream)
    }

    /// Issue the session's request and consume the response to completion
    pub async fn run<F>(
        self,
        backend: &dyn ChatBackend,
        on_progress: Option<F>,
        cancel: CancellationToken,
    ) -> Result<TerminalResult>
    where
        F: FnMut(&Progress),
    {
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            opened = backend.open(&self.request) => opened,
        };

        let reader = TransportReader::new(opened?, cancel.clone())?;
        self.consume(decode_events(reader), on_progress, cancel).await
    }

    /// Consume decoded events until the stream ends, fails or is cancelled
    pub async fn consume<F>(
        mut self,
        mut events: EventStream,
        mut on_progress: Option<F>,
        cancel: CancellationToken,
    ) -> Result<TerminalResult>
    where
        F: FnMut(&Progress),
    {
        while let Some(item) = events.next().await {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            match item {
                Ok(event) => match self.apply(event) {
                    Ok(()) => {
                        if let Some(callback) = on_progress.as_mut() {
                            callback(&self.progress());
                        }
                    }
                    Err(e) if self.terminal.is_some() => {
                        tracing::warn!("Ignoring error after completion: {}", e);
                    }
                    Err(e) => return Err(e),
                },
                Err(ProtocolError::Aborted) => return Err(Error::Cancelled),
                Err(e) if self.terminal.is_some() => {
                    tracing::warn!("Ignoring transport error after completion: {}", e);
                    break;
                }
                Err(e) => return Err(Error::StreamFailed(e)),
            }
        }

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.finish()
    }

    fn local_messages(&self) -> Vec<Message> {
        let mut messages = self.request.messages.clone();
        messages.push(self.pending.clone());
        messages
    }

    fn adopt(&mut self, received: String) {
        match &self.conversation_id {
            None => {
                tracing::debug!("Adopted conversation id {}", received);
                self.conversation_id = Some(received);
            }
            Some(adopted) if *adopted == received => {}
            Some(adopted) => {
                tracing::warn!(
                    "Conversation id conflict: kept {}, ignoring {}",
                    adopted,
                    received
                );
                self.conflicts.push(ConversationIdConflict {
                    adopted: adopted.clone(),
                    received,
                });
            }
        }
    }
}
