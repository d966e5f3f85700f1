//! Caller-facing entry point for chat exchanges

use std::sync::Arc;

use neuroguide_protocol::{ChatBackend, ChatRequest, ConversationType, Message};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::conversation::{ConversationState, Reconciler, Reconciliation};
use crate::error::Result;
use crate::events::ConversationEvent;
use crate::session::{NoProgress, Progress, StreamSession, TerminalResult};

/// Starts stream sessions against a backend and settles their results
pub struct ChatOrchestrator {
    backend: Arc<dyn ChatBackend>,
    reconciler: Reconciler,
}

impl ChatOrchestrator {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            reconciler: Reconciler::new(),
        }
    }

    /// Subscribe to conversation events from `submit`
    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.reconciler.subscribe()
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Send a message list and stream the reply.
    ///
    /// `messages` already ends with the new user message. `on_progress` is
    /// called synchronously with the cumulative reply after every event.
    pub async fn send<F>(
        &self,
        messages: Vec<Message>,
        conversation_type: ConversationType,
        conversation_id: Option<String>,
        on_progress: Option<F>,
        cancel: CancellationToken,
    ) -> Result<TerminalResult>
    where
        F: FnMut(&Progress),
    {
        let request = ChatRequest::new(messages, conversation_type, conversation_id);
        self.exchange(StreamSession::new(request), on_progress, cancel).await
    }

    /// Run a full exchange against caller-owned state.
    ///
    /// Appends the user message and placeholder, mirrors progress into the
    /// placeholder, then reconciles on success or applies the fallback reply
    /// on failure.
    pub async fn submit(
        &self,
        state: &mut ConversationState,
        text: impl Into<String>,
        cancel: CancellationToken,
    ) -> Result<Reconciliation> {
        self.submit_with(state, text, None::<NoProgress>, cancel).await
    }

    /// Like [`submit`](Self::submit), also forwarding progress to `on_progress`
    /// after it has been applied to the state
    pub async fn submit_with<F>(
        &self,
        state: &mut ConversationState,
        text: impl Into<String>,
        mut on_progress: Option<F>,
        cancel: CancellationToken,
    ) -> Result<Reconciliation>
    where
        F: FnMut(&Progress),
    {
        let (outgoing, placeholder) = state.begin_exchange(text);
        let request = ChatRequest::new(outgoing, state.conversation_type, state.id.clone());
        let session = StreamSession::with_placeholder(request, placeholder);

        let settled = self
            .exchange(
                session,
                Some(|progress: &Progress| {
                    state.apply_progress(progress);
                    if let Some(callback) = on_progress.as_mut() {
                        callback(progress);
                    }
                }),
                cancel,
            )
            .await;

        match settled {
            Ok(result) => Ok(self.reconciler.reconcile(state, &result)),
            Err(e) => {
                state.apply_failure(&e);
                Err(e)
            }
        }
    }

    async fn exchange<F>(
        &self,
        session: StreamSession,
        on_progress: Option<F>,
        cancel: CancellationToken,
    ) -> Result<TerminalResult>
    where
        F: FnMut(&Progress),
    {
        let request = session.request();
        tracing::debug!(
            "Sending {} message(s) as {} (conversation {:?})",
            request.messages.len(),
            request.conversation_type,
            request.existing_conversation_id()
        );

        let settled = session
            .run(self.backend.as_ref(), on_progress, cancel)
            .await;

        match &settled {
            Ok(result) => tracing::debug!(
                "Exchange completed with {} message(s) in conversation {:?}",
                result.messages.len(),
                result.conversation_id
            ),
            Err(e) if e.is_cancelled() => tracing::debug!("Exchange cancelled"),
            Err(e) => tracing::warn!("Exchange failed: {}", e),
        }
        settled
    }
}
