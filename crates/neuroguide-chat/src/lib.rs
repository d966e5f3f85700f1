//! neuroguide-chat: runtime for streamed chat exchanges
//!
//! A [`StreamSession`] drives one exchange over the event stream, the
//! [`Reconciler`] folds its result into caller-owned [`ConversationState`],
//! and [`ChatOrchestrator`] ties the two together behind `send` and `submit`.

pub mod conversation;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod session;

#[cfg(test)]
mod testing;

pub use conversation::{ConversationState, Reconciler, Reconciliation};
pub use error::{Error, FALLBACK_REPLY, Result};
pub use events::ConversationEvent;
pub use orchestrator::ChatOrchestrator;
pub use session::{ConversationIdConflict, NoProgress, Progress, StreamSession, TerminalResult};
