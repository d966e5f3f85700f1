//! Error types for neuroguide-chat

use thiserror::Error;

/// Result type alias using neuroguide-chat Error
pub type Result<T> = std::result::Result<T, Error>;

/// Reply shown in place of the assistant placeholder when an exchange fails
pub const FALLBACK_REPLY: &str = "抱歉，发送消息失败，请稍后重试。";

/// Ways a chat exchange can settle without a result
#[derive(Error, Debug)]
pub enum Error {
    /// The backend answered without a readable body
    #[error("Response has no readable body")]
    StreamUnavailable,

    /// The stream ended before a completed frame arrived
    #[error("Stream ended before the reply completed")]
    IncompleteStream,

    /// Transport, HTTP or server-reported failure
    #[error("Stream failed: {0}")]
    StreamFailed(#[source] neuroguide_protocol::Error),

    /// The caller aborted the exchange
    #[error("Exchange cancelled")]
    Cancelled,
}

impl Error {
    /// Whether this settlement was caller-initiated (UIs should not show an error)
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Text to show in place of the placeholder, if any
    pub fn fallback_reply(&self) -> Option<&'static str> {
        if self.is_cancelled() {
            None
        } else {
            Some(FALLBACK_REPLY)
        }
    }

    /// Whether trying the same exchange again might succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Error::IncompleteStream => true,
            Error::StreamFailed(e) => e.is_transient(),
            _ => false,
        }
    }
}

impl From<neuroguide_protocol::Error> for Error {
    fn from(e: neuroguide_protocol::Error) -> Self {
        match e {
            neuroguide_protocol::Error::StreamUnavailable => Error::StreamUnavailable,
            neuroguide_protocol::Error::Aborted => Error::Cancelled,
            other => Error::StreamFailed(other),
        }
    }
}
