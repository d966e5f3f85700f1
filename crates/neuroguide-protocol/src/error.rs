//! Error types for neuroguide-protocol

use thiserror::Error;

/// Result type alias using neuroguide-protocol Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the chat backend
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Backend returned a non-success status
    #[error("API error: {message} (status: {status})")]
    Api { status: u16, message: String },

    /// Response carried no readable body
    #[error("Response has no readable body")]
    StreamUnavailable,

    /// Read was aborted by the caller
    #[error("Request aborted")]
    Aborted,

    /// Byte stream failed mid-read
    #[error("Transport error: {0}")]
    Transport(String),

    /// Backend reported a failure inside the event stream
    #[error("Server error: {0}")]
    Server(String),

    /// A single event frame could not be decoded
    #[error("Malformed frame: {source}")]
    FrameParse {
        frame: String,
        #[source]
        source: serde_json::Error,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create an API error from a status code and message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Check if this error is the result of a caller abort
    pub fn is_aborted(&self) -> bool {
        matches!(self, Error::Aborted)
    }

    /// Check if this error looks transient (network blip, overloaded backend)
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Error::Transport(_) => true,
            Error::Api { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_server_statuses() {
        assert!(Error::api(429, "slow down").is_transient());
        assert!(Error::api(502, "bad gateway").is_transient());
        assert!(Error::api(503, "unavailable").is_transient());
    }

    #[test]
    fn test_not_transient_client_statuses() {
        assert!(!Error::api(400, "bad request").is_transient());
        assert!(!Error::api(404, "Conversation not found").is_transient());
    }

    #[test]
    fn test_transport_is_transient() {
        assert!(Error::Transport("connection reset".into()).is_transient());
    }

    #[test]
    fn test_not_transient_stream_errors() {
        assert!(!Error::StreamUnavailable.is_transient());
        assert!(!Error::Aborted.is_transient());
        assert!(!Error::Server("Failed to call AI service".into()).is_transient());
    }

    #[test]
    fn test_is_aborted() {
        assert!(Error::Aborted.is_aborted());
        assert!(!Error::StreamUnavailable.is_aborted());
    }

    #[test]
    fn test_frame_parse_display_mentions_source() {
        let source = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err = Error::FrameParse {
            frame: "data: {oops".into(),
            source,
        };
        assert!(err.to_string().starts_with("Malformed frame:"));
    }
}
