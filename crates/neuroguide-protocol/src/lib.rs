//! neuroguide-protocol: wire layer for the neuroguide chat service
//!
//! This crate provides the message and conversation types, the incremental
//! reader and frame decoder for the chat event stream, and HTTP clients for the
//! streaming chat endpoint and the conversation history endpoints.

pub mod backend;
pub mod error;
pub mod frame;
pub mod history;
pub mod stream;
pub mod transport;
pub mod types;

pub use backend::{ChatBackend, HttpBackend};
pub use error::{Error, Result};
pub use frame::{FrameDecoder, decode_events};
pub use history::HistoryClient;
pub use stream::{ByteStream, EventStream, ProtocolEvent};
pub use transport::{TransportReader, Utf8Decoder};
pub use types::*;
