//! Scripted chat backend for unit tests

use async_trait::async_trait;
use bytes::Bytes;
use neuroguide_protocol::{
    ByteStream, ChatBackend, ChatRequest, Error as ProtocolError, Result as ProtocolResult,
};
use parking_lot::Mutex;

/// One step of a scripted response body
#[derive(Debug, Clone)]
pub(crate) enum Step {
    /// Deliver these bytes as one chunk
    Bytes(Vec<u8>),
    /// Fail the read with a transport error
    Fail(String),
    /// Never produce another chunk
    Hang,
}

/// Build a `data: <json>\n\n` frame
pub(crate) fn frame(json: serde_json::Value) -> Step {
    Step::Bytes(format!("data: {}\n\n", json).into_bytes())
}

pub(crate) fn progress_frame(full_content: &str, conversation_id: &str) -> Step {
    frame(serde_json::json!({
        "content": full_content.chars().last().map(String::from).unwrap_or_default(),
        "full_content": full_content,
        "conversation_id": conversation_id,
        "messages": [],
    }))
}

pub(crate) fn completed_frame(conversation_id: &str, messages: serde_json::Value) -> Step {
    frame(serde_json::json!({
        "content": "",
        "conversation_id": conversation_id,
        "messages": messages,
        "completed": true,
    }))
}

pub(crate) const USER_TEXT: &str = "我最近总是感到焦虑";
pub(crate) const REPLY_TEXT: &str = "焦虑是一种常见的情绪反应";

/// The two messages the backend confirms at the end of the anxiety exchange
pub(crate) fn confirmed_messages() -> serde_json::Value {
    serde_json::json!([
        {"id": "m1", "content": USER_TEXT, "is_user": true, "created_at": "2024-01-18T10:00:00Z"},
        {"id": "m2", "content": REPLY_TEXT, "is_user": false, "created_at": "2024-01-18T10:01:00Z"},
    ])
}

/// Progress frames for "焦", "焦虑", "焦虑是"
pub(crate) fn anxiety_progress(conversation_id: &str) -> Vec<Step> {
    ["焦", "焦虑", "焦虑是"]
        .into_iter()
        .map(|text| progress_frame(text, conversation_id))
        .collect()
}

/// Concatenate the byte steps into one response body
pub(crate) fn wire_body(steps: &[Step]) -> Vec<u8> {
    steps
        .iter()
        .filter_map(|step| match step {
            Step::Bytes(bytes) => Some(bytes.as_slice()),
            _ => None,
        })
        .flatten()
        .copied()
        .collect()
}

/// How the backend answers `open`
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Body(Vec<Step>),
    NoBody,
    Status(u16, String),
}

/// A backend that replays the same scripted reply for every exchange
pub(crate) struct ScriptedBackend {
    reply: Reply,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedBackend {
    pub(crate) fn new(steps: Vec<Step>) -> Self {
        Self::with_reply(Reply::Body(steps))
    }

    pub(crate) fn with_reply(reply: Reply) -> Self {
        Self {
            reply,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn open(&self, request: &ChatRequest) -> ProtocolResult<Option<ByteStream>> {
        self.requests.lock().push(request.clone());

        let steps = match &self.reply {
            Reply::Body(steps) => steps.clone(),
            Reply::NoBody => return Ok(None),
            Reply::Status(status, message) => {
                return Err(ProtocolError::api(*status, message.clone()));
            }
        };

        let body: ByteStream = Box::pin(async_stream::stream! {
            for step in steps {
                match step {
                    Step::Bytes(bytes) => yield Ok(Bytes::from(bytes)),
                    Step::Fail(message) => {
                        yield Err(ProtocolError::Transport(message));
                        return;
                    }
                    Step::Hang => futures::future::pending::<()>().await,
                }
            }
        });
        Ok(Some(body))
    }
}
