//! Event frame decoding for the chat event stream.
//!
//! The backend writes `data: <json>\n\n` frames, optionally preceded by
//! `event:` or `id:` lines. Text arrives in arbitrary chunks, so the decoder
//! buffers until a separator shows up and keeps any trailing partial frame for
//! the next chunk.

use async_stream::stream;

use crate::error::{Error, Result};
use crate::stream::{EventStream, ProtocolEvent};
use crate::transport::TransportReader;

/// Prefix of a payload line as the backend writes it
pub const DATA_PREFIX: &str = "data: ";

/// Field name of a payload line; the space after the colon is optional
const DATA_FIELD: &str = "data:";

/// Blank line that terminates a frame
pub const FRAME_SEPARATOR: &str = "\n\n";

/// Decode one complete frame (without its separator).
///
/// `event:`, `id:`, `retry:` and comment lines are skipped; multiple `data:`
/// lines are joined with newlines. Returns `Ok(None)` for frames that carry no
/// payload (blank frames, comments, keep-alives).
pub fn decode_frame(frame: &str) -> Result<Option<ProtocolEvent>> {
    let frame = frame.trim_start_matches(['\r', '\n']);
    if frame.trim().is_empty() {
        return Ok(None);
    }

    let mut payload: Option<String> = None;
    for line in frame.lines() {
        let Some(data) = line.strip_prefix(DATA_FIELD) else {
            continue;
        };
        let data = data.strip_prefix(' ').unwrap_or(data);
        match payload.as_mut() {
            Some(joined) => {
                joined.push('\n');
                joined.push_str(data);
            }
            None => payload = Some(data.to_string()),
        }
    }

    let Some(payload) = payload else {
        tracing::trace!("Ignoring non-data frame: {:?}", frame);
        return Ok(None);
    };

    serde_json::from_str(&payload)
        .map(Some)
        .map_err(|source| Error::FrameParse {
            frame: frame.to_string(),
            source,
        })
}

/// Accumulating frame splitter
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
    // Offset up to which the buffer is known to hold no separator
    scanned: usize,
    dropped: usize,
}

impl FrameDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every event completed by it, in order
    pub fn push(&mut self, chunk: &str) -> Vec<ProtocolEvent> {
        self.buffer.push_str(chunk);

        let mut events = Vec::new();
        while let Some(offset) = self.buffer[self.scanned..].find(FRAME_SEPARATOR) {
            let pos = self.scanned + offset;
            let frame: String = self.buffer.drain(..pos + FRAME_SEPARATOR.len()).collect();
            self.scanned = 0;
            if let Some(event) = self.accept(&frame[..pos]) {
                events.push(event);
            }
        }

        // A separator may straddle this chunk and the next
        let mut resume = self.buffer.len().saturating_sub(FRAME_SEPARATOR.len() - 1);
        while !self.buffer.is_char_boundary(resume) {
            resume -= 1;
        }
        self.scanned = resume;
        events
    }

    /// Treat whatever is left in the buffer as a final frame
    pub fn finish(&mut self) -> Option<ProtocolEvent> {
        let rest = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        if rest.trim().is_empty() {
            return None;
        }
        tracing::debug!("Stream ended with {} unterminated bytes", rest.len());
        self.accept(&rest)
    }

    /// Text waiting for its frame separator
    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    /// Number of malformed frames dropped so far
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    fn accept(&mut self, frame: &str) -> Option<ProtocolEvent> {
        match decode_frame(frame) {
            Ok(event) => event,
            Err(e) => {
                self.dropped += 1;
                tracing::warn!("Dropping frame: {}", e);
                None
            }
        }
    }
}

/// Decode a transport reader into a stream of protocol events.
///
/// Transport errors are yielded once and end the stream.
pub fn decode_events(mut reader: TransportReader) -> EventStream {
    Box::pin(stream! {
        let mut decoder = FrameDecoder::new();
        loop {
            match reader.next_chunk().await {
                Ok(Some(chunk)) => {
                    for event in decoder.push(&chunk) {
                        yield Ok(event);
                    }
                }
                Ok(None) => {
                    if let Some(event) = decoder.finish() {
                        yield Ok(event);
                    }
                    if decoder.dropped() > 0 {
                        tracing::debug!("Dropped {} malformed frame(s)", decoder.dropped());
                    }
                    break;
                }
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
    })
}
