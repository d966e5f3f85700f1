//! Transport reader: turns a response body into decoded text chunks

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::stream::ByteStream;

/// Incremental UTF-8 decoder.
///
/// Bytes of a multi-byte sequence that is split across chunk boundaries are
/// held back until the next call. Invalid sequences decode to U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    /// Create a new decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk, carrying any incomplete trailing sequence over
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);

        let mut out = String::with_capacity(self.pending.len());
        let mut start = 0;
        while start < self.pending.len() {
            match std::str::from_utf8(&self.pending[start..]) {
                Ok(s) => {
                    out.push_str(s);
                    start = self.pending.len();
                }
                Err(e) => {
                    let valid_end = start + e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[start..valid_end]));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            start = valid_end + len;
                        }
                        // Incomplete sequence at the end: keep it for the next chunk
                        None => {
                            start = valid_end;
                            break;
                        }
                    }
                }
            }
        }

        self.pending.drain(..start);
        out
    }

    /// Flush whatever is still buffered at end of stream
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }

    /// Number of bytes waiting for the rest of their sequence
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Reads a response body as a lazy sequence of text chunks.
///
/// `next_chunk` returns `Ok(None)` once the body is exhausted. Cancelling the
/// token makes the current or next read return [`Error::Aborted`] and drops
/// the body.
pub struct TransportReader {
    body: Option<ByteStream>,
    decoder: Utf8Decoder,
    cancel: CancellationToken,
    finished: bool,
}

impl TransportReader {
    /// Wrap a response body; fails if there is nothing to read
    pub fn new(body: Option<ByteStream>, cancel: CancellationToken) -> Result<Self> {
        let body = body.ok_or(Error::StreamUnavailable)?;
        Ok(Self {
            body: Some(body),
            decoder: Utf8Decoder::new(),
            cancel,
            finished: false,
        })
    }

    /// Read the next decoded text chunk
    pub async fn next_chunk(&mut self) -> Result<Option<String>> {
        loop {
            if self.finished {
                return Ok(None);
            }
            if self.cancel.is_cancelled() {
                return Err(self.abort());
            }

            let Some(body) = self.body.as_mut() else {
                return Ok(None);
            };

            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                item = body.next() => Some(item),
            };

            match next {
                None => return Err(self.abort()),
                Some(Some(Ok(bytes))) => {
                    let text = self.decoder.decode(&bytes);
                    // A chunk holding only part of a character yields nothing yet
                    if !text.is_empty() {
                        return Ok(Some(text));
                    }
                }
                Some(Some(Err(e))) => {
                    self.body = None;
                    self.finished = true;
                    return Err(e);
                }
                Some(None) => {
                    self.body = None;
                    self.finished = true;
                    let rest = self.decoder.finish();
                    if rest.is_empty() {
                        return Ok(None);
                    }
                    return Ok(Some(rest));
                }
            }
        }
    }

    /// Token that aborts this reader
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    fn abort(&mut self) -> Error {
        tracing::debug!("Transport read aborted");
        self.body = None;
        self.finished = true;
        Error::Aborted
    }
}
