//! Wire framing for streamed responses
//!
//! `FrameReader` turns a chunked byte stream into frames:
//! - SSE: `event:` / `data:` fields, blank-line separated, `[DONE]` sentinel
//! - NDJSON: one JSON document per line
//!
//! Every read races the turn's abort handle, so a stalled connection never
//! outlives a stop request.

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use std::pin::Pin;

use super::error::{CompletionError, CompletionResult};
use super::sequencer::aborted_error;
use crate::types::AbortHandle;

/// Raw body chunks
pub type ByteStream = Pin<Box<dyn Stream<Item = CompletionResult<Bytes>> + Send>>;

/// Framing used by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    Sse,
    Ndjson,
}

/// One decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// SSE event name, if the server sent one
    pub event: Option<String>,
    /// Frame payload (multi-line SSE data joined with `\n`)
    pub data: String,
}

/// Reads frames off a streamed response body
pub struct FrameReader {
    stream: ByteStream,
    framing: Framing,
    buf: BytesMut,
    event: Option<String>,
    data: Vec<String>,
    eof: bool,
    finished: bool,
}

impl FrameReader {
    pub fn new(stream: ByteStream, framing: Framing) -> Self {
        Self {
            stream,
            framing,
            buf: BytesMut::new(),
            event: None,
            data: Vec::new(),
            eof: false,
            finished: false,
        }
    }

    /// Wrap a reqwest response body
    pub fn from_response(response: reqwest::Response, framing: Framing) -> Self {
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(CompletionError::from));
        Self::new(Box::pin(stream), framing)
    }

    /// Next frame, `None` at end of stream or after `[DONE]`
    ///
    /// Returns `Aborted` as soon as the abort handle fires.
    pub async fn next_frame(&mut self, abort: &AbortHandle) -> CompletionResult<Option<Frame>> {
        loop {
            if abort.is_aborted() {
                return Err(aborted_error(abort));
            }
            if self.finished {
                return Ok(None);
            }
            if let Some(frame) = self.take_buffered() {
                if self.framing == Framing::Sse && frame.data.trim() == "[DONE]" {
                    self.finish();
                    return Ok(None);
                }
                return Ok(Some(frame));
            }
            if self.eof {
                self.finished = true;
                return Ok(None);
            }

            tokio::select! {
                biased;
                _ = abort.aborted() => {
                    self.finish();
                    return Err(aborted_error(abort));
                }
                chunk = self.stream.next() => match chunk {
                    Some(Ok(bytes)) => self.buf.extend_from_slice(&bytes),
                    Some(Err(err)) => {
                        self.finish();
                        return Err(err);
                    }
                    None => self.eof = true,
                },
            }
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        self.buf.clear();
        self.data.clear();
        self.event = None;
    }

    /// Pop the next complete line; at EOF the unterminated tail counts as a line
    fn take_line(&mut self) -> Option<String> {
        let line = match self.buf.iter().position(|b| *b == b'\n') {
            Some(pos) => {
                let raw = self.buf.split_to(pos + 1);
                String::from_utf8_lossy(&raw[..pos]).into_owned()
            }
            None if self.eof && !self.buf.is_empty() => {
                let raw = self.buf.split();
                String::from_utf8_lossy(&raw).into_owned()
            }
            None => return None,
        };
        Some(line.trim_end_matches('\r').to_string())
    }

    fn take_buffered(&mut self) -> Option<Frame> {
        while let Some(line) = self.take_line() {
            match self.framing {
                Framing::Ndjson => {
                    if !line.trim().is_empty() {
                        return Some(Frame {
                            event: None,
                            data: line,
                        });
                    }
                }
                Framing::Sse => {
                    if line.is_empty() {
                        if let Some(frame) = self.dispatch() {
                            return Some(frame);
                        }
                        continue;
                    }
                    self.sse_field(&line);
                }
            }
        }
        // A final event without its trailing blank line
        if self.eof && self.framing == Framing::Sse {
            return self.dispatch();
        }
        None
    }

    fn sse_field(&mut self, line: &str) {
        if line.starts_with(':') {
            return;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            _ => {}
        }
    }

    fn dispatch(&mut self) -> Option<Frame> {
        if self.data.is_empty() {
            self.event = None;
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(Frame {
            event: self.event.take(),
            data,
        })
    }
}

#[cfg(test)]
pub(crate) fn stream_of(chunks: Vec<&'static str>) -> ByteStream {
    Box::pin(futures::stream::iter(
        chunks
            .into_iter()
            .map(|c| Ok(Bytes::from_static(c.as_bytes())))
            .collect::<Vec<_>>(),
    ))
}
