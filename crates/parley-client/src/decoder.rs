//! Incremental decoder for the `/stream` event channel.
//!
//! The body is UTF-8 text split into `\n`-terminated lines. Only lines that
//! start with `data: ` carry a payload, one JSON [`StreamEvent`] each. Chunks
//! may end anywhere, including inside a multi-byte character or inside a JSON
//! object, so both the byte-to-text step and the line split keep state
//! between chunks.

use futures::{Stream, StreamExt};

use crate::error::{ClientError, Result};
use crate::models::StreamEvent;

const DATA_PREFIX: &str = "data: ";

#[derive(Debug, Default)]
pub struct EventStreamDecoder {
    /// Trailing bytes of an incomplete UTF-8 sequence.
    pending_bytes: Vec<u8>,
    /// Decoded text not yet terminated by `\n`.
    buffer: String,
    malformed_frames: usize,
}

impl EventStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every event completed by it, in wire order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.decode_utf8(chunk);
        let mut events = Vec::new();
        self.drain_lines(&mut events);
        events
    }

    /// Flush decoder state at end of input.
    ///
    /// A final line without a trailing newline is still parsed.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if !self.pending_bytes.is_empty() {
            let tail = std::mem::take(&mut self.pending_bytes);
            self.buffer.push_str(&String::from_utf8_lossy(&tail));
        }

        let mut events = Vec::new();
        self.drain_lines(&mut events);

        let rest = std::mem::take(&mut self.buffer);
        if let Some(event) = self.parse_line(&rest) {
            events.push(event);
        }
        events
    }

    /// Number of `data:` frames skipped because their JSON did not parse.
    pub fn malformed_frames(&self) -> usize {
        self.malformed_frames
    }

    fn decode_utf8(&mut self, chunk: &[u8]) {
        let mut input = std::mem::take(&mut self.pending_bytes);
        input.extend_from_slice(chunk);

        let mut start = 0;
        loop {
            match std::str::from_utf8(&input[start..]) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    return;
                }
                Err(err) => {
                    let valid_end = start + err.valid_up_to();
                    // Already validated, so this borrows without replacing anything.
                    self.buffer
                        .push_str(&String::from_utf8_lossy(&input[start..valid_end]));

                    match err.error_len() {
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            start = valid_end + len;
                        }
                        None => {
                            // Incomplete sequence at the end: wait for the next chunk.
                            self.pending_bytes = input[valid_end..].to_vec();
                            return;
                        }
                    }
                }
            }
        }
    }

    fn drain_lines(&mut self, events: &mut Vec<StreamEvent>) {
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            if let Some(event) = self.parse_line(&line) {
                events.push(event);
            }
        }
    }

    fn parse_line(&mut self, line: &str) -> Option<StreamEvent> {
        let payload = line.strip_prefix(DATA_PREFIX)?.trim();
        if payload.is_empty() {
            return None;
        }

        match serde_json::from_str(payload) {
            Ok(event) => Some(event),
            Err(err) => {
                self.malformed_frames += 1;
                tracing::warn!(
                    error = %err,
                    payload_len = payload.len(),
                    "Skipping malformed stream frame"
                );
                None
            }
        }
    }
}

/// Decode a fallible byte stream into stream events.
///
/// A transport error is yielded once and ends the stream. Nothing is yielded
/// after the first terminal (`done` / `error`) event.
pub fn decode_stream<S, B, E>(bytes: S) -> impl Stream<Item = Result<StreamEvent>>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<ClientError>,
{
    async_stream::stream! {
        let mut bytes = Box::pin(bytes);
        let mut decoder = EventStreamDecoder::new();

        while let Some(chunk) = bytes.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    let err: ClientError = err.into();
                    yield Err(err);
                    return;
                }
            };

            for event in decoder.feed(chunk.as_ref()) {
                let terminal = event.is_terminal();
                yield Ok(event);
                if terminal {
                    return;
                }
            }
        }

        for event in decoder.finish() {
            let terminal = event.is_terminal();
            yield Ok(event);
            if terminal {
                return;
            }
        }
    }
}
