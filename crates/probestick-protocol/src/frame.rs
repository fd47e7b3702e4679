//! Stream reassembly for the fragmenting transport.
//!
//! The link layer delivers payload units with no framing and no alignment
//! to message boundaries: one notification may carry half a message, or
//! three messages glued together, or a split straight through the middle of
//! a string literal. [`FrameCodec`] accumulates fragments in a rolling
//! buffer and extracts every complete top-level JSON object currently
//! present, in arrival order.

use bytes::{Buf, BytesMut};
use log::warn;

use crate::constants::MAX_BUFFER_SIZE;

/// A codec for extracting complete JSON messages from a fragment stream.
#[derive(Debug, Default)]
pub struct FrameCodec {
    /// Buffer for accumulating incoming data.
    buffer: BytesMut,
}

impl FrameCodec {
    /// Create a new frame codec.
    pub fn new() -> Self {
        FrameCodec {
            buffer: BytesMut::with_capacity(1024),
        }
    }

    /// Add received data to the buffer.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to extract the next complete JSON object from the buffer.
    ///
    /// Returns `Some(message)` if a complete object is available, or `None`
    /// if more data is needed. Call in a loop to drain every message
    /// currently buffered.
    ///
    /// If the buffer has grown past [`MAX_BUFFER_SIZE`] without yielding a
    /// complete object, the buffer is discarded so a desynchronized stream
    /// cannot grow without bound; the session itself continues.
    pub fn decode(&mut self) -> Option<String> {
        // Fast path: the whole buffer is exactly one JSON object.
        let trimmed = trim_ascii_whitespace(&self.buffer);
        if trimmed.first() == Some(&b'{')
            && trimmed.last() == Some(&b'}')
            && serde_json::from_slice::<serde_json::Value>(trimmed).is_ok()
        {
            let message = String::from_utf8_lossy(trimmed).into_owned();
            self.buffer.clear();
            return Some(message);
        }

        // Scanning path: find one balanced top-level object.
        if let Some((start, end)) = find_complete_object(&self.buffer) {
            let head = self.buffer.split_to(end);
            let message = String::from_utf8_lossy(&head[start..]).into_owned();
            self.trim_leading_whitespace();
            return Some(message);
        }

        if self.buffer.len() > MAX_BUFFER_SIZE {
            warn!(
                "receive buffer overflow ({} bytes without a complete message), discarding",
                self.buffer.len()
            );
            self.buffer.clear();
        }

        None
    }

    /// Get the number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    fn trim_leading_whitespace(&mut self) {
        while self
            .buffer
            .first()
            .map_or(false, |b| b.is_ascii_whitespace())
        {
            self.buffer.advance(1);
        }
    }
}

fn trim_ascii_whitespace(mut data: &[u8]) -> &[u8] {
    while data.first().map_or(false, |b| b.is_ascii_whitespace()) {
        data = &data[1..];
    }
    while data.last().map_or(false, |b| b.is_ascii_whitespace()) {
        data = &data[..data.len() - 1];
    }
    data
}

/// Locate the first complete top-level JSON object in `buf`.
///
/// Tracks brace depth with string awareness: a `"` toggles in-string state
/// unless escaped, and braces inside a string do not affect depth. The
/// structural characters are all ASCII, so scanning bytes is safe even with
/// multi-byte UTF-8 inside string values. Returns the half-open byte range
/// of the object.
fn find_complete_object(buf: &[u8]) -> Option<(usize, usize)> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut start = None;

    for (i, &byte) in buf.iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match byte {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            b'}' if !in_string && depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(start) = start {
                        return Some((start, i + 1));
                    }
                }
            }
            _ => {}
        }
    }

    None
}
