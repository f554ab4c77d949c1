//! Wire frame encoding and incremental decoding.
//!
//! A frame is one `event:` line followed by one `data:` line per
//! payload source line, terminated by a blank line. The decoder
//! buffers bytes until a full frame (blank-line terminated) is
//! available, so it can sit directly on a chunked byte stream.

use crate::error::ProtocolError;

/// A single wire frame: event name plus rejoined payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub event: String,
    pub data: String,
}

impl Frame {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
        }
    }

    /// Encode to the wire form, blank-line terminated.
    ///
    /// Every payload line gets its own `data:` line; an empty payload
    /// still produces one empty `data:` line so the frame shape is
    /// uniform.
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(self.data.len() + self.event.len() + 16);
        out.push_str("event: ");
        out.push_str(&self.event);
        out.push('\n');
        for line in self.data.split('\n') {
            out.push_str("data: ");
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
        out
    }
}

/// Incremental frame decoder over a byte stream.
///
/// Push bytes as they arrive, then drain complete frames with
/// [`FrameDecoder::next_frame`]. Bytes after the last complete frame
/// stay buffered for the next push.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes from the transport.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Pop the next complete frame, if one is buffered.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, ProtocolError> {
        let Some(end) = find_frame_end(&self.buf) else {
            return Ok(None);
        };

        let raw = self.buf.drain(..end + 2).collect::<Vec<u8>>();
        let text = std::str::from_utf8(&raw[..end])?;
        parse_frame(text).map(Some)
    }

    /// Number of buffered bytes not yet forming a complete frame.
    pub fn pending_bytes(&self) -> usize {
        self.buf.len()
    }
}

/// Find the index of the `\n\n` frame terminator, if present.
fn find_frame_end(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}

fn parse_frame(text: &str) -> Result<Frame, ProtocolError> {
    let mut event: Option<&str> = None;
    let mut data_lines: Vec<&str> = Vec::new();

    for line in text.split('\n') {
        if let Some(value) = field_value(line, "event:") {
            if event.is_some() {
                return Err(ProtocolError::DuplicateEventName);
            }
            event = Some(value);
        } else if let Some(value) = field_value(line, "data:") {
            data_lines.push(value);
        } else {
            return Err(ProtocolError::MalformedLine(line.to_string()));
        }
    }

    let event = event.ok_or(ProtocolError::MissingEventName)?;
    Ok(Frame::new(event, data_lines.join("\n")))
}

/// Split a `field: value` line, tolerating a single optional space
/// after the colon.
fn field_value<'a>(line: &'a str, field: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(field)?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}
