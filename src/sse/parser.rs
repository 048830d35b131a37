//! SSE stream parsing logic
//!
//! Contains the stateful SseParser for accumulating lines into frames, and
//! SseDecoder, which splits raw body chunks into lines first.

use crate::sse::events::{SseFrame, SseLine};

/// Strip the single optional space after the field colon.
fn field_value(rest: &str) -> String {
    rest.strip_prefix(' ').unwrap_or(rest).to_string()
}

/// Parse a single SSE line into its component type
pub fn parse_sse_line(line: &str) -> SseLine {
    if line.is_empty() {
        return SseLine::Empty;
    }

    if let Some(stripped) = line.strip_prefix(':') {
        return SseLine::Comment(stripped.trim().to_string());
    }

    if let Some(rest) = line.strip_prefix("data:") {
        return SseLine::Data(field_value(rest));
    }

    // A bare "data" line is an empty data line
    if line == "data" {
        return SseLine::Data(String::new());
    }

    if let Some(rest) = line.strip_prefix("event:") {
        return SseLine::Event(rest.trim().to_string());
    }

    if let Some(rest) = line.strip_prefix("id:") {
        return SseLine::Id(field_value(rest));
    }

    if let Some(rest) = line.strip_prefix("retry:") {
        return SseLine::Retry(rest.trim().to_string());
    }

    // Unknown line format - treat as comment
    SseLine::Comment(line.to_string())
}

/// Stateful SSE parser that accumulates lines and emits complete frames
#[derive(Debug, Default)]
pub struct SseParser {
    /// Event name of the frame being accumulated
    current_event: Option<String>,
    /// Accumulated data lines (SSE allows multiple data: lines)
    data_buffer: Vec<String>,
    /// Last seen event id; persists across frames
    last_id: Option<String>,
}

impl SseParser {
    /// Create a new SSE parser
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a line (without its terminator) to the parser.
    ///
    /// Returns `Some(frame)` when a blank line completes a frame that carried
    /// data. Frames without any data line are discarded.
    pub fn feed_line(&mut self, line: &str) -> Option<SseFrame> {
        match parse_sse_line(line) {
            SseLine::Event(name) => {
                self.current_event = Some(name);
                None
            }
            SseLine::Data(data) => {
                self.data_buffer.push(data);
                None
            }
            SseLine::Id(id) => {
                self.last_id = Some(id);
                None
            }
            SseLine::Empty => self.try_emit_frame(),
            SseLine::Retry(_) | SseLine::Comment(_) => None,
        }
    }

    fn try_emit_frame(&mut self) -> Option<SseFrame> {
        let event = self.current_event.take();
        if self.data_buffer.is_empty() {
            return None;
        }

        let data = self.data_buffer.join("\n");
        self.data_buffer.clear();

        Some(SseFrame {
            event,
            data,
            id: self.last_id.clone(),
        })
    }

    /// Reset the parser state
    pub fn reset(&mut self) {
        self.current_event = None;
        self.data_buffer.clear();
        self.last_id = None;
    }
}

/// Splits raw body chunks into lines and feeds them to an [`SseParser`].
///
/// Chunks may end anywhere, including inside a multi-byte UTF-8 sequence;
/// bytes are buffered until a full line is available. Lines may end in
/// `\n` or `\r\n`.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    parser: SseParser,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one body chunk, returning every frame it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            let line = String::from_utf8_lossy(&raw[..newline_pos]);
            let line = line.strip_suffix('\r').unwrap_or(&line);

            if let Some(frame) = self.parser.feed_line(line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Bytes received but not yet terminated by a newline.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }
}
