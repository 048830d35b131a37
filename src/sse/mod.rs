//! SSE (Server-Sent Events) frame parser
//!
//! Turns the raw byte stream of the event endpoint into data frames.
//! SSE format consists of:
//! - `data: <json>` - data payload line (may repeat; joined with `\n`)
//! - `event: <name>` / `id: <id>` / `retry: <ms>` - frame metadata
//! - Empty line - signals end of frame
//! - Lines starting with `:` - comments (ignored)
//!
//! # Module structure
//! - `events` - Line and frame types (SseLine, SseFrame)
//! - `parser` - Parsing logic (SseParser, SseDecoder, parse_sse_line)

mod events;
mod parser;

pub use events::{SseFrame, SseLine};
pub use parser::{parse_sse_line, SseDecoder, SseParser};
