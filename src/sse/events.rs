//! SSE line and frame types

/// A single classified line of an SSE stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    /// Blank line: dispatches the accumulated frame
    Empty,
    /// `: comment` (also used for unknown fields)
    Comment(String),
    /// `event: <name>`
    Event(String),
    /// `data: <payload>`
    Data(String),
    /// `id: <id>`
    Id(String),
    /// `retry: <ms>`, kept raw; reconnect timing is owned by the manager
    Retry(String),
}

/// One complete SSE frame
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseFrame {
    /// Event name, if the server set one
    pub event: Option<String>,
    /// Data lines joined with `\n`
    pub data: String,
    /// Last event id, if the server set one
    pub id: Option<String>,
}
