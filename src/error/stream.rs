//! Channel and frame decoding errors.

use thiserror::Error;

/// Failure of the physical streaming channel.
///
/// Every variant is recoverable: the connection manager closes the channel
/// and schedules a reconnect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The request could not be sent (DNS, refused, TLS, timeout).
    #[error("Failed to open channel: {0}")]
    Connect(String),

    /// The endpoint answered with a non-success status.
    #[error("Channel rejected with HTTP status {status}")]
    Status { status: u16 },

    /// The body stream failed after the channel was open.
    #[error("Channel transport error: {0}")]
    Transport(String),

    /// The server ended the stream.
    #[error("Channel closed by server")]
    Closed,
}

impl ChannelError {
    /// Whether the server refused the credential.
    ///
    /// Still retried with backoff, but worth a louder log line.
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, ChannelError::Status { status: 401 | 403 })
    }
}

impl From<reqwest::Error> for ChannelError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            ChannelError::Status {
                status: status.as_u16(),
            }
        } else if e.is_body() || e.is_decode() {
            ChannelError::Transport(e.to_string())
        } else {
            ChannelError::Connect(e.to_string())
        }
    }
}

/// A delivered frame that could not become an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The frame body is not JSON at all.
    #[error("Invalid JSON in frame: {0}")]
    InvalidJson(String),

    /// The frame body is JSON but not an object.
    #[error("Frame is not a JSON object")]
    NotAnObject,

    /// The object has no string `type` field.
    #[error("Frame has no string 'type' field")]
    MissingType,
}

impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        DecodeError::InvalidJson(e.to_string())
    }
}
