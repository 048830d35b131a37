//! Configuration errors.

use thiserror::Error;

/// An environment override could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{var} must be a whole number of milliseconds, got '{value}'")]
    InvalidMillis { var: &'static str, value: String },

    #[error("{var} must not be empty")]
    Empty { var: &'static str },

    #[error("Reconnect base delay ({base_ms}ms) exceeds max delay ({max_ms}ms)")]
    InvertedBackoff { base_ms: u64, max_ms: u64 },
}
