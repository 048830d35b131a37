//! Subscriber callback failures.

use thiserror::Error;

/// A subscriber failed while handling one event.
///
/// Isolated to that subscriber: dispatch continues with the rest.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriberError {
    /// The callback returned an error.
    #[error("Subscriber failed: {0}")]
    Failed(String),

    /// The callback panicked.
    #[error("Subscriber panicked: {0}")]
    Panicked(String),
}

impl SubscriberError {
    pub fn failed(msg: impl Into<String>) -> Self {
        SubscriberError::Failed(msg.into())
    }
}
