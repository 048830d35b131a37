//! Cross-context storage change notifications.

use tokio::sync::broadcast;

/// Capacity of the change broadcast. Credential writes are rare; a lagging
/// listener is told it lagged rather than blocking writers.
pub const DEFAULT_SIGNAL_CAPACITY: usize = 32;

/// A key in the credential store changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    /// The key that changed
    pub key: String,
    /// New value; `None` when the key was removed
    pub new_value: Option<String>,
}

impl StorageChange {
    pub fn new(key: impl Into<String>, new_value: Option<String>) -> Self {
        Self {
            key: key.into(),
            new_value,
        }
    }

    pub fn is_for(&self, key: &str) -> bool {
        self.key == key
    }
}

/// Broadcast bus carrying [`StorageChange`] signals.
///
/// Cloning yields another handle to the same bus.
#[derive(Debug, Clone)]
pub struct SignalBus {
    tx: broadcast::Sender<StorageChange>,
}

impl SignalBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Start listening. Only signals sent after this call are received.
    pub fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.tx.subscribe()
    }

    /// Announce a change. Returns how many listeners were notified.
    pub fn notify(&self, change: StorageChange) -> usize {
        tracing::trace!("Storage change for key '{}'", change.key);
        // No listeners is fine: nobody cares about the key yet
        self.tx.send(change).unwrap_or(0)
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNAL_CAPACITY)
    }
}
