//! Forced reconnects on credential change.

use std::ops::ControlFlow;
use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::connection::ConnectionManager;
use crate::credentials::StorageChange;
use crate::traits::CredentialStore;

/// Listens for storage changes on one key and reconnects the event stream.
pub struct CredentialWatcher {
    key: String,
    manager: ConnectionManager,
    store: Arc<dyn CredentialStore>,
}

impl CredentialWatcher {
    pub fn new(
        key: impl Into<String>,
        manager: ConnectionManager,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            key: key.into(),
            manager,
            store,
        }
    }

    /// Start watching.
    ///
    /// Requests the initial connection, then one reconnect per change of the
    /// credential key. `signals` should be subscribed before any write that
    /// must not be missed. The task ends when the signal bus closes; abort it
    /// to stop earlier.
    pub fn spawn(self, signals: broadcast::Receiver<StorageChange>) -> JoinHandle<()> {
        tokio::spawn(self.run(signals))
    }

    async fn run(self, mut signals: broadcast::Receiver<StorageChange>) {
        let present = self.store.get(&self.key).is_some_and(|v| !v.trim().is_empty());
        tracing::info!(
            "Credential watcher started for '{}' (credential {})",
            self.key,
            if present { "present" } else { "absent" }
        );
        self.manager.connect();

        loop {
            let signal = signals.recv().await;
            if self.handle_signal(signal).is_break() {
                break;
            }
        }

        tracing::debug!("Credential watcher stopped");
    }

    fn handle_signal(&self, signal: Result<StorageChange, RecvError>) -> ControlFlow<()> {
        match signal {
            Ok(change) if change.is_for(&self.key) => {
                tracing::info!(
                    "Credential '{}' {}; reconnecting event stream",
                    self.key,
                    if change.new_value.is_some() { "changed" } else { "removed" }
                );
                self.manager.connect();
            }
            Ok(change) => {
                tracing::trace!("Ignoring change to '{}'", change.key);
            }
            Err(RecvError::Lagged(missed)) => {
                // A missed signal may have been the credential
                tracing::warn!(
                    "Credential watcher missed {} storage changes; reconnecting",
                    missed
                );
                self.manager.connect();
            }
            Err(RecvError::Closed) => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }
}
