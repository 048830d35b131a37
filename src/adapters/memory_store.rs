//! In-memory credential store.
//!
//! Holds values in a process-local map. Useful when the application keeps
//! its settings elsewhere and pushes the credential in, and in tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::credentials::{SignalBus, StorageChange};
use crate::error::StoreError;
use crate::traits::CredentialStore;

/// In-memory [`CredentialStore`].
///
/// # Example
///
/// ```ignore
/// use pulsefeed::adapters::MemoryCredentialStore;
/// use pulsefeed::credentials::SignalBus;
/// use pulsefeed::traits::CredentialStore;
///
/// let signals = SignalBus::default();
/// let store = MemoryCredentialStore::new(signals.clone());
/// store.set("pulseops_api_key", "abc123")?;
/// assert_eq!(store.get("pulseops_api_key").as_deref(), Some("abc123"));
/// ```
#[derive(Debug)]
pub struct MemoryCredentialStore {
    values: Mutex<HashMap<String, String>>,
    signals: SignalBus,
}

impl MemoryCredentialStore {
    pub fn new(signals: SignalBus) -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
            signals,
        }
    }

    /// Create a store with one initial entry (no change is announced).
    pub fn with_entry(signals: SignalBus, key: &str, value: &str) -> Self {
        let store = Self::new(signals);
        store.lock().insert(key.to_string(), value.to_string());
        store
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.lock().insert(key.to_string(), value.to_string());
        self.signals
            .notify(StorageChange::new(key, Some(value.to_string())));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let removed = self.lock().remove(key);
        if removed.is_some() {
            self.signals.notify(StorageChange::new(key, None));
        }
        Ok(())
    }
}
