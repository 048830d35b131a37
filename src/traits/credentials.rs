//! Credential store abstraction.

use crate::error::StoreError;

/// Process-wide key/value store holding the channel credential.
///
/// Writers other than this crate (a settings screen, another process) may
/// change values at any time. Implementations announce their own writes on
/// a [`SignalBus`](crate::credentials::SignalBus).
///
/// Reads are synchronous and must not block on I/O: the connection manager
/// reads the credential on every connect attempt.
pub trait CredentialStore: Send + Sync {
    /// Current value for `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Set `key` to `value` and announce the change.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove `key` and announce the change.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}
