//! Credential value and credential-change signals.
//!
//! The credential lives in a process-wide key/value store (see
//! [`CredentialStore`](crate::traits::CredentialStore)) that other parts of
//! the application, or other processes, may write. Writers announce changes
//! on a [`SignalBus`] as [`StorageChange`] pairs; the
//! [`CredentialWatcher`](crate::credential_watcher::CredentialWatcher) listens
//! for the credential key.

mod signals;

pub use signals::{SignalBus, StorageChange, DEFAULT_SIGNAL_CAPACITY};

use std::fmt;

/// Opaque token used to authenticate the event channel.
///
/// Never empty: a blank stored value means "no credential".
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a token, treating blank input as absent.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        let trimmed = token.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.len() == token.len() {
            Some(Self(token))
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Interpret a raw store lookup.
    pub fn from_stored(value: Option<String>) -> Option<Self> {
        value.and_then(Self::new)
    }

    /// The raw token, for building the channel URL.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential(<{} chars>)", self.0.chars().count())
    }
}
