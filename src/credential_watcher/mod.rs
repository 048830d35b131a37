//! Credential change detection.
//!
//! Turns credential changes into forced reconnects of the event stream.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐
//! │  File Watcher   │     │  Store writes   │
//! │  (notify crate) │     │  (this process) │
//! └────────┬────────┘     └────────┬────────┘
//!          │ reload()              │
//!          └───────────┬───────────┘
//!                      ▼
//!              ┌───────────────┐
//!              │   SignalBus   │
//!              │  (broadcast)  │
//!              └───────┬───────┘
//!                      ▼
//!              ┌───────────────┐
//!              │   Credential  │
//!              │    Watcher    │
//!              └───────┬───────┘
//!                      ▼
//!          ConnectionManager::connect()
//! ```
//!
//! The watcher never retries on its own; backoff belongs to the connection
//! manager.
//!
//! # Usage
//!
//! ```rust,ignore
//! let store = Arc::new(FileCredentialStore::open(path, signals.clone())?);
//! // Keep the handle alive: dropping it stops watching
//! let _file_watcher = spawn_file_watcher(store.clone())?;
//!
//! let watcher = CredentialWatcher::new(&config.credential_key, manager.clone(), store);
//! let task = watcher.spawn(signals.subscribe());
//! ```

mod file_watcher;
mod watcher;

pub use file_watcher::spawn_file_watcher;
pub use watcher::CredentialWatcher;
