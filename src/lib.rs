//! pulsefeed - live incident event distribution
//!
//! Keeps one server-sent event channel open per process, reconnecting with
//! exponential backoff, and fans every decoded event out to in-process
//! subscribers. Credential changes in the settings store force a reconnect.
//!
//! This library exposes modules for use in integration tests.

pub mod adapters;
pub mod bus;
pub mod config;
pub mod connection;
pub mod credential_watcher;
pub mod credentials;
pub mod error;
pub mod event;
pub mod feed;
pub mod runtime;
pub mod sse;
pub mod traits;

pub use bus::{EventBus, Subscription};
pub use config::StreamConfig;
pub use connection::{ConnectionManager, ConnectionState, ConnectionStatus};
pub use event::Event;
pub use runtime::LiveStream;
