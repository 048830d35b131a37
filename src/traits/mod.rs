//! Trait abstractions for dependency injection and testability.
//!
//! The connection manager never talks to the network or the settings file
//! directly; it goes through these seams so the whole lifecycle can be
//! driven by in-memory doubles in tests.
//!
//! # Traits
//!
//! - [`ChannelConnector`] - Opens the persistent event channel
//! - [`CredentialStore`] - Process-wide key/value credential storage

pub mod channel;
pub mod credentials;

pub use channel::{ChannelConnector, FrameStream};
pub use credentials::CredentialStore;
