//! Concrete implementations of trait abstractions.
//!
//! Production adapters for the seams in `crate::traits`.
//!
//! # Adapters
//!
//! - [`SseConnector`] - Event channel over HTTP Server-Sent Events (reqwest)
//! - [`FileCredentialStore`] - JSON settings file with change detection
//! - [`MemoryCredentialStore`] - Process-local credential map
//!
//! # Mock Implementations
//!
//! The [`mock`] submodule provides test doubles:
//! - [`mock::MockConnector`] - Scripted channels driven by the test

pub mod file_store;
pub mod memory_store;
pub mod mock;
pub mod sse_connector;

pub use file_store::FileCredentialStore;
pub use memory_store::MemoryCredentialStore;
pub use mock::{MockChannel, MockConnector};
pub use sse_connector::{SseConnector, DEFAULT_CONNECT_TIMEOUT};
