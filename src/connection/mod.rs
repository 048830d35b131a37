//! Connection lifecycle for the event channel.
//!
//! - [`state`]: the pure lifecycle state machine
//! - [`backoff`]: reconnect delay policy
//! - [`manager`]: the tokio actor that performs the machine's effects

pub mod backoff;
pub mod manager;
pub mod state;

pub use backoff::{ReconnectBackoff, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY};
pub use manager::{ConnectionManager, ConnectionStatus};
pub use state::{ChannelGeneration, Connection, ConnectionState, Effect, Input, RetryToken};
