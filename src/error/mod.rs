//! Error types for the live event stream.
//!
//! Every failure inside the running subsystem is recovered locally and
//! reported through `tracing`; these types describe what went wrong so the
//! log lines (and tests) can say so precisely.
//!
//! | Error | Raised by | Effect |
//! |-------|-----------|--------|
//! | [`ChannelError`] | channel transport | close channel, schedule reconnect |
//! | [`DecodeError`] | frame decoding | frame dropped, connection untouched |
//! | [`SubscriberError`] | subscriber callback | logged, dispatch continues |
//! | [`StoreError`] | credential store | returned to the caller |
//! | [`ConfigError`] | environment configuration | returned to the caller |
//!
//! A missing credential is deliberately absent from this list: the
//! connection manager treats it as the `Idle` steady state.

mod config;
mod store;
mod stream;
mod subscriber;

pub use config::ConfigError;
pub use store::StoreError;
pub use stream::{ChannelError, DecodeError};
pub use subscriber::SubscriberError;
