//! Mock implementations for testing.
//!
//! Test doubles for the trait seams, so the connection lifecycle can be
//! exercised without a network.
//!
//! # Available Mocks
//!
//! - [`MockConnector`] - Scripted channel connector with per-channel control

pub mod channel;

pub use channel::{MockChannel, MockConnector};
