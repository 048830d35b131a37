//! Ready-made subscribers for the event bus.
//!
//! - [`ActivityFeed`]: bounded, newest-first activity list for a live ticker
//! - [`RefreshSignal`]: collects which views need re-fetching after events

pub mod activity;
pub mod refresh;

pub use activity::{describe, Activity, ActivityFeed, ACTIVITY_CAPACITY};
pub use refresh::{RefreshKind, RefreshPolicy, RefreshSignal};
