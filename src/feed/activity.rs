//! Live activity feed.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::bus::{EventBus, Subscription};
use crate::event::Event;

/// Number of activities kept by default.
pub const ACTIVITY_CAPACITY: usize = 50;

/// One entry of the activity feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type")]
    pub event_type: String,
    pub description: String,
    pub received_at: DateTime<Utc>,
    pub payload: Map<String, Value>,
}

impl Activity {
    pub fn from_event(event: &Event, received_at: DateTime<Utc>) -> Self {
        Self {
            event_type: event.event_type().to_string(),
            description: describe(event),
            received_at,
            payload: event.payload().clone(),
        }
    }
}

/// Human-readable one-liner for an event.
pub fn describe(event: &Event) -> String {
    let id = event.incident_id().unwrap_or_default();
    let subject = match event.str_field("title") {
        Some(title) if !title.is_empty() => title.to_string(),
        _ => format!("#{}", id),
    };

    match event.event_type() {
        "incident.created" => format!("New incident created: {}", subject),
        "incident.updated" => format!("Incident updated: {}", subject),
        "incident.status.changed" => format!(
            "Status changed to {}: {}",
            event.str_field("status").unwrap_or("UNKNOWN"),
            subject
        ),
        "incident.escalated" => format!("Incident escalated: {}", subject),
        "incident.stale" => format!("Stale incident detected: {}", subject),
        "evidence.uploaded" => format!("Evidence uploaded for incident #{}", id),
        other => format!("{}: {}", other, id),
    }
}

/// Bounded newest-first list of recent activity.
///
/// Cloning yields another handle to the same list, so one clone can be
/// attached to the bus while another is read by the UI.
#[derive(Debug, Clone)]
pub struct ActivityFeed {
    items: Arc<Mutex<VecDeque<Activity>>>,
    capacity: usize,
}

impl Default for ActivityFeed {
    fn default() -> Self {
        Self::new(ACTIVITY_CAPACITY)
    }
}

impl ActivityFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Activity>> {
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Subscribe the feed to `bus`.
    pub fn attach(&self, bus: &EventBus) -> Subscription {
        let feed = self.clone();
        bus.subscribe_named("activity-feed", move |event| {
            feed.record(event);
            Ok(())
        })
    }

    /// Record an event as the newest activity. Heartbeats are skipped.
    pub fn record(&self, event: &Event) -> Option<Activity> {
        if event.is_heartbeat() {
            return None;
        }

        let activity = Activity::from_event(event, Utc::now());
        let mut items = self.lock();
        items.push_front(activity.clone());
        items.truncate(self.capacity);
        Some(activity)
    }

    /// Newest first.
    pub fn items(&self) -> Vec<Activity> {
        self.lock().iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<Activity> {
        self.lock().front().cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}
