//! Which views to re-fetch when events arrive.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;

use crate::bus::{EventBus, Subscription};
use crate::event::Event;

const EVIDENCE_UPLOADED: &str = "evidence.uploaded";

/// Something a view must reload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RefreshKind {
    /// The incident list
    IncidentList,
    /// One incident's details
    Incident(String),
    /// One incident's evidence
    Evidence(String),
}

/// Refresh rules for a view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshPolicy {
    /// Incident list: reload on any incident event
    Dashboard,
    /// Single incident: reload it on its own incident events and its
    /// evidence on uploads for it
    IncidentDetail { incident_id: String },
}

impl RefreshPolicy {
    pub fn incident_detail(incident_id: impl Into<String>) -> Self {
        Self::IncidentDetail {
            incident_id: incident_id.into(),
        }
    }

    /// What `event` makes stale under this policy.
    pub fn refreshes_for(&self, event: &Event) -> Vec<RefreshKind> {
        match self {
            Self::Dashboard if event.is_incident_event() => vec![RefreshKind::IncidentList],
            Self::Dashboard => Vec::new(),
            Self::IncidentDetail { incident_id } => {
                if event.incident_id().as_deref() != Some(incident_id.as_str()) {
                    return Vec::new();
                }
                if event.is_incident_event() {
                    vec![RefreshKind::Incident(incident_id.clone())]
                } else if event.event_type() == EVIDENCE_UPLOADED {
                    vec![RefreshKind::Evidence(incident_id.clone())]
                } else {
                    Vec::new()
                }
            }
        }
    }

    pub fn is_relevant(&self, event: &Event) -> bool {
        !self.refreshes_for(event).is_empty()
    }
}

#[derive(Debug)]
struct Pending {
    kinds: Mutex<Vec<RefreshKind>>,
    notify: Notify,
}

/// Bus subscriber that accumulates pending refreshes for a UI loop.
///
/// Repeated events for the same target coalesce into one pending refresh.
///
/// # Example
///
/// ```ignore
/// let signal = RefreshSignal::new(RefreshPolicy::Dashboard);
/// let _guard = signal.attach(&bus).guard();
///
/// loop {
///     signal.changed().await;
///     for kind in signal.take_pending() {
///         reload(kind).await;
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RefreshSignal {
    policy: RefreshPolicy,
    pending: Arc<Pending>,
}

impl RefreshSignal {
    pub fn new(policy: RefreshPolicy) -> Self {
        Self {
            policy,
            pending: Arc::new(Pending {
                kinds: Mutex::new(Vec::new()),
                notify: Notify::new(),
            }),
        }
    }

    pub fn policy(&self) -> &RefreshPolicy {
        &self.policy
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RefreshKind>> {
        self.pending
            .kinds
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Subscribe to `bus`, seeing only events relevant to the policy.
    pub fn attach(&self, bus: &EventBus) -> Subscription {
        let policy = self.policy.clone();
        let signal = self.clone();
        bus.subscribe_filtered(
            "refresh-signal",
            move |event| policy.is_relevant(event),
            move |event| {
                signal.record(event);
                Ok(())
            },
        )
    }

    /// Queue the refreshes `event` calls for. Returns how many were new.
    pub fn record(&self, event: &Event) -> usize {
        let kinds = self.policy.refreshes_for(event);
        let added = {
            let mut pending = self.lock();
            let mut added = 0;
            for kind in kinds {
                if !pending.contains(&kind) {
                    pending.push(kind);
                    added += 1;
                }
            }
            added
        };

        if added > 0 {
            tracing::debug!("{} refresh(es) pending for {:?}", added, self.policy);
            self.pending.notify.notify_one();
        }
        added
    }

    /// Drain pending refreshes in the order they were first requested.
    pub fn take_pending(&self) -> Vec<RefreshKind> {
        std::mem::take(&mut *self.lock())
    }

    pub fn has_pending(&self) -> bool {
        !self.lock().is_empty()
    }

    /// Wait until a refresh is queued. Returns immediately if one was queued
    /// since the last wait.
    pub async fn changed(&self) {
        self.pending.notify.notified().await
    }
}
