//! # EventBus: in-process fan-out of server-pushed events
//!
//! [`EventBus`] decouples the connection manager (the only publisher) from
//! any number of consumers. Consumers register a callback and get back a
//! [`Subscription`] whose [`unsubscribe`](Subscription::unsubscribe) removes
//! exactly that registration.
//!
//! ## What it guarantees
//! - Subscribers are called in registration order.
//! - Every current subscriber sees an event before the next event's
//!   dispatch starts.
//! - A subscriber registered during a dispatch first sees the next event.
//! - A subscriber unsubscribed during a dispatch, before its turn, is skipped.
//! - A failing or panicking subscriber is logged and skipped; the others
//!   still receive the event.
//!
//! ## What it does **not** do
//! - No buffering or replay: events published with no subscribers are gone.
//! - No deduplication.
//!
//! ## Diagram
//! ```text
//!   publish(&Event)
//!        │ snapshot registrations
//!        ├──► S1 (active?) ─► callback ─► Ok / Err / panic → logged
//!        ├──► S2 (active?) ─► callback
//!        └──► SN (active?) ─► callback
//! ```
//!
//! ## Example
//! ```rust
//! use pulsefeed::bus::EventBus;
//! use pulsefeed::event::Event;
//!
//! let bus = EventBus::new();
//! let subscription = bus.subscribe(|event: &Event| {
//!     println!("got {}", event.event_type());
//!     Ok(())
//! });
//!
//! bus.publish(&Event::new("incident.created", Default::default()));
//! subscription.unsubscribe();
//! assert_eq!(bus.subscriber_count(), 0);
//! ```

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::error::SubscriberError;
use crate::event::Event;

/// Subscriber callback.
pub type SubscriberFn = dyn Fn(&Event) -> Result<(), SubscriberError> + Send + Sync;

const ANONYMOUS: &str = "anonymous";

/// Identity of one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

struct Registration {
    id: SubscriptionId,
    name: &'static str,
    active: Arc<AtomicBool>,
    callback: Box<SubscriberFn>,
}

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<Arc<Registration>>>,
}

impl Registry {
    fn lock(&self) -> MutexGuard<'_, Vec<Arc<Registration>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn remove(&self, id: SubscriptionId) {
        self.lock().retain(|registration| registration.id != id);
    }
}

/// Outcome of one [`EventBus::publish`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchReport {
    /// Subscribers that handled the event
    pub delivered: usize,
    /// Subscribers that failed or panicked
    pub failed: usize,
}

/// Process-wide subscriber registry.
///
/// Cloning yields another handle to the same registry; pass it explicitly
/// to every collaborator that needs to subscribe.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Registry>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for every future event.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Event) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        self.subscribe_named(ANONYMOUS, callback)
    }

    /// Register `callback` under a name used in failure logs.
    pub fn subscribe_named<F>(&self, name: &'static str, callback: F) -> Subscription
    where
        F: Fn(&Event) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.registry.next_id.fetch_add(1, Ordering::Relaxed));
        let active = Arc::new(AtomicBool::new(true));

        self.registry.lock().push(Arc::new(Registration {
            id,
            name,
            active: Arc::clone(&active),
            callback: Box::new(callback),
        }));
        tracing::debug!("Subscriber '{}' registered ({:?})", name, id);

        Subscription {
            id,
            active,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Register `callback` for events matching `predicate` only.
    pub fn subscribe_filtered<P, F>(&self, name: &'static str, predicate: P, callback: F) -> Subscription
    where
        P: Fn(&Event) -> bool + Send + Sync + 'static,
        F: Fn(&Event) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        self.subscribe_named(name, move |event| {
            if predicate(event) {
                callback(event)
            } else {
                Ok(())
            }
        })
    }

    /// Deliver `event` to every current subscriber, in registration order.
    pub fn publish(&self, event: &Event) -> DispatchReport {
        // The lock is released before any callback runs, so callbacks may
        // subscribe or unsubscribe freely.
        let snapshot: Vec<Arc<Registration>> = self.registry.lock().clone();
        let mut report = DispatchReport::default();

        for registration in snapshot {
            if !registration.active.load(Ordering::Acquire) {
                continue;
            }

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| (registration.callback)(event)))
                .unwrap_or_else(|payload| Err(SubscriberError::Panicked(panic_message(&*payload))));

            match outcome {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        "Subscriber '{}' ({:?}) failed on '{}': {}",
                        registration.name,
                        registration.id,
                        event.event_type(),
                        e
                    );
                }
            }
        }

        tracing::trace!(
            "Dispatched '{}' to {} subscribers ({} failed)",
            event.event_type(),
            report.delivered + report.failed,
            report.failed
        );
        report
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.lock().len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Handle to one registration.
///
/// Dropping the handle leaves the subscriber registered; call
/// [`unsubscribe`](Self::unsubscribe), or convert it with
/// [`guard`](Self::guard) to unsubscribe on drop.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: SubscriptionId,
    active: Arc<AtomicBool>,
    registry: Weak<Registry>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Remove this registration. Idempotent, and safe to call from inside
    /// any callback, including this subscriber's own.
    pub fn unsubscribe(&self) {
        if self.active.swap(false, Ordering::AcqRel) {
            if let Some(registry) = self.registry.upgrade() {
                registry.remove(self.id);
            }
            tracing::debug!("Subscriber {:?} removed", self.id);
        }
    }

    /// Tie the registration to a guard's lifetime.
    pub fn guard(self) -> SubscriptionGuard {
        SubscriptionGuard(self)
    }
}

/// Unsubscribes when dropped.
#[derive(Debug)]
pub struct SubscriptionGuard(Subscription);

impl SubscriptionGuard {
    pub fn subscription(&self) -> &Subscription {
        &self.0
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.0.unsubscribe();
    }
}
