//! Wiring for the live event stream.
//!
//! [`LiveStream`] owns the three long-lived pieces: the event bus, the
//! connection manager and the credential watcher. Construct it once at
//! application start and hand out [`LiveStream::bus`] to subscribers.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::bus::EventBus;
use crate::config::StreamConfig;
use crate::connection::{ConnectionManager, ConnectionStatus};
use crate::credential_watcher::CredentialWatcher;
use crate::credentials::SignalBus;
use crate::traits::{ChannelConnector, CredentialStore};

/// A running event stream.
pub struct LiveStream {
    bus: EventBus,
    manager: ConnectionManager,
    manager_task: JoinHandle<()>,
    watcher_task: JoinHandle<()>,
}

impl LiveStream {
    /// Start streaming.
    ///
    /// `signals` must be the bus `store` announces its writes on. The
    /// connection is attempted right away if the store holds a credential.
    pub fn start(
        config: &StreamConfig,
        connector: Arc<dyn ChannelConnector>,
        store: Arc<dyn CredentialStore>,
        signals: &SignalBus,
    ) -> Self {
        Self::start_with_bus(config, connector, store, signals, EventBus::new())
    }

    /// Like [`start`](Self::start), publishing to an existing bus so
    /// subscribers can register before the first event.
    pub fn start_with_bus(
        config: &StreamConfig,
        connector: Arc<dyn ChannelConnector>,
        store: Arc<dyn CredentialStore>,
        signals: &SignalBus,
        bus: EventBus,
    ) -> Self {
        // Subscribe before anything runs so no credential write is missed
        let changes = signals.subscribe();

        let (manager, manager_task) =
            ConnectionManager::spawn(config, connector, Arc::clone(&store), bus.clone());
        let watcher = CredentialWatcher::new(&config.credential_key, manager.clone(), store);
        let watcher_task = watcher.spawn(changes);

        tracing::info!("Live stream started for {}", config.endpoint);

        Self {
            bus,
            manager,
            manager_task,
            watcher_task,
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    pub fn status(&self) -> ConnectionStatus {
        self.manager.status()
    }

    pub fn status_receiver(&self) -> watch::Receiver<ConnectionStatus> {
        self.manager.status_receiver()
    }

    /// Stop watching, tear the connection down and wait for it to finish.
    pub async fn shutdown(self) {
        self.watcher_task.abort();
        self.manager.teardown();

        if let Err(e) = self.manager_task.await {
            tracing::error!("Connection manager task failed: {}", e);
        }
        tracing::info!("Live stream stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MemoryCredentialStore, MockConnector};
    use crate::connection::ConnectionState;
    use crate::event::Event;
    use std::sync::Mutex;
    use std::time::Duration;

    const KEY: &str = "pulseops_api_key";

    async fn wait_for_state(stream: &LiveStream, state: ConnectionState) {
        let mut rx = stream.status_receiver();
        tokio::time::timeout(Duration::from_secs(60), rx.wait_for(|s| s.state == state))
            .await
            .expect("timed out waiting for state")
            .expect("manager stopped");
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_stream_end_to_end() {
        let signals = SignalBus::default();
        let store = Arc::new(MemoryCredentialStore::with_entry(signals.clone(), KEY, "one"));
        let connector = MockConnector::new();
        let bus = EventBus::new();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.subscribe(move |event: &Event| {
            sink.lock().unwrap().push(event.event_type().to_string());
            Ok(())
        });

        let stream = LiveStream::start_with_bus(
            &StreamConfig::default(),
            Arc::new(connector.clone()),
            store.clone(),
            &signals,
            bus,
        );

        let first = connector.wait_for_channel(0).await;
        wait_for_state(&stream, ConnectionState::Open).await;
        first.send_frame(r#"{"type":"incident.created","incidentId":"1"}"#);
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Rotate: the old channel closes and a new one opens with the new key
        store.set(KEY, "two").unwrap();
        let second = connector.wait_for_channel(1).await;
        first.closed().await;
        assert!(second.url().ends_with("apiKey=two"));

        wait_for_state(&stream, ConnectionState::Open).await;
        second.send_frame(r#"{"type":"incident.updated","incidentId":"1"}"#);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["incident.created", "incident.updated"]
        );

        stream.shutdown().await;
        assert!(second.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_reacting_to_credentials() {
        let signals = SignalBus::default();
        let store = Arc::new(MemoryCredentialStore::new(signals.clone()));
        let connector = MockConnector::new();

        let stream = LiveStream::start(
            &StreamConfig::default(),
            Arc::new(connector.clone()),
            store.clone(),
            &signals,
        );
        assert_eq!(stream.status().state, ConnectionState::Idle);
        assert_eq!(stream.bus().subscriber_count(), 0);

        stream.shutdown().await;
        store.set(KEY, "late").unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(connector.open_count(), 0);
    }
}
