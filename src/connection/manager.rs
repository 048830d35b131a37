//! Connection manager: drives the lifecycle state machine.
//!
//! A single actor task owns the [`Connection`], the open channel task and
//! the reconnect timer task. Every input (connect requests, channel
//! notifications, timer fires) is processed on that task one at a time, so
//! transitions never interleave and events are published in delivery order.
//!
//! ```text
//!  ConnectionManager handles ──commands──┐
//!                                        ▼
//!  channel task ──Opened/Frame/Failed──► actor ──publish──► EventBus
//!  retry timer  ──RetryElapsed─────────► actor
//!                                        │
//!                                        └──status──► watch::Receiver
//! ```

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::bus::EventBus;
use crate::config::StreamConfig;
use crate::credentials::Credential;
use crate::traits::{ChannelConnector, CredentialStore};

use super::state::{ChannelGeneration, Connection, ConnectionState, Effect, Input, RetryToken};

/// Observable snapshot of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// Consecutive failures since the last successful open
    pub attempt_count: u32,
    /// Whether a reconnect timer is armed
    pub retry_pending: bool,
}

impl ConnectionStatus {
    fn of(connection: &Connection) -> Self {
        Self {
            state: connection.state(),
            attempt_count: connection.attempt_count(),
            retry_pending: connection.pending_retry().is_some(),
        }
    }
}

/// Requests from handles.
#[derive(Debug)]
enum Command {
    Connect,
    Teardown,
}

/// Notifications from the channel and timer tasks.
#[derive(Debug)]
enum Notification {
    Channel(Input),
    RetryElapsed(RetryToken),
}

/// Handle to the connection actor.
///
/// Cheap to clone. Operations never block: they enqueue a request for the
/// actor. Once torn down, further requests are ignored.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    command_tx: mpsc::UnboundedSender<Command>,
    status_rx: watch::Receiver<ConnectionStatus>,
}

impl ConnectionManager {
    /// Spawn the actor on the current tokio runtime.
    ///
    /// The manager starts `Idle`; nothing happens until [`connect`](Self::connect).
    /// The returned task finishes after [`teardown`](Self::teardown), or once
    /// every handle is dropped.
    pub fn spawn(
        config: &StreamConfig,
        connector: Arc<dyn ChannelConnector>,
        store: Arc<dyn CredentialStore>,
        bus: EventBus,
    ) -> (Self, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::default());

        let actor = Actor {
            connection: Connection::new(config.backoff()),
            config: config.clone(),
            connector,
            store,
            bus,
            notify_tx,
            channel_task: None,
            retry_task: None,
            status_tx,
        };
        let task = tokio::spawn(actor.run(command_rx, notify_rx));

        (
            Self {
                command_tx,
                status_rx,
            },
            task,
        )
    }

    /// (Re)connect with the credential currently in the store.
    ///
    /// Closes any open channel and cancels any pending retry first. With no
    /// credential the manager goes `Idle`.
    pub fn connect(&self) {
        if self.command_tx.send(Command::Connect).is_err() {
            tracing::debug!("Connect requested after teardown; ignored");
        }
    }

    /// Cancel any retry, close any channel, and stop for good.
    pub fn teardown(&self) {
        if self.command_tx.send(Command::Teardown).is_err() {
            tracing::debug!("Connection manager already torn down");
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    pub fn state(&self) -> ConnectionState {
        self.status_rx.borrow().state
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Subscribe to status changes.
    pub fn status_receiver(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }
}

struct Actor {
    connection: Connection,
    config: StreamConfig,
    connector: Arc<dyn ChannelConnector>,
    store: Arc<dyn CredentialStore>,
    bus: EventBus,
    notify_tx: mpsc::UnboundedSender<Notification>,
    channel_task: Option<JoinHandle<()>>,
    retry_task: Option<JoinHandle<()>>,
    status_tx: watch::Sender<ConnectionStatus>,
}

impl Actor {
    async fn run(
        mut self,
        mut command_rx: mpsc::UnboundedReceiver<Command>,
        mut notify_rx: mpsc::UnboundedReceiver<Notification>,
    ) {
        tracing::debug!("Connection manager started");

        loop {
            tokio::select! {
                biased;

                command = command_rx.recv() => match command {
                    Some(Command::Connect) => {
                        let credential = self.read_credential();
                        self.handle(Input::Connect { credential });
                    }
                    Some(Command::Teardown) | None => {
                        self.handle(Input::Teardown);
                        break;
                    }
                },
                // The actor holds a sender, so this branch never sees None
                Some(notification) = notify_rx.recv() => {
                    let input = match notification {
                        Notification::Channel(input) => input,
                        Notification::RetryElapsed(token) => Input::RetryElapsed {
                            token,
                            credential: self.read_credential(),
                        },
                    };
                    self.handle(input);
                }
            }
        }

        tracing::info!("Connection manager stopped");
    }

    fn read_credential(&self) -> Option<Credential> {
        Credential::from_stored(self.store.get(&self.config.credential_key))
    }

    fn handle(&mut self, input: Input) {
        self.log_input(&input);

        for effect in self.connection.apply(input) {
            self.perform(effect);
        }

        let status = ConnectionStatus::of(&self.connection);
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                tracing::debug!(
                    "Connection {} -> {} (attempts: {})",
                    current.state,
                    status.state,
                    status.attempt_count
                );
                *current = status;
                true
            }
        });
    }

    fn log_input(&self, input: &Input) {
        match input {
            Input::Connect { credential: None } => {
                tracing::info!("No credential available; event stream idle");
            }
            Input::Connect { credential: Some(_) } => {
                tracing::info!("Connecting event stream");
            }
            Input::Opened { generation } if self.connection.is_current(*generation) => {
                tracing::info!("Event stream connected");
            }
            Input::ChannelFailed { generation, error } if self.connection.is_current(*generation) => {
                if error.is_auth_rejection() {
                    tracing::warn!("Event stream rejected the credential: {}", error);
                } else {
                    tracing::warn!("Event stream error: {}", error);
                }
            }
            Input::Frame { generation, data } if self.connection.is_current(*generation) => {
                tracing::trace!("Frame received ({} bytes)", data.len());
            }
            Input::RetryElapsed { token, .. } if self.connection.pending_retry() == Some(*token) => {
                tracing::info!(
                    "Reconnecting event stream (attempt {})",
                    self.connection.attempt_count()
                );
            }
            Input::Teardown => {
                tracing::debug!("Tearing down event stream");
            }
            _ => {
                tracing::trace!("Ignoring notification from a closed channel");
            }
        }
    }

    fn perform(&mut self, effect: Effect) {
        match effect {
            Effect::OpenChannel {
                generation,
                credential,
            } => self.open_channel(generation, &credential),
            Effect::CloseChannel => {
                if let Some(task) = self.channel_task.take() {
                    task.abort();
                }
            }
            Effect::ArmRetry {
                token,
                delay,
                attempt,
            } => {
                self.cancel_retry();
                tracing::info!(
                    "Event stream reconnect {} scheduled in {:?}",
                    attempt,
                    delay
                );
                let notify_tx = self.notify_tx.clone();
                self.retry_task = Some(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = notify_tx.send(Notification::RetryElapsed(token));
                }));
            }
            Effect::CancelRetry => self.cancel_retry(),
            Effect::Publish(event) => {
                self.bus.publish(&event);
            }
            Effect::DropFrame(error) => {
                tracing::warn!("Dropping malformed event frame: {}", error);
            }
        }
    }

    fn cancel_retry(&mut self) {
        if let Some(task) = self.retry_task.take() {
            task.abort();
        }
    }

    fn open_channel(&mut self, generation: ChannelGeneration, credential: &Credential) {
        // CloseChannel always precedes OpenChannel when a channel is live
        if let Some(stale) = self.channel_task.take() {
            stale.abort();
        }

        let url = self.config.channel_url(credential);
        let connector = Arc::clone(&self.connector);
        let notify_tx = self.notify_tx.clone();

        self.channel_task = Some(tokio::spawn(async move {
            let send = |input: Input| notify_tx.send(Notification::Channel(input)).is_ok();

            let mut frames = match connector.open(&url).await {
                Ok(frames) => frames,
                Err(error) => {
                    send(Input::ChannelFailed { generation, error });
                    return;
                }
            };
            if !send(Input::Opened { generation }) {
                return;
            }

            while let Some(frame) = frames.next().await {
                let input = match frame {
                    Ok(data) => Input::Frame { generation, data },
                    Err(error) => Input::ChannelFailed { generation, error },
                };
                let failed = matches!(input, Input::ChannelFailed { .. });
                if !send(input) || failed {
                    return;
                }
            }

            send(Input::ChannelFailed {
                generation,
                error: crate::error::ChannelError::Closed,
            });
        }));
    }
}

impl Drop for Actor {
    fn drop(&mut self) {
        if let Some(task) = self.channel_task.take() {
            task.abort();
        }
        self.cancel_retry();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MemoryCredentialStore, MockConnector};
    use crate::credentials::SignalBus;
    use crate::error::ChannelError;
    use crate::event::Event;
    use std::time::Duration;
    use tokio::time::Instant;

    const KEY: &str = "pulseops_api_key";

    struct Harness {
        manager: ConnectionManager,
        task: JoinHandle<()>,
        connector: MockConnector,
        store: Arc<MemoryCredentialStore>,
        bus: EventBus,
    }

    fn harness(token: Option<&str>) -> Harness {
        let signals = SignalBus::default();
        let store = Arc::new(match token {
            Some(token) => MemoryCredentialStore::with_entry(signals, KEY, token),
            None => MemoryCredentialStore::new(signals),
        });
        let connector = MockConnector::new();
        let bus = EventBus::new();
        let config = StreamConfig::default().with_endpoint("http://pulse.test/api/stream");

        let (manager, task) = ConnectionManager::spawn(
            &config,
            Arc::new(connector.clone()),
            store.clone(),
            bus.clone(),
        );

        Harness {
            manager,
            task,
            connector,
            store,
            bus,
        }
    }

    async fn wait_for_state(manager: &ConnectionManager, state: ConnectionState) -> ConnectionStatus {
        let mut rx = manager.status_receiver();
        let status = tokio::time::timeout(Duration::from_secs(300), rx.wait_for(|s| s.state == state))
            .await
            .expect("timed out waiting for state")
            .expect("manager stopped");
        *status
    }

    /// Let the actor drain its queues.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    fn assert_elapsed(start: Instant, expected_ms: u64) {
        let elapsed = start.elapsed();
        assert!(
            elapsed >= Duration::from_millis(expected_ms)
                && elapsed < Duration::from_millis(expected_ms + 50),
            "expected ~{}ms, got {:?}",
            expected_ms,
            elapsed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_without_credential_stays_idle() {
        let h = harness(None);

        h.manager.connect();
        settle().await;

        assert_eq!(h.connector.open_count(), 0);
        assert_eq!(h.manager.status(), ConnectionStatus::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_credential_counts_as_absent() {
        let h = harness(Some("   "));

        h.manager.connect();
        settle().await;

        assert_eq!(h.connector.open_count(), 0);
        assert_eq!(h.manager.state(), ConnectionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_opens_channel_with_encoded_credential() {
        let h = harness(Some("a b&c"));

        h.manager.connect();
        let channel = h.connector.wait_for_channel(0).await;
        let status = wait_for_state(&h.manager, ConnectionState::Open).await;

        assert_eq!(
            channel.url(),
            "http://pulse.test/api/stream?apiKey=a%20b%26c"
        );
        assert_eq!(status.attempt_count, 0);
        assert!(!status.retry_pending);
        assert!(h.manager.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_frames_published_in_order_and_malformed_dropped() {
        let h = harness(Some("token"));
        let (tx, mut rx) = mpsc::unbounded_channel();
        h.bus.subscribe(move |event: &Event| {
            let _ = tx.send(event.event_type().to_string());
            Ok(())
        });

        h.manager.connect();
        let channel = h.connector.wait_for_channel(0).await;
        channel.send_frame(r#"{"type":"incident.created","incidentId":1}"#);
        channel.send_frame("not json");
        channel.send_frame(r#"{"no_type":true}"#);
        channel.send_frame(r#"{"type":"incident.updated","incidentId":1}"#);

        assert_eq!(rx.recv().await.as_deref(), Some("incident.created"));
        assert_eq!(rx.recv().await.as_deref(), Some("incident.updated"));
        settle().await;
        assert!(rx.try_recv().is_err());
        // Malformed frames do not disturb the channel
        assert_eq!(h.manager.state(), ConnectionState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_refusals_back_off_exponentially() {
        let h = harness(Some("token"));
        for _ in 0..3 {
            h.connector.refuse_next(ChannelError::Status { status: 503 });
        }

        let start = Instant::now();
        h.manager.connect();

        h.connector.wait_for_opens(2).await;
        assert_elapsed(start, 1_000);
        h.connector.wait_for_opens(3).await;
        assert_elapsed(start, 3_000);
        h.connector.wait_for_opens(4).await;
        assert_elapsed(start, 7_000);

        let status = wait_for_state(&h.manager, ConnectionState::Open).await;
        assert_eq!(status.attempt_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_is_capped_at_max_delay() {
        let signals = SignalBus::default();
        let store = Arc::new(MemoryCredentialStore::with_entry(signals, KEY, "token"));
        let connector = MockConnector::new();
        let config = StreamConfig::default()
            .with_backoff(Duration::from_secs(1), Duration::from_secs(4));
        for _ in 0..4 {
            connector.refuse_next(ChannelError::Connect("refused".to_string()));
        }
        let (manager, _task) =
            ConnectionManager::spawn(&config, Arc::new(connector.clone()), store, EventBus::new());

        manager.connect();
        connector.wait_for_opens(4).await;
        // 1s + 2s + 4s, then capped at 4s
        let start = Instant::now();
        connector.wait_for_opens(5).await;
        assert_elapsed(start, 4_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_after_open_schedules_retry_then_resets() {
        let h = harness(Some("token"));

        h.manager.connect();
        let first = h.connector.wait_for_channel(0).await;
        wait_for_state(&h.manager, ConnectionState::Open).await;

        first.fail(ChannelError::Transport("connection reset".to_string()));
        let status = wait_for_state(&h.manager, ConnectionState::ReconnectScheduled).await;
        assert_eq!(status.attempt_count, 1);
        assert!(status.retry_pending);
        first.closed().await;

        let start = Instant::now();
        h.connector.wait_for_channel(1).await;
        assert_elapsed(start, 1_000);
        let status = wait_for_state(&h.manager, ConnectionState::Open).await;
        assert_eq!(status.attempt_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_hangup_triggers_reconnect() {
        let h = harness(Some("token"));

        h.manager.connect();
        let first = h.connector.wait_for_channel(0).await;
        wait_for_state(&h.manager, ConnectionState::Open).await;

        first.end();
        let status = wait_for_state(&h.manager, ConnectionState::ReconnectScheduled).await;
        assert_eq!(status.attempt_count, 1);

        h.connector.wait_for_channel(1).await;
        wait_for_state(&h.manager, ConnectionState::Open).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_reconnect_replaces_open_channel() {
        let h = harness(Some("old-token"));

        h.manager.connect();
        let first = h.connector.wait_for_channel(0).await;
        wait_for_state(&h.manager, ConnectionState::Open).await;

        h.store.set(KEY, "new-token").unwrap();
        h.manager.connect();
        let second = h.connector.wait_for_channel(1).await;

        tokio::time::timeout(Duration::from_secs(1), first.closed())
            .await
            .expect("old channel should be closed");
        assert!(second.url().ends_with("apiKey=new-token"));
        assert!(!second.is_closed());

        // Frames from the old channel are ignored
        let (tx, mut rx) = mpsc::unbounded_channel();
        h.bus.subscribe(move |event: &Event| {
            let _ = tx.send(event.event_type().to_string());
            Ok(())
        });
        assert!(!first.send_frame(r#"{"type":"stale"}"#));
        second.send_frame(r#"{"type":"fresh"}"#);
        assert_eq!(rx.recv().await.as_deref(), Some("fresh"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_reconnect_cancels_pending_retry() {
        let h = harness(Some("token"));
        h.connector.refuse_next(ChannelError::Status { status: 502 });

        h.manager.connect();
        let status = wait_for_state(&h.manager, ConnectionState::ReconnectScheduled).await;
        assert_eq!(status.attempt_count, 1);

        h.manager.connect();
        h.connector.wait_for_channel(0).await;
        let status = wait_for_state(&h.manager, ConnectionState::Open).await;
        assert!(!status.retry_pending);

        // The cancelled timer never produces a third open
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(h.connector.open_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_reads_latest_credential() {
        let h = harness(Some("stale"));
        h.connector.refuse_next(ChannelError::Status { status: 401 });

        h.manager.connect();
        wait_for_state(&h.manager, ConnectionState::ReconnectScheduled).await;
        h.store.set(KEY, "rotated").unwrap();

        h.connector.wait_for_opens(2).await;
        let urls = h.connector.opened_urls();
        assert!(urls[0].ends_with("apiKey=stale"));
        assert!(urls[1].ends_with("apiKey=rotated"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleared_credential_closes_channel_and_idles() {
        let h = harness(Some("token"));

        h.manager.connect();
        let channel = h.connector.wait_for_channel(0).await;
        wait_for_state(&h.manager, ConnectionState::Open).await;

        h.store.remove(KEY).unwrap();
        h.manager.connect();
        wait_for_state(&h.manager, ConnectionState::Idle).await;
        channel.closed().await;

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(h.connector.open_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_is_terminal() {
        let h = harness(Some("token"));

        h.manager.connect();
        let channel = h.connector.wait_for_channel(0).await;
        wait_for_state(&h.manager, ConnectionState::Open).await;

        h.manager.teardown();
        h.task.await.unwrap();
        assert!(channel.is_closed());
        assert_eq!(h.manager.state(), ConnectionState::Idle);

        h.manager.connect();
        settle().await;
        assert_eq!(h.connector.open_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_cancels_pending_retry() {
        let h = harness(Some("token"));
        h.connector.refuse_next(ChannelError::Status { status: 503 });

        h.manager.connect();
        wait_for_state(&h.manager, ConnectionState::ReconnectScheduled).await;
        h.manager.teardown();
        h.task.await.unwrap();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(h.connector.open_count(), 1);
        assert!(!h.manager.status().retry_pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_every_handle_stops_the_actor() {
        let h = harness(Some("token"));

        h.manager.connect();
        let channel = h.connector.wait_for_channel(0).await;

        drop(h.manager);
        h.task.await.unwrap();
        assert!(channel.is_closed());
    }
}
