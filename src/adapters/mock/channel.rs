//! Scripted channel connector for testing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use futures_util::stream;
use tokio::sync::{mpsc, Notify};

use crate::error::ChannelError;
use crate::traits::{ChannelConnector, FrameStream};

enum MockItem {
    Frame(String),
    Fail(ChannelError),
    End,
}

/// Test-side handle to one channel opened through [`MockConnector`].
#[derive(Clone)]
pub struct MockChannel {
    url: String,
    tx: mpsc::UnboundedSender<MockItem>,
}

impl MockChannel {
    /// URL the channel was opened with.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Deliver a frame body. Returns false if the channel was already closed.
    pub fn send_frame(&self, data: &str) -> bool {
        self.tx.send(MockItem::Frame(data.to_string())).is_ok()
    }

    /// Report a transport failure.
    pub fn fail(&self, error: ChannelError) -> bool {
        self.tx.send(MockItem::Fail(error)).is_ok()
    }

    /// End the stream as if the server hung up.
    pub fn end(&self) -> bool {
        self.tx.send(MockItem::End).is_ok()
    }

    /// Whether the consumer dropped the stream (the channel was closed).
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Wait until the consumer closes the channel.
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

#[derive(Default)]
struct MockState {
    opened_urls: Vec<String>,
    refusals: VecDeque<ChannelError>,
    channels: Vec<MockChannel>,
}

/// [`ChannelConnector`] whose channels are driven by the test.
///
/// Every `open` call is recorded. Queued refusals fail the next opens in
/// order; otherwise a [`MockChannel`] is created for the test to drive.
///
/// # Example
///
/// ```ignore
/// let connector = MockConnector::new();
/// connector.refuse_next(ChannelError::Status { status: 503 });
///
/// // ... start a ConnectionManager with Arc::new(connector.clone()) ...
///
/// let channel = connector.wait_for_channel(0).await;
/// channel.send_frame(r#"{"type":"incident.created"}"#);
/// ```
#[derive(Clone, Default)]
pub struct MockConnector {
    state: Arc<Mutex<MockState>>,
    opened: Arc<Notify>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fail the next `open` call with `error`.
    pub fn refuse_next(&self, error: ChannelError) {
        self.lock().refusals.push_back(error);
    }

    /// Number of `open` calls so far, refused ones included.
    pub fn open_count(&self) -> usize {
        self.lock().opened_urls.len()
    }

    pub fn opened_urls(&self) -> Vec<String> {
        self.lock().opened_urls.clone()
    }

    /// The `index`-th successfully opened channel.
    pub fn channel(&self, index: usize) -> Option<MockChannel> {
        self.lock().channels.get(index).cloned()
    }

    pub fn channel_count(&self) -> usize {
        self.lock().channels.len()
    }

    /// Wait until at least `count` open calls have happened.
    pub async fn wait_for_opens(&self, count: usize) {
        loop {
            let notified = self.opened.notified();
            if self.open_count() >= count {
                return;
            }
            notified.await;
        }
    }

    /// Wait until the `index`-th channel exists and return it.
    pub async fn wait_for_channel(&self, index: usize) -> MockChannel {
        loop {
            let notified = self.opened.notified();
            if let Some(channel) = self.channel(index) {
                return channel;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl ChannelConnector for MockConnector {
    async fn open(&self, url: &str) -> Result<FrameStream, ChannelError> {
        let result = {
            let mut state = self.lock();
            state.opened_urls.push(url.to_string());

            match state.refusals.pop_front() {
                Some(error) => Err(error),
                None => {
                    let (tx, rx) = mpsc::unbounded_channel();
                    state.channels.push(MockChannel {
                        url: url.to_string(),
                        tx,
                    });
                    Ok(rx)
                }
            }
        };
        self.opened.notify_waiters();

        let rx = result?;
        let frames = stream::unfold(rx, |mut rx| async move {
            match rx.recv().await? {
                MockItem::Frame(data) => Some((Ok(data), rx)),
                MockItem::Fail(error) => Some((Err(error), rx)),
                MockItem::End => None,
            }
        });
        Ok(Box::pin(frames))
    }
}
