//! HTTP Server-Sent Events channel connector.
//!
//! Opens the event endpoint with a streaming GET and turns the response
//! body into frame bodies using [`SseDecoder`].

use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, Stream, StreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::Client;

use crate::error::ChannelError;
use crate::sse::SseDecoder;
use crate::traits::{ChannelConnector, FrameStream};

/// Default time allowed to establish the TCP/TLS connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// [`ChannelConnector`] for `text/event-stream` endpoints.
///
/// No overall request timeout is set: the channel is expected to stay open
/// indefinitely.
#[derive(Debug, Clone)]
pub struct SseConnector {
    client: Client,
}

impl SseConnector {
    /// Create a connector with the given connect timeout.
    pub fn new(connect_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().connect_timeout(connect_timeout).build()?;
        Ok(Self { client })
    }

    /// Create a connector around an existing client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChannelConnector for SseConnector {
    async fn open(&self, url: &str) -> Result<FrameStream, ChannelError> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| ChannelError::Connect(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChannelError::Status {
                status: status.as_u16(),
            });
        }

        Ok(Box::pin(frame_stream(response.bytes_stream())))
    }
}

struct FrameState<S> {
    bytes: Pin<Box<S>>,
    decoder: SseDecoder,
    ready: VecDeque<String>,
    failed: bool,
}

/// Decode a body byte stream into frame bodies.
///
/// Ends after the first transport error. A partial frame left when the body
/// ends is discarded.
pub fn frame_stream<S>(bytes: S) -> impl Stream<Item = Result<String, ChannelError>> + Send
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
{
    let state = FrameState {
        bytes: Box::pin(bytes),
        decoder: SseDecoder::new(),
        ready: VecDeque::new(),
        failed: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            // First, hand out any frames already decoded
            if let Some(data) = state.ready.pop_front() {
                return Some((Ok(data), state));
            }
            if state.failed {
                return None;
            }

            // Need more data from the body
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let frames = state.decoder.push(&chunk);
                    state.ready.extend(frames.into_iter().map(|frame| {
                        tracing::trace!(
                            "SSE frame (event: {:?}, id: {:?})",
                            frame.event,
                            frame.id
                        );
                        frame.data
                    }));
                }
                Some(Err(e)) => {
                    state.failed = true;
                    return Some((Err(ChannelError::Transport(e.to_string())), state));
                }
                None => {
                    if state.decoder.pending_bytes() > 0 {
                        tracing::debug!(
                            "Discarding {} bytes of unterminated SSE data",
                            state.decoder.pending_bytes()
                        );
                    }
                    return None;
                }
            }
        }
    })
}
