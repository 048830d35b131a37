//! Event channel transport abstraction.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::ChannelError;

/// Stream of frame bodies from an open channel.
///
/// Yields each frame's data in delivery order. An `Err` item or the end of
/// the stream both mean the channel is gone.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, ChannelError>> + Send>>;

/// Opens the persistent event channel.
///
/// `open` resolves once the channel is established (for HTTP: response
/// headers with a success status). Dropping the returned stream closes the
/// channel.
///
/// # Example
///
/// ```ignore
/// use futures_util::StreamExt;
/// use pulsefeed::traits::ChannelConnector;
///
/// async fn tail<C: ChannelConnector>(connector: &C, url: &str) -> Result<(), ChannelError> {
///     let mut frames = connector.open(url).await?;
///     while let Some(frame) = frames.next().await {
///         println!("{}", frame?);
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    /// Open the channel at `url` (credential already encoded in the query).
    async fn open(&self, url: &str) -> Result<FrameStream, ChannelError>;
}
