//! In-process feed backed by a bounded channel.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{AnnounceEvent, AnnounceFeed, FeedError};
use crate::metadata::ContentId;

/// Create a connected sender/feed pair.
pub fn channel_feed(buffer: usize) -> (FeedSender, ChannelFeed) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (FeedSender { tx }, ChannelFeed { rx })
}

/// Producer side of a [`ChannelFeed`].
#[derive(Clone)]
pub struct FeedSender {
    tx: mpsc::Sender<AnnounceEvent>,
}

impl FeedSender {
    pub async fn send(&self, event: AnnounceEvent) -> Result<(), FeedError> {
        self.tx.send(event).await.map_err(|_| FeedError::Closed)
    }

    pub async fn announce(
        &self,
        content_id: ContentId,
        raw_metadata: impl Into<Vec<u8>>,
    ) -> Result<(), FeedError> {
        self.send(AnnounceEvent::new(content_id, raw_metadata)).await
    }
}

/// Consumer side: yields events until every sender is dropped.
pub struct ChannelFeed {
    rx: mpsc::Receiver<AnnounceEvent>,
}

#[async_trait]
impl AnnounceFeed for ChannelFeed {
    fn name(&self) -> &'static str {
        "channel"
    }

    async fn next_event(&mut self) -> Option<AnnounceEvent> {
        self.rx.recv().await
    }

    async fn close(&mut self) {
        self.rx.close();
    }
}
