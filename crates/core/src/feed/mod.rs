//! Announcement feeds - where ingestion gets its events from.
//!
//! The discovery subsystem (DHT crawling, peer wire, metadata exchange) is
//! out of process. It hands over fetched metadata either through an
//! in-process channel ([`ChannelFeed`]) or over TCP ([`SocketFeed`]).

mod channel;
mod frame;
mod socket;

pub use channel::{channel_feed, ChannelFeed, FeedSender};
pub use frame::{read_frame, write_frame, Frame, FrameError, MAX_PAYLOAD_LEN};
pub use socket::SocketFeed;

use std::net::SocketAddr;

use async_trait::async_trait;
use thiserror::Error;

use crate::metadata::ContentId;
use crate::retry::RetryError;

/// Metadata fetched for a content id, still encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnounceEvent {
    pub content_id: ContentId,
    pub raw_metadata: Vec<u8>,
}

impl AnnounceEvent {
    pub fn new(content_id: ContentId, raw_metadata: impl Into<Vec<u8>>) -> Self {
        Self {
            content_id,
            raw_metadata: raw_metadata.into(),
        }
    }
}

/// A peer announced it has the content; discovery should fetch its metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerAnnounce {
    pub content_id: ContentId,
    pub peer: SocketAddr,
}

/// A source of announcement events.
///
/// Delivery is at-least-once and in no particular order.
#[async_trait]
pub trait AnnounceFeed: Send {
    /// Returns the name of this feed implementation.
    fn name(&self) -> &'static str;

    /// Wait for the next event. `None` means the feed is exhausted.
    async fn next_event(&mut self) -> Option<AnnounceEvent>;

    /// Release the feed's resources (listening socket, channel).
    async fn close(&mut self) {}
}

/// Errors for feed setup and delivery.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Failed to bind listener: {0}")]
    Bind(#[from] RetryError<std::io::Error>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Feed is closed")]
    Closed,
}
