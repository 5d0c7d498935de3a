//! TCP feed: the discovery sidecar connects and streams frames.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use super::frame::{read_frame, write_frame, Frame};
use super::{AnnounceEvent, AnnounceFeed, FeedError};
use crate::retry::RetryPolicy;

/// Events buffered between connections and the ingest loop.
const EVENT_BUFFER: usize = 1024;

/// Pause after a failed accept (e.g. out of file descriptors).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Listens for sidecar connections and turns `Metadata` frames into events.
///
/// `AnnouncePeer` frames are answered on the same connection with a
/// `RequestMetadata` frame so the sidecar goes and fetches the metadata.
pub struct SocketFeed {
    local_addr: SocketAddr,
    events: mpsc::Receiver<AnnounceEvent>,
    accept_task: Option<JoinHandle<()>>,
}

impl SocketFeed {
    /// Bind the listener, retrying while the address is still in use (a
    /// predecessor process may not have released it yet).
    pub async fn bind(addr: SocketAddr, retry: &RetryPolicy) -> Result<Self, FeedError> {
        let listener = retry.run("bind", || TcpListener::bind(addr)).await?;
        let local_addr = listener.local_addr()?;

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let accept_task = tokio::spawn(accept_loop(listener, tx));

        info!(%local_addr, "Listening for announcements");

        Ok(Self {
            local_addr,
            events: rx,
            accept_task: Some(accept_task),
        })
    }

    /// The bound address (useful when binding port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[async_trait]
impl AnnounceFeed for SocketFeed {
    fn name(&self) -> &'static str {
        "socket"
    }

    async fn next_event(&mut self) -> Option<AnnounceEvent> {
        self.events.recv().await
    }

    async fn close(&mut self) {
        if let Some(task) = self.accept_task.take() {
            task.abort();
            // Wait for the task to drop the listener so the port is free.
            let _ = task.await;
            self.events.close();

            let mut discarded = 0usize;
            while self.events.try_recv().is_ok() {
                discarded += 1;
            }
            if discarded > 0 {
                warn!(discarded, "Dropped buffered announcements on close");
            }
            info!(local_addr = %self.local_addr, "Announcement listener closed");
        }
    }
}

impl Drop for SocketFeed {
    fn drop(&mut self) {
        if let Some(task) = self.accept_task.take() {
            task.abort();
        }
    }
}

async fn accept_loop(listener: TcpListener, events: mpsc::Sender<AnnounceEvent>) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "Sidecar connected");
                    connections.spawn(handle_connection(stream, peer, events.clone()));
                }
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    events: mpsc::Sender<AnnounceEvent>,
) {
    let (read_half, mut write_half) = stream.split();
    let mut reader = BufReader::new(read_half);

    loop {
        match read_frame(&mut reader).await {
            Ok(None) => {
                debug!(%peer, "Sidecar disconnected");
                break;
            }
            Ok(Some(Frame::Metadata {
                content_id,
                payload,
            })) => {
                if events
                    .send(AnnounceEvent::new(content_id, payload))
                    .await
                    .is_err()
                {
                    debug!(%peer, "Feed closed, dropping connection");
                    break;
                }
            }
            Ok(Some(Frame::AnnouncePeer(announce))) => {
                debug!(
                    content_id = %announce.content_id,
                    announcer = %announce.peer,
                    "Peer announce, requesting metadata"
                );
                if let Err(e) = write_frame(&mut write_half, &Frame::RequestMetadata(announce)).await
                {
                    warn!(%peer, error = %e, "Failed to forward metadata request");
                    break;
                }
            }
            Ok(Some(Frame::RequestMetadata(_))) => {
                debug!(%peer, "Ignoring metadata request sent to the spider");
            }
            Err(e) => {
                warn!(%peer, error = %e, "Malformed frame, closing connection");
                break;
            }
        }
    }
}
