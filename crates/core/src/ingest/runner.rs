//! The single-consumer ingest loop.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::{EventOutcome, ExitReason, IngestStats, LoopExit};
use crate::catalog::{TorrentCatalog, UpsertOutcome};
use crate::feed::{AnnounceEvent, AnnounceFeed};
use crate::metadata::decode_and_normalize;
use crate::metrics::{ANNOUNCEMENTS_TOTAL, UPSERT_DURATION};
use crate::retry::RetryPolicy;

/// Consumes a feed and writes every valid announcement to the catalog.
pub struct IngestLoop {
    catalog: Arc<dyn TorrentCatalog>,
    retry: RetryPolicy,
    restart_after: Option<u64>,
    stats: IngestStats,
}

impl IngestLoop {
    pub fn new(catalog: Arc<dyn TorrentCatalog>, retry: RetryPolicy) -> Self {
        Self {
            catalog,
            retry,
            restart_after: None,
            stats: IngestStats::default(),
        }
    }

    /// Return [`ExitReason::RestartThresholdReached`] once this many events
    /// have been stored.
    pub fn with_restart_threshold(mut self, after_events: u64) -> Self {
        self.restart_after = Some(after_events);
        self
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    /// Run until a stop signal, the end of the feed, or the restart threshold.
    ///
    /// A closed or lagged stop channel counts as a stop signal.
    pub async fn run<F>(&mut self, feed: &mut F, shutdown: &mut broadcast::Receiver<()>) -> LoopExit
    where
        F: AnnounceFeed + ?Sized,
    {
        info!(feed = feed.name(), restart_after = ?self.restart_after, "Ingest loop started");

        let reason = loop {
            if self
                .restart_after
                .is_some_and(|threshold| self.stats.observed() >= threshold)
            {
                info!(
                    observed = self.stats.observed(),
                    "Restart threshold reached"
                );
                break ExitReason::RestartThresholdReached;
            }

            let event = tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!("Stop signal received");
                    break ExitReason::Shutdown;
                }
                event = feed.next_event() => event,
            };

            match event {
                Some(event) => {
                    self.process_event(event).await;
                }
                None => {
                    info!(feed = feed.name(), "Feed closed");
                    break ExitReason::FeedClosed;
                }
            }
        };

        LoopExit {
            reason,
            stats: self.stats,
        }
    }

    /// Handle one event end to end.
    pub async fn process_event(&mut self, event: AnnounceEvent) -> EventOutcome {
        self.stats.received += 1;
        let content_id = event.content_id;

        let outcome = match decode_and_normalize(content_id, &event.raw_metadata) {
            Ok(None) => {
                debug!(%content_id, "Announcement has no name, skipping");
                self.stats.skipped += 1;
                EventOutcome::Skipped
            }
            Err(e) => {
                warn!(%content_id, error = %e, "Rejected announcement");
                self.stats.rejected += 1;
                EventOutcome::Rejected(e)
            }
            Ok(Some(record)) => {
                let catalog = &self.catalog;
                let record = &record;

                let timer = UPSERT_DURATION.start_timer();
                let result = self
                    .retry
                    .run("upsert", || async move { catalog.upsert(record) })
                    .await;
                timer.observe_duration();

                match result {
                    Ok(UpsertOutcome::Created { id }) => {
                        info!(
                            %content_id,
                            id,
                            name = %record.name,
                            total_length_bytes = record.total_length_bytes,
                            files = record.files.len(),
                            "New torrent"
                        );
                        self.stats.created += 1;
                        EventOutcome::Created { id }
                    }
                    Ok(UpsertOutcome::Updated { id, announce_count }) => {
                        info!(%content_id, id, announce_count, "Torrent seen again");
                        self.stats.updated += 1;
                        EventOutcome::Updated { id, announce_count }
                    }
                    Err(e) => {
                        error!(
                            %content_id,
                            attempts = e.attempts,
                            transient = e.source.is_transient(),
                            error = %e.source,
                            "Failed to store announcement"
                        );
                        self.stats.failed += 1;
                        EventOutcome::Failed(e)
                    }
                }
            }
        };

        ANNOUNCEMENTS_TOTAL
            .with_label_values(&[outcome.label()])
            .inc();
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::catalog::CatalogError;
    use crate::feed::channel_feed;
    use crate::metadata::{ContentId, CONTENT_ID_LEN};
    use crate::testing::{fixtures, MockCatalog};

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(5))
    }

    fn id(byte: u8) -> ContentId {
        ContentId::new([byte; CONTENT_ID_LEN])
    }

    #[tokio::test]
    async fn test_process_created_then_updated() {
        let catalog = Arc::new(MockCatalog::new());
        let mut ingest = IngestLoop::new(catalog.clone(), fast_retry());
        let raw = fixtures::single_file("Sample", 1024);

        let first = ingest.process_event(AnnounceEvent::new(id(1), raw.clone())).await;
        let second = ingest.process_event(AnnounceEvent::new(id(1), raw)).await;

        assert!(matches!(first, EventOutcome::Created { .. }));
        assert!(matches!(
            second,
            EventOutcome::Updated {
                announce_count: 2,
                ..
            }
        ));
        assert_eq!(ingest.stats().created, 1);
        assert_eq!(ingest.stats().updated, 1);
        assert_eq!(catalog.upsert_count(), 2);
    }

    #[tokio::test]
    async fn test_nameless_event_skipped_without_store_call() {
        let catalog = Arc::new(MockCatalog::new());
        let mut ingest = IngestLoop::new(catalog.clone(), fast_retry());

        let outcome = ingest
            .process_event(AnnounceEvent::new(id(2), b"d6:lengthi5ee".to_vec()))
            .await;

        assert!(matches!(outcome, EventOutcome::Skipped));
        assert_eq!(ingest.stats().skipped, 1);
        assert_eq!(catalog.upsert_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_event_rejected() {
        let catalog = Arc::new(MockCatalog::new());
        let mut ingest = IngestLoop::new(catalog.clone(), fast_retry());

        let outcome = ingest
            .process_event(AnnounceEvent::new(id(3), b"not bencode".to_vec()))
            .await;

        assert!(matches!(outcome, EventOutcome::Rejected(_)));
        assert_eq!(ingest.stats().rejected, 1);
        assert_eq!(catalog.upsert_count(), 0);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let catalog = Arc::new(MockCatalog::new());
        catalog.fail_next(2, CatalogError::Busy("database is locked".into()));
        let mut ingest = IngestLoop::new(catalog.clone(), fast_retry());

        let outcome = ingest
            .process_event(AnnounceEvent::new(id(4), fixtures::single_file("Retry", 1)))
            .await;

        assert!(matches!(outcome, EventOutcome::Created { .. }));
        assert_eq!(catalog.upsert_count(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail_only_that_event() {
        let catalog = Arc::new(MockCatalog::new());
        catalog.fail_next(3, CatalogError::Database("disk I/O error".into()));
        let mut ingest = IngestLoop::new(catalog.clone(), fast_retry());

        let failed = ingest
            .process_event(AnnounceEvent::new(id(5), fixtures::single_file("Lost", 1)))
            .await;
        let next = ingest
            .process_event(AnnounceEvent::new(id(6), fixtures::single_file("Kept", 1)))
            .await;

        match failed {
            EventOutcome::Failed(e) => {
                assert_eq!(e.attempts, 3);
                assert!(!e.source.is_transient());
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(matches!(next, EventOutcome::Created { .. }));
        assert_eq!(ingest.stats().failed, 1);
        assert_eq!(ingest.stats().created, 1);
    }

    #[tokio::test]
    async fn test_lock_contention_exhausted_is_transient() {
        let catalog = Arc::new(MockCatalog::new());
        catalog.fail_next(3, CatalogError::Busy("database is locked".into()));
        let mut ingest = IngestLoop::new(catalog.clone(), fast_retry());

        let outcome = ingest
            .process_event(AnnounceEvent::new(id(7), fixtures::single_file("Busy", 1)))
            .await;

        match outcome {
            EventOutcome::Failed(e) => {
                assert_eq!(e.attempts, 3);
                assert!(e.source.is_transient());
                assert_eq!(e.operation, "upsert");
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(ingest.stats().failed, 1);
        assert_eq!(catalog.upsert_count(), 3);
    }

    #[tokio::test]
    async fn test_run_until_feed_closed() {
        let catalog = Arc::new(MockCatalog::new());
        let (sender, mut feed) = channel_feed(16);
        let (_shutdown_tx, mut shutdown_rx) = broadcast::channel(1);

        sender
            .announce(id(1), fixtures::single_file("One", 1))
            .await
            .unwrap();
        sender.announce(id(2), b"garbage".to_vec()).await.unwrap();
        sender
            .announce(id(1), fixtures::single_file("One", 1))
            .await
            .unwrap();
        drop(sender);

        let mut ingest = IngestLoop::new(catalog, fast_retry());
        let exit = ingest.run(&mut feed, &mut shutdown_rx).await;

        assert_eq!(exit.reason, ExitReason::FeedClosed);
        assert_eq!(exit.stats.received, 3);
        assert_eq!(exit.stats.created, 1);
        assert_eq!(exit.stats.updated, 1);
        assert_eq!(exit.stats.rejected, 1);
    }

    #[tokio::test]
    async fn test_stop_signal_before_events() {
        let catalog = Arc::new(MockCatalog::new());
        let (sender, mut feed) = channel_feed(16);
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);

        sender
            .announce(id(1), fixtures::single_file("Pending", 1))
            .await
            .unwrap();
        shutdown_tx.send(()).unwrap();

        let mut ingest = IngestLoop::new(catalog.clone(), fast_retry());
        let exit = ingest.run(&mut feed, &mut shutdown_rx).await;

        assert_eq!(exit.reason, ExitReason::Shutdown);
        assert_eq!(exit.stats.received, 0);
        assert_eq!(catalog.upsert_count(), 0);
    }

    #[tokio::test]
    async fn test_restart_threshold_counts_observed_events_only() {
        let catalog = Arc::new(MockCatalog::new());
        let (sender, mut feed) = channel_feed(16);
        let (_shutdown_tx, mut shutdown_rx) = broadcast::channel(1);

        sender.announce(id(1), b"bad".to_vec()).await.unwrap();
        for byte in 10..15 {
            sender
                .announce(id(byte), fixtures::single_file("Item", 1))
                .await
                .unwrap();
        }

        let mut ingest = IngestLoop::new(catalog, fast_retry()).with_restart_threshold(3);
        let exit = ingest.run(&mut feed, &mut shutdown_rx).await;

        assert_eq!(exit.reason, ExitReason::RestartThresholdReached);
        assert_eq!(exit.stats.observed(), 3);
        assert_eq!(exit.stats.received, 4);
    }
}
