//! Types for the ingest loop.

use serde::{Deserialize, Serialize};

use crate::catalog::CatalogError;
use crate::metadata::MetadataError;
use crate::retry::RetryError;

/// Per-instance ingestion counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    /// Events taken from the feed.
    pub received: u64,
    /// Events that created a new catalog entry.
    pub created: u64,
    /// Events that touched an existing entry.
    pub updated: u64,
    /// Events without a name.
    pub skipped: u64,
    /// Events that failed validation.
    pub rejected: u64,
    /// Events whose upsert failed after all retries.
    pub failed: u64,
}

impl IngestStats {
    /// Events whose upsert succeeded.
    pub fn observed(&self) -> u64 {
        self.created + self.updated
    }

    pub fn merge(&mut self, other: &IngestStats) {
        self.received += other.received;
        self.created += other.created;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.rejected += other.rejected;
        self.failed += other.failed;
    }
}

/// What happened to a single event.
#[derive(Debug)]
pub enum EventOutcome {
    Created { id: i64 },
    Updated { id: i64, announce_count: u64 },
    Skipped,
    Rejected(MetadataError),
    Failed(RetryError<CatalogError>),
}

impl EventOutcome {
    /// Metric label for this outcome.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Updated { .. } => "updated",
            Self::Skipped => "skipped",
            Self::Rejected(_) => "rejected",
            Self::Failed(_) => "failed",
        }
    }

    pub fn is_observed(&self) -> bool {
        matches!(self, Self::Created { .. } | Self::Updated { .. })
    }
}

/// Why the loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// A stop signal arrived.
    Shutdown,
    /// The feed has no more events.
    FeedClosed,
    /// The configured number of observed events was reached.
    RestartThresholdReached,
}

/// Result of [`IngestLoop::run`](super::IngestLoop::run).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopExit {
    pub reason: ExitReason,
    pub stats: IngestStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observed_counts_created_and_updated() {
        let stats = IngestStats {
            received: 10,
            created: 3,
            updated: 4,
            skipped: 1,
            rejected: 1,
            failed: 1,
        };
        assert_eq!(stats.observed(), 7);
    }

    #[test]
    fn test_merge() {
        let mut total = IngestStats {
            received: 1,
            created: 1,
            ..Default::default()
        };
        total.merge(&IngestStats {
            received: 2,
            updated: 1,
            failed: 1,
            ..Default::default()
        });
        assert_eq!(total.received, 3);
        assert_eq!(total.created, 1);
        assert_eq!(total.updated, 1);
        assert_eq!(total.failed, 1);
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(EventOutcome::Skipped.label(), "skipped");
        assert_eq!(EventOutcome::Created { id: 1 }.label(), "created");
        assert!(EventOutcome::Created { id: 1 }.is_observed());
        assert!(!EventOutcome::Rejected(MetadataError::LengthOverflow).is_observed());
    }

    #[test]
    fn test_exit_reason_serialization() {
        assert_eq!(
            serde_json::to_string(&ExitReason::RestartThresholdReached).unwrap(),
            "\"restart_threshold_reached\""
        );
    }
}
