//! Types for the torrent catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metadata::ContentId;

/// A persisted torrent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Storage identifier, referenced by file rows.
    pub id: i64,
    pub content_id: ContentId,
    pub name: String,
    pub has_files: bool,
    pub total_length_bytes: u64,
    /// Frequency-ordered tokens of the name and file paths.
    pub search_index: String,
    /// When the entry was created.
    pub first_seen: DateTime<Utc>,
    /// When the content id was last announced.
    pub last_seen: DateTime<Utc>,
    /// Number of announcements observed, including the first.
    pub announce_count: u64,
}

/// A file row belonging to a [`CatalogEntry`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogFile {
    /// Zero-based position in the declared file list.
    pub position: u32,
    /// Path segments joined by `/`.
    pub relative_path: String,
    pub length_bytes: u64,
}

/// Result of a successful upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UpsertOutcome {
    /// A new entry was inserted.
    Created { id: i64 },
    /// An existing entry was touched.
    Updated { id: i64, announce_count: u64 },
}

impl UpsertOutcome {
    pub fn is_new(&self) -> bool {
        matches!(self, Self::Created { .. })
    }

    pub fn id(&self) -> i64 {
        match self {
            Self::Created { id } | Self::Updated { id, .. } => *id,
        }
    }
}

/// Catalog statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogStats {
    /// Distinct content ids.
    pub total_torrents: u64,
    /// File rows across all entries.
    pub total_files: u64,
    /// Sum of entry lengths.
    pub total_length_bytes: u64,
    /// Sum of announce counts.
    pub total_announces: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_entry: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_entry: Option<DateTime<Utc>>,
}

/// Errors for catalog operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    Database(String),

    /// The database was busy or locked by another writer.
    #[error("Database busy: {0}")]
    Busy(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Catalog is closed")]
    Closed,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CatalogError {
    /// Whether the error is expected to clear up on its own.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Busy(_))
    }
}
