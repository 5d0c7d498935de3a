//! Torrent catalog - the deduplicated, persistent record of every torrent
//! observed on the network.
//!
//! Each content id maps to at most one entry. The first announcement creates
//! the entry (with its file list and search index); every later announcement
//! only bumps `last_seen` and `announce_count`.

mod sqlite;
mod types;

pub use sqlite::SqliteCatalog;
pub use types::*;

use crate::metadata::{ContentId, TorrentRecord};

/// Trait for catalog storage.
pub trait TorrentCatalog: Send + Sync {
    /// Insert the record if its content id is new, otherwise record one more
    /// sighting of the existing entry.
    ///
    /// The whole operation is one transaction. A uniqueness race on insert is
    /// resolved as an update.
    fn upsert(&self, record: &TorrentRecord) -> Result<UpsertOutcome, CatalogError>;

    /// Get an entry by content id.
    fn get(&self, content_id: &ContentId) -> Result<CatalogEntry, CatalogError>;

    /// Files of an entry in declared order.
    fn files(&self, entry_id: i64) -> Result<Vec<CatalogFile>, CatalogError>;

    /// Get catalog statistics.
    fn stats(&self) -> Result<CatalogStats, CatalogError>;

    /// Release the underlying store handle. Later calls fail with
    /// [`CatalogError::Closed`]. Closing twice is a no-op.
    fn close(&self) -> Result<(), CatalogError>;
}
