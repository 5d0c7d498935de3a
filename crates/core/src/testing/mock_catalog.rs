//! Mock catalog for testing.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;

use crate::catalog::{
    CatalogEntry, CatalogError, CatalogFile, CatalogStats, TorrentCatalog, UpsertOutcome,
};
use crate::indexer::build_search_index;
use crate::metadata::{ContentId, TorrentRecord};

#[derive(Default)]
struct MockState {
    entries: HashMap<ContentId, CatalogEntry>,
    files: HashMap<i64, Vec<CatalogFile>>,
    next_id: i64,
    failures: VecDeque<CatalogError>,
}

/// In-memory implementation of the TorrentCatalog trait.
///
/// Provides controllable behavior for testing:
/// - Queue errors to be returned by the next upserts
/// - Count upsert calls (including failed ones)
/// - Observe whether `close` was called
///
/// # Example
///
/// ```rust,ignore
/// use trawler_core::testing::MockCatalog;
///
/// let catalog = MockCatalog::new();
/// catalog.fail_next(2, CatalogError::Busy("locked".into()));
///
/// // The third upsert goes through.
/// assert!(catalog.upsert(&record).is_err());
/// assert!(catalog.upsert(&record).is_err());
/// assert!(catalog.upsert(&record).is_ok());
/// assert_eq!(catalog.upsert_count(), 3);
/// ```
#[derive(Default)]
pub struct MockCatalog {
    state: Mutex<MockState>,
    upserts: AtomicUsize,
    closed: AtomicBool,
}

impl MockCatalog {
    /// Create an empty mock catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` upserts fail with `error`.
    pub fn fail_next(&self, count: usize, error: CatalogError) {
        let mut state = self.state();
        for _ in 0..count {
            state.failures.push_back(error.clone());
        }
    }

    /// Number of upsert calls, successful or not.
    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// All stored entries, ordered by id.
    pub fn entries(&self) -> Vec<CatalogEntry> {
        let mut entries: Vec<_> = self.state().entries.values().cloned().collect();
        entries.sort_by_key(|e| e.id);
        entries
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_open(&self) -> Result<(), CatalogError> {
        if self.is_closed() {
            Err(CatalogError::Closed)
        } else {
            Ok(())
        }
    }
}

impl TorrentCatalog for MockCatalog {
    fn upsert(&self, record: &TorrentRecord) -> Result<UpsertOutcome, CatalogError> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.ensure_open()?;

        let mut state = self.state();
        if let Some(error) = state.failures.pop_front() {
            return Err(error);
        }

        let now = Utc::now();
        if let Some(entry) = state.entries.get_mut(&record.content_id) {
            entry.announce_count += 1;
            entry.last_seen = now;
            return Ok(UpsertOutcome::Updated {
                id: entry.id,
                announce_count: entry.announce_count,
            });
        }

        state.next_id += 1;
        let id = state.next_id;
        state.entries.insert(
            record.content_id,
            CatalogEntry {
                id,
                content_id: record.content_id,
                name: record.name.clone(),
                has_files: record.has_files(),
                total_length_bytes: record.total_length_bytes,
                search_index: build_search_index(&record.index_text()),
                first_seen: now,
                last_seen: now,
                announce_count: 1,
            },
        );
        state.files.insert(
            id,
            record
                .files
                .iter()
                .enumerate()
                .map(|(position, file)| CatalogFile {
                    position: position as u32,
                    relative_path: file.relative_path(),
                    length_bytes: file.length_bytes,
                })
                .collect(),
        );

        Ok(UpsertOutcome::Created { id })
    }

    fn get(&self, content_id: &ContentId) -> Result<CatalogEntry, CatalogError> {
        self.ensure_open()?;
        self.state()
            .entries
            .get(content_id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(content_id.to_hex()))
    }

    fn files(&self, entry_id: i64) -> Result<Vec<CatalogFile>, CatalogError> {
        self.ensure_open()?;
        Ok(self
            .state()
            .files
            .get(&entry_id)
            .cloned()
            .unwrap_or_default())
    }

    fn stats(&self) -> Result<CatalogStats, CatalogError> {
        self.ensure_open()?;
        let state = self.state();
        Ok(CatalogStats {
            total_torrents: state.entries.len() as u64,
            total_files: state.files.values().map(|f| f.len() as u64).sum(),
            total_length_bytes: state.entries.values().map(|e| e.total_length_bytes).sum(),
            total_announces: state.entries.values().map(|e| e.announce_count).sum(),
            oldest_entry: state.entries.values().map(|e| e.first_seen).min(),
            newest_entry: state.entries.values().map(|e| e.last_seen).max(),
        })
    }

    fn close(&self) -> Result<(), CatalogError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
