//! SQLite-backed torrent catalog implementation.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{
    params, Connection, ErrorCode, OptionalExtension, Transaction, TransactionBehavior,
};

use super::{CatalogEntry, CatalogError, CatalogFile, CatalogStats, TorrentCatalog, UpsertOutcome};
use crate::indexer::build_search_index;
use crate::metadata::{ContentId, TorrentRecord};

/// Busy timeout used when none is configured.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const ENTRY_COLUMNS: &str = "id, content_id, name, has_files, total_length_bytes, search_index, \
                             first_seen, last_seen, announce_count";

/// SQLite-backed torrent catalog.
///
/// Holds a single connection; SQLite serializes writers anyway. The busy
/// timeout lets two processes sharing the file (a predecessor and its
/// successor) wait for each other instead of failing.
pub struct SqliteCatalog {
    conn: Mutex<Option<Connection>>,
}

impl SqliteCatalog {
    /// Open the catalog at `path`, creating the file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, CatalogError> {
        Self::open(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open the catalog with an explicit busy timeout.
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self, CatalogError> {
        let conn = Connection::open(path).map_err(db_error)?;
        conn.busy_timeout(busy_timeout).map_err(db_error)?;
        let _mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(db_error)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Create an in-memory SQLite catalog (useful for testing).
    pub fn in_memory() -> Result<Self, CatalogError> {
        let conn = Connection::open_in_memory().map_err(db_error)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), CatalogError> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            -- One row per distinct content id
            CREATE TABLE IF NOT EXISTS torrents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                content_id TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                has_files INTEGER NOT NULL DEFAULT 0,
                total_length_bytes INTEGER NOT NULL,
                first_seen TEXT NOT NULL,
                last_seen TEXT NOT NULL,
                announce_count INTEGER NOT NULL DEFAULT 1,
                search_index TEXT NOT NULL DEFAULT ''
            );

            CREATE INDEX IF NOT EXISTS idx_torrents_last_seen ON torrents(last_seen);

            -- Files of multi-file torrents, in declared order
            CREATE TABLE IF NOT EXISTS torrent_files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                torrent_id INTEGER NOT NULL REFERENCES torrents(id) ON DELETE CASCADE,
                position INTEGER NOT NULL,
                relative_path TEXT NOT NULL,
                length_bytes INTEGER NOT NULL,
                UNIQUE(torrent_id, position)
            );

            CREATE INDEX IF NOT EXISTS idx_torrent_files_torrent ON torrent_files(torrent_id);
            "#,
        )
        .map_err(db_error)?;

        Ok(())
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, CatalogError>,
    ) -> Result<T, CatalogError> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| CatalogError::Internal("catalog lock poisoned".to_string()))?;
        let conn = guard.as_mut().ok_or(CatalogError::Closed)?;
        f(conn)
    }

    fn find_id(tx: &Transaction<'_>, content_id: &str) -> Result<Option<i64>, CatalogError> {
        tx.query_row(
            "SELECT id FROM torrents WHERE content_id = ?",
            params![content_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(db_error)
    }

    fn touch(tx: &Transaction<'_>, id: i64, now: &str) -> Result<UpsertOutcome, CatalogError> {
        let announce_count: i64 = tx
            .query_row(
                "UPDATE torrents SET last_seen = ?1, announce_count = announce_count + 1
                 WHERE id = ?2 RETURNING announce_count",
                params![now, id],
                |row| row.get(0),
            )
            .map_err(db_error)?;

        Ok(UpsertOutcome::Updated {
            id,
            announce_count: announce_count as u64,
        })
    }

    fn insert(
        tx: &Transaction<'_>,
        content_id: &str,
        record: &TorrentRecord,
        now: &str,
    ) -> Result<Option<i64>, CatalogError> {
        let total_length = to_sql_length(record.total_length_bytes)?;
        let search_index = build_search_index(&record.index_text());

        let inserted = tx.execute(
            "INSERT INTO torrents (content_id, name, has_files, total_length_bytes,
                                   first_seen, last_seen, announce_count, search_index)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5, 1, ?6)",
            params![
                content_id,
                &record.name,
                record.has_files(),
                total_length,
                now,
                &search_index,
            ],
        );

        match inserted {
            Ok(_) => {}
            Err(e) if e.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) => {
                return Ok(None);
            }
            Err(e) => return Err(db_error(e)),
        }

        let id = tx.last_insert_rowid();

        if record.has_files() {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO torrent_files (torrent_id, position, relative_path, length_bytes)
                     VALUES (?, ?, ?, ?)",
                )
                .map_err(db_error)?;

            for (position, file) in record.files.iter().enumerate() {
                stmt.execute(params![
                    id,
                    position as i64,
                    file.relative_path(),
                    to_sql_length(file.length_bytes)?,
                ])
                .map_err(db_error)?;
            }
        }

        Ok(Some(id))
    }

    fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<CatalogEntry> {
        let content_id: String = row.get(1)?;
        let content_id: ContentId = content_id
            .parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;
        let total_length_bytes: i64 = row.get(4)?;
        let first_seen: String = row.get(6)?;
        let last_seen: String = row.get(7)?;
        let announce_count: i64 = row.get(8)?;

        Ok(CatalogEntry {
            id: row.get(0)?,
            content_id,
            name: row.get(2)?,
            has_files: row.get(3)?,
            total_length_bytes: total_length_bytes as u64,
            search_index: row.get(5)?,
            first_seen: parse_timestamp(&first_seen),
            last_seen: parse_timestamp(&last_seen),
            announce_count: announce_count as u64,
        })
    }
}

impl TorrentCatalog for SqliteCatalog {
    fn upsert(&self, record: &TorrentRecord) -> Result<UpsertOutcome, CatalogError> {
        self.with_conn(|conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(db_error)?;
            let content_id = record.content_id.to_hex();
            let now = Utc::now().to_rfc3339();

            let outcome = match Self::find_id(&tx, &content_id)? {
                Some(id) => Self::touch(&tx, id, &now)?,
                None => match Self::insert(&tx, &content_id, record, &now)? {
                    Some(id) => UpsertOutcome::Created { id },
                    None => {
                        // Lost an insert race: the row exists now.
                        let id = Self::find_id(&tx, &content_id)?.ok_or_else(|| {
                            CatalogError::Internal(format!(
                                "{} violated uniqueness but is missing",
                                content_id
                            ))
                        })?;
                        Self::touch(&tx, id, &now)?
                    }
                },
            };

            tx.commit().map_err(db_error)?;
            Ok(outcome)
        })
    }

    fn get(&self, content_id: &ContentId) -> Result<CatalogEntry, CatalogError> {
        let content_id = content_id.to_hex();
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM torrents WHERE content_id = ?", ENTRY_COLUMNS),
                params![&content_id],
                Self::row_to_entry,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => CatalogError::NotFound(content_id.clone()),
                _ => db_error(e),
            })
        })
    }

    fn files(&self, entry_id: i64) -> Result<Vec<CatalogFile>, CatalogError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT position, relative_path, length_bytes FROM torrent_files
                     WHERE torrent_id = ? ORDER BY position",
                )
                .map_err(db_error)?;

            let rows = stmt
                .query_map(params![entry_id], |row| {
                    let position: i64 = row.get(0)?;
                    let length_bytes: i64 = row.get(2)?;
                    Ok(CatalogFile {
                        position: position as u32,
                        relative_path: row.get(1)?,
                        length_bytes: length_bytes as u64,
                    })
                })
                .map_err(db_error)?;

            let mut files = Vec::new();
            for row in rows {
                files.push(row.map_err(db_error)?);
            }
            Ok(files)
        })
    }

    fn stats(&self) -> Result<CatalogStats, CatalogError> {
        self.with_conn(|conn| {
            let (total_torrents, total_length_bytes, total_announces, oldest, newest): (
                i64,
                i64,
                i64,
                Option<String>,
                Option<String>,
            ) = conn
                .query_row(
                    "SELECT COUNT(*), COALESCE(SUM(total_length_bytes), 0),
                            COALESCE(SUM(announce_count), 0), MIN(first_seen), MAX(last_seen)
                     FROM torrents",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
                )
                .map_err(db_error)?;

            let total_files: i64 = conn
                .query_row("SELECT COUNT(*) FROM torrent_files", [], |row| row.get(0))
                .map_err(db_error)?;

            Ok(CatalogStats {
                total_torrents: total_torrents as u64,
                total_files: total_files as u64,
                total_length_bytes: total_length_bytes as u64,
                total_announces: total_announces as u64,
                oldest_entry: oldest.as_deref().map(parse_timestamp),
                newest_entry: newest.as_deref().map(parse_timestamp),
            })
        })
    }

    fn close(&self) -> Result<(), CatalogError> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| CatalogError::Internal("catalog lock poisoned".to_string()))?;
        match guard.take() {
            Some(conn) => conn.close().map_err(|(_, e)| db_error(e)),
            None => Ok(()),
        }
    }
}

/// Map a rusqlite error, separating lock contention from other failures.
fn db_error(e: rusqlite::Error) -> CatalogError {
    match e.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
            CatalogError::Busy(e.to_string())
        }
        _ => CatalogError::Database(e.to_string()),
    }
}

fn to_sql_length(length: u64) -> Result<i64, CatalogError> {
    i64::try_from(length)
        .map_err(|_| CatalogError::Internal(format!("length {} does not fit in INTEGER", length)))
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
