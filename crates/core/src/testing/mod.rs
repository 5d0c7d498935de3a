//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the catalog and respawner
//! traits, plus fixtures that build bencoded announcement payloads, so the
//! ingest pipeline can be tested without a database or child processes.
//!
//! # Example
//!
//! ```rust,ignore
//! use trawler_core::testing::{fixtures, MockCatalog};
//!
//! let catalog = Arc::new(MockCatalog::new());
//! let mut ingest = IngestLoop::new(catalog.clone(), RetryPolicy::once());
//! ingest.process_event(AnnounceEvent::new(id, fixtures::single_file("Sample", 1024))).await;
//! ```

mod mock_catalog;
mod mock_respawner;

pub use mock_catalog::MockCatalog;
pub use mock_respawner::MockRespawner;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::metadata::{ContentId, CONTENT_ID_LEN};

    /// A content id filled with `byte`.
    pub fn content_id(byte: u8) -> ContentId {
        ContentId::new([byte; CONTENT_ID_LEN])
    }

    /// Bencoded info dictionary of a single-file torrent.
    pub fn single_file(name: &str, length: i64) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(format!("d6:lengthi{}e", length).as_bytes());
        push_str(&mut out, "name");
        push_str(&mut out, name);
        out.push(b'e');
        out
    }

    /// Bencoded info dictionary of a multi-file torrent.
    ///
    /// Each file is `(path segments, length)`.
    pub fn multi_file(name: &str, files: &[(&[&str], i64)]) -> Vec<u8> {
        let mut out = vec![b'd'];
        push_str(&mut out, "files");
        out.push(b'l');
        for (path, length) in files {
            out.push(b'd');
            out.extend_from_slice(format!("6:lengthi{}e", length).as_bytes());
            push_str(&mut out, "path");
            out.push(b'l');
            for segment in path.iter() {
                push_str(&mut out, segment);
            }
            out.extend_from_slice(b"ee");
        }
        out.push(b'e');
        push_str(&mut out, "name");
        push_str(&mut out, name);
        out.push(b'e');
        out
    }

    fn push_str(out: &mut Vec<u8>, s: &str) {
        out.extend_from_slice(format!("{}:", s.len()).as_bytes());
        out.extend_from_slice(s.as_bytes());
    }

}
