//! Canonical torrent types produced by normalization.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Length of a v1 info hash in bytes.
pub const CONTENT_ID_LEN: usize = 20;

/// The 20-byte identifier of a torrent's metadata (its info hash).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentId([u8; CONTENT_ID_LEN]);

/// Errors building a [`ContentId`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentIdError {
    #[error("Content id must be {CONTENT_ID_LEN} bytes, got {0}")]
    InvalidLength(usize),

    #[error("Invalid hex content id: {0}")]
    InvalidHex(String),
}

impl ContentId {
    pub fn new(bytes: [u8; CONTENT_ID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, ContentIdError> {
        let array: [u8; CONTENT_ID_LEN] = bytes
            .try_into()
            .map_err(|_| ContentIdError::InvalidLength(bytes.len()))?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; CONTENT_ID_LEN] {
        &self.0
    }

    /// Lowercase hex representation, as persisted in the catalog.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentId({})", self.to_hex())
    }
}

impl FromStr for ContentId {
    type Err = ContentIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; CONTENT_ID_LEN];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| ContentIdError::InvalidHex(format!("{}: {}", s, e)))?;
        Ok(Self(bytes))
    }
}

impl Serialize for ContentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A file within a multi-file torrent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Path segments in declared order.
    pub path: Vec<String>,
    /// File size in bytes.
    pub length_bytes: u64,
}

impl FileEntry {
    /// Segments joined with `/`.
    pub fn relative_path(&self) -> String {
        self.path.join("/")
    }
}

/// Normalized descriptive fields of an announced torrent.
///
/// Store-owned fields (search index, timestamps, announce count) are added
/// when the record is persisted; see `CatalogEntry`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentRecord {
    pub content_id: ContentId,
    pub name: String,
    /// Declared single-file length, or the sum of all file lengths.
    pub total_length_bytes: u64,
    /// Files in declared order (empty for single-file torrents).
    pub files: Vec<FileEntry>,
}

impl TorrentRecord {
    pub fn has_files(&self) -> bool {
        !self.files.is_empty()
    }

    /// Text the search index is derived from: the name followed by every
    /// path segment, space separated.
    pub fn index_text(&self) -> String {
        let mut text = self.name.clone();
        for file in &self.files {
            for segment in &file.path {
                text.push(' ');
                text.push_str(segment);
            }
        }
        text
    }
}
