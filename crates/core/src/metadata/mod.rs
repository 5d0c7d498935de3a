//! Torrent metadata - decoding and normalization of announced info dictionaries.
//!
//! Announcements arrive as raw bencoded bytes. They are decoded into a
//! [`MetadataValue`] tree and then validated in a single pass into a
//! canonical [`TorrentRecord`].

mod normalize;
mod types;
mod value;

pub use normalize::{decode_and_normalize, normalize};
pub use types::*;
pub use value::MetadataValue;

use thiserror::Error;

/// Errors raised while validating an announcement.
///
/// These are per-event: the offending announcement is dropped and ingestion
/// carries on with the next one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    #[error("Failed to decode metadata: {0}")]
    Decode(String),

    #[error("Metadata is not a dictionary (found {0})")]
    NotADictionary(&'static str),

    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Invalid field {field}: expected {expected}, found {found}")]
    WrongType {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Negative length in {field}: {value}")]
    NegativeLength { field: String, value: i64 },

    #[error("Total length overflows")]
    LengthOverflow,
}
