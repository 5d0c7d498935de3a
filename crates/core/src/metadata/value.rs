//! Dynamically-typed view of a decoded bencoded payload.

use std::collections::BTreeMap;

use serde_bencode::value::Value as BencodeValue;

use super::MetadataError;

/// A decoded bencode value.
///
/// Bencode has no separate string type: text fields arrive as `Bytes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataValue {
    Bytes(Vec<u8>),
    Integer(i64),
    List(Vec<MetadataValue>),
    Dict(BTreeMap<Vec<u8>, MetadataValue>),
}

impl MetadataValue {
    /// Decode raw bencoded bytes.
    pub fn decode(raw: &[u8]) -> Result<Self, MetadataError> {
        let value: BencodeValue =
            serde_bencode::from_bytes(raw).map_err(|e| MetadataError::Decode(e.to_string()))?;
        Ok(value.into())
    }

    /// Encode back to bencoded bytes.
    pub fn encode(&self) -> Result<Vec<u8>, MetadataError> {
        serde_bencode::to_bytes(&BencodeValue::from(self.clone()))
            .map_err(|e| MetadataError::Decode(e.to_string()))
    }

    /// Build a dictionary from `(key, value)` pairs.
    pub fn dict<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, MetadataValue)>,
        K: Into<Vec<u8>>,
    {
        Self::Dict(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn list<I: IntoIterator<Item = MetadataValue>>(items: I) -> Self {
        Self::List(items.into_iter().collect())
    }

    /// Human-readable name of the variant, used in validation errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bytes(_) => "string",
            Self::Integer(_) => "integer",
            Self::List(_) => "list",
            Self::Dict(_) => "dictionary",
        }
    }

    /// Look up a key if this is a dictionary.
    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        match self {
            Self::Dict(entries) => entries.get(key.as_bytes()),
            _ => None,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        Self::Bytes(s.as_bytes().to_vec())
    }
}

impl From<i64> for MetadataValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<BencodeValue> for MetadataValue {
    fn from(value: BencodeValue) -> Self {
        match value {
            BencodeValue::Bytes(bytes) => Self::Bytes(bytes),
            BencodeValue::Int(n) => Self::Integer(n),
            BencodeValue::List(items) => Self::List(items.into_iter().map(Into::into).collect()),
            BencodeValue::Dict(entries) => {
                Self::Dict(entries.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<MetadataValue> for BencodeValue {
    fn from(value: MetadataValue) -> Self {
        match value {
            MetadataValue::Bytes(bytes) => BencodeValue::Bytes(bytes),
            MetadataValue::Integer(n) => BencodeValue::Int(n),
            MetadataValue::List(items) => {
                BencodeValue::List(items.into_iter().map(Into::into).collect())
            }
            MetadataValue::Dict(entries) => {
                BencodeValue::Dict(entries.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}
