//! Single-pass validation of a decoded info dictionary into a [`TorrentRecord`].

use super::types::{ContentId, FileEntry, TorrentRecord};
use super::value::MetadataValue;
use super::MetadataError;

/// Decode raw bencoded bytes and normalize them.
pub fn decode_and_normalize(
    content_id: ContentId,
    raw: &[u8],
) -> Result<Option<TorrentRecord>, MetadataError> {
    let value = MetadataValue::decode(raw)?;
    normalize(content_id, &value)
}

/// Normalize a decoded info dictionary.
///
/// Returns `Ok(None)` when the dictionary has no `name`: such announcements
/// are dropped silently. Any field present with the wrong shape is an error.
pub fn normalize(
    content_id: ContentId,
    metadata: &MetadataValue,
) -> Result<Option<TorrentRecord>, MetadataError> {
    if !matches!(metadata, MetadataValue::Dict(_)) {
        return Err(MetadataError::NotADictionary(metadata.kind()));
    }

    let name = match metadata.get("name") {
        Some(value) => text(value, "name")?,
        None => return Ok(None),
    };

    let (files, total_length_bytes) = match metadata.get("files") {
        Some(value) => parse_files(value)?,
        None => {
            let length = match metadata.get("length") {
                Some(value) => length(value, "length")?,
                None => 0,
            };
            (Vec::new(), length)
        }
    };

    Ok(Some(TorrentRecord {
        content_id,
        name,
        total_length_bytes,
        files,
    }))
}

fn parse_files(value: &MetadataValue) -> Result<(Vec<FileEntry>, u64), MetadataError> {
    let entries = match value {
        MetadataValue::List(entries) => entries,
        other => return Err(wrong_type("files", "list", other)),
    };

    let mut files = Vec::with_capacity(entries.len());
    let mut total: u64 = 0;

    for (i, entry) in entries.iter().enumerate() {
        let field = format!("files[{}]", i);
        if !matches!(entry, MetadataValue::Dict(_)) {
            return Err(wrong_type(&field, "dictionary", entry));
        }

        let length_field = format!("{}.length", field);
        let length_bytes = match entry.get("length") {
            Some(value) => length(value, &length_field)?,
            None => return Err(MetadataError::MissingField(length_field)),
        };

        let path_field = format!("{}.path", field);
        let path = match entry.get("path") {
            Some(value) => path_segments(value, &path_field)?,
            None => return Err(MetadataError::MissingField(path_field)),
        };

        total = total
            .checked_add(length_bytes)
            .filter(|sum| *sum <= i64::MAX as u64)
            .ok_or(MetadataError::LengthOverflow)?;

        files.push(FileEntry { path, length_bytes });
    }

    Ok((files, total))
}

fn path_segments(value: &MetadataValue, field: &str) -> Result<Vec<String>, MetadataError> {
    match value {
        MetadataValue::List(segments) => segments
            .iter()
            .enumerate()
            .map(|(i, segment)| text(segment, &format!("{}[{}]", field, i)))
            .collect(),
        other => Err(wrong_type(field, "list", other)),
    }
}

fn text(value: &MetadataValue, field: &str) -> Result<String, MetadataError> {
    match value {
        MetadataValue::Bytes(bytes) => Ok(String::from_utf8_lossy(bytes).into_owned()),
        other => Err(wrong_type(field, "string", other)),
    }
}

fn length(value: &MetadataValue, field: &str) -> Result<u64, MetadataError> {
    match value {
        MetadataValue::Integer(n) if *n < 0 => Err(MetadataError::NegativeLength {
            field: field.to_string(),
            value: *n,
        }),
        MetadataValue::Integer(n) => Ok(*n as u64),
        other => Err(wrong_type(field, "integer", other)),
    }
}

fn wrong_type(field: &str, expected: &'static str, found: &MetadataValue) -> MetadataError {
    MetadataError::WrongType {
        field: field.to_string(),
        expected,
        found: found.kind(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::CONTENT_ID_LEN;

    fn id() -> ContentId {
        ContentId::new([7; CONTENT_ID_LEN])
    }

    fn file(path: &[&str], length: i64) -> MetadataValue {
        MetadataValue::dict([
            ("length", MetadataValue::from(length)),
            (
                "path",
                MetadataValue::list(path.iter().map(|s| MetadataValue::from(*s))),
            ),
        ])
    }

    #[test]
    fn test_single_file() {
        let record = decode_and_normalize(id(), b"d6:lengthi1024e4:name6:Samplee")
            .unwrap()
            .unwrap();
        assert_eq!(record.name, "Sample");
        assert_eq!(record.total_length_bytes, 1024);
        assert!(!record.has_files());
    }

    #[test]
    fn test_multi_file_sums_lengths() {
        let metadata = MetadataValue::dict([
            ("name", MetadataValue::from("Pack")),
            (
                "files",
                MetadataValue::list([file(&["a", "b.txt"], 10), file(&["c.txt"], 20)]),
            ),
        ]);
        let record = normalize(id(), &metadata).unwrap().unwrap();
        assert_eq!(record.total_length_bytes, 30);
        assert_eq!(record.files.len(), 2);
        assert_eq!(record.files[0].relative_path(), "a/b.txt");
        assert_eq!(record.files[1].relative_path(), "c.txt");
    }

    #[test]
    fn test_files_take_precedence_over_length() {
        let metadata = MetadataValue::dict([
            ("name", MetadataValue::from("Both")),
            ("length", MetadataValue::from(999)),
            ("files", MetadataValue::list([file(&["x"], 5)])),
        ]);
        let record = normalize(id(), &metadata).unwrap().unwrap();
        assert_eq!(record.total_length_bytes, 5);
    }

    #[test]
    fn test_missing_name_is_skipped() {
        let metadata = MetadataValue::dict([("length", MetadataValue::from(10))]);
        assert_eq!(normalize(id(), &metadata).unwrap(), None);
    }

    #[test]
    fn test_no_length_defaults_to_zero() {
        let metadata = MetadataValue::dict([("name", MetadataValue::from("Empty"))]);
        let record = normalize(id(), &metadata).unwrap().unwrap();
        assert_eq!(record.total_length_bytes, 0);
    }

    #[test]
    fn test_empty_files_list() {
        let metadata = MetadataValue::dict([
            ("name", MetadataValue::from("Nothing")),
            ("files", MetadataValue::list([])),
        ]);
        let record = normalize(id(), &metadata).unwrap().unwrap();
        assert!(!record.has_files());
        assert_eq!(record.total_length_bytes, 0);
    }

    #[test]
    fn test_non_dict_rejected() {
        let result = normalize(id(), &MetadataValue::from(3));
        assert_eq!(result, Err(MetadataError::NotADictionary("integer")));
    }

    #[test]
    fn test_wrong_name_type_rejected() {
        let metadata = MetadataValue::dict([("name", MetadataValue::from(1))]);
        assert!(matches!(
            normalize(id(), &metadata),
            Err(MetadataError::WrongType { .. })
        ));
    }

    #[test]
    fn test_files_not_a_list_rejected() {
        let metadata = MetadataValue::dict([
            ("name", MetadataValue::from("Bad")),
            ("files", MetadataValue::from("nope")),
        ]);
        assert!(matches!(
            normalize(id(), &metadata),
            Err(MetadataError::WrongType { expected: "list", .. })
        ));
    }

    #[test]
    fn test_file_missing_path_rejected() {
        let metadata = MetadataValue::dict([
            ("name", MetadataValue::from("Bad")),
            (
                "files",
                MetadataValue::list([MetadataValue::dict([("length", MetadataValue::from(1))])]),
            ),
        ]);
        assert_eq!(
            normalize(id(), &metadata),
            Err(MetadataError::MissingField("files[0].path".to_string()))
        );
    }

    #[test]
    fn test_file_missing_length_rejected() {
        let metadata = MetadataValue::dict([
            ("name", MetadataValue::from("Bad")),
            (
                "files",
                MetadataValue::list([MetadataValue::dict([(
                    "path",
                    MetadataValue::list([MetadataValue::from("a")]),
                )])]),
            ),
        ]);
        assert_eq!(
            normalize(id(), &metadata),
            Err(MetadataError::MissingField("files[0].length".to_string()))
        );
    }

    #[test]
    fn test_negative_length_rejected() {
        let metadata = MetadataValue::dict([
            ("name", MetadataValue::from("Bad")),
            ("length", MetadataValue::from(-1)),
        ]);
        assert!(matches!(
            normalize(id(), &metadata),
            Err(MetadataError::NegativeLength { value: -1, .. })
        ));
    }

    #[test]
    fn test_non_integer_file_length_rejected() {
        let metadata = MetadataValue::dict([
            ("name", MetadataValue::from("Bad")),
            (
                "files",
                MetadataValue::list([MetadataValue::dict([
                    ("length", MetadataValue::from("ten")),
                    ("path", MetadataValue::list([MetadataValue::from("a")])),
                ])]),
            ),
        ]);
        assert!(matches!(
            normalize(id(), &metadata),
            Err(MetadataError::WrongType { expected: "integer", .. })
        ));
    }

    #[test]
    fn test_total_length_overflow_rejected() {
        let metadata = MetadataValue::dict([
            ("name", MetadataValue::from("Huge")),
            (
                "files",
                MetadataValue::list([file(&["a"], i64::MAX), file(&["b"], 1)]),
            ),
        ]);
        assert_eq!(normalize(id(), &metadata), Err(MetadataError::LengthOverflow));
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let metadata = MetadataValue::dict([("name", MetadataValue::Bytes(vec![b'o', 0xff, b'k']))]);
        let record = normalize(id(), &metadata).unwrap().unwrap();
        assert_eq!(record.name, "o\u{fffd}k");
    }

    #[test]
    fn test_undecodable_payload_rejected() {
        assert!(matches!(
            decode_and_normalize(id(), b"garbage"),
            Err(MetadataError::Decode(_))
        ));
    }
}
