//! Search index derivation.
//!
//! The index is a space-separated list of distinct tokens ordered by how
//! often they occur in the torrent name and file paths.

use std::collections::HashMap;

/// Characters treated as token separators in addition to the space.
const SEPARATORS: [char; 7] = ['/', '[', ']', '(', ')', '.', '_'];

/// Build the search index for a piece of text.
///
/// Tokens are case-sensitive. Higher-frequency tokens come first; tokens
/// with equal frequency are ordered by byte-wise comparison.
pub fn build_search_index(text: &str) -> String {
    let normalized: String = text
        .chars()
        .map(|c| if SEPARATORS.contains(&c) { ' ' } else { c })
        .collect();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for token in normalized.split(' ').filter(|t| !t.is_empty()) {
        *counts.entry(token).or_insert(0) += 1;
    }

    let mut tokens: Vec<(&str, usize)> = counts.into_iter().collect();
    tokens.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    tokens
        .into_iter()
        .map(|(token, _)| token)
        .collect::<Vec<_>>()
        .join(" ")
}
