//! Header normalization into safe SQL column identifiers.
//!
//! [`normalize_identifier`] maps one raw header to `^[a-z_][a-z0-9_]*$` (or to
//! an empty string when nothing survives). [`normalize_headers`] applies it to
//! a full header row and rejects rows where two headers collapse onto the same
//! identifier, since the second column would otherwise shadow the first.

use std::collections::HashMap;

use unicode_normalization::UnicodeNormalization;

use crate::error::{ImportError, ImportResult};

/// Normalizes a raw header into a lowercase ASCII identifier.
///
/// Spaces become underscores, accents are folded away through NFKD
/// decomposition, and any character outside `[a-z0-9_]` is dropped. A leading
/// digit gets a `c` prefix so the identifier never needs quoting to be valid.
pub fn normalize_identifier(raw: &str) -> String {
    let folded: String = raw
        .replace(' ', "_")
        .to_lowercase()
        .nfkd()
        .filter(char::is_ascii)
        .filter(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
        .map(|ch| ch.to_ascii_lowercase())
        .collect();
    match folded.chars().next() {
        Some(first) if first.is_ascii_digit() => format!("c{folded}"),
        _ => folded,
    }
}

pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() || first == '_' => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_')
}

/// Normalizes every header of a row, preserving order.
pub fn normalize_headers(headers: &[String]) -> ImportResult<Vec<String>> {
    let mut seen: HashMap<String, &str> = HashMap::with_capacity(headers.len());
    let mut names = Vec::with_capacity(headers.len());
    for (idx, header) in headers.iter().enumerate() {
        let normalized = normalize_identifier(header);
        if normalized.is_empty() {
            return Err(ImportError::EmptyIdentifier {
                header: header.clone(),
                position: idx + 1,
            });
        }
        if let Some(previous) = seen.get(&normalized) {
            return Err(ImportError::DuplicateColumn {
                first: (*previous).to_string(),
                second: header.clone(),
                normalized,
            });
        }
        seen.insert(normalized.clone(), header.as_str());
        names.push(normalized);
    }
    Ok(names)
}
