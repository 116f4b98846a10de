//! Result Distribution
//!
//! Splits one file's analysis result across the cache: issues whose key
//! resolves to a known item go to that item's record, the rest become the
//! file's unattributed issues. The result is authoritative for the whole
//! file, so every known key of the file ends up `Complete`.

use std::collections::BTreeMap;

use uilens_core::location::parse_reported_key;
use uilens_core::{CanonicalKey, Issue, SourceLocation};

use super::state::LiveState;

/// Counts from one distribution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Distribution {
    pub keys: usize,
    pub attributed: usize,
    pub file_level: usize,
}

/// Resolve the key an issue was reported under against the file's known
/// locations.
///
/// An exact key wins. Otherwise a location without a column matches any
/// column on the same line, in either direction; among several candidates
/// the lowest column is taken.
pub fn resolve_issue_key<'a>(
    reported: Option<&str>,
    known: &'a BTreeMap<CanonicalKey, SourceLocation>,
) -> Option<&'a CanonicalKey> {
    let location = parse_reported_key(reported?)?;

    if location.column.is_some() {
        if let Some((key, _)) = known.get_key_value(&location.canonical_key()) {
            return Some(key);
        }
    }

    known
        .iter()
        .filter(|(_, candidate)| candidate.same_location(&location))
        .min_by_key(|(_, candidate)| candidate.column_or_default())
        .map(|(key, _)| key)
}

/// Write a file's result into the cache.
pub fn distribute(state: &mut LiveState, file: &str, issues: Vec<Issue>) -> Distribution {
    let known: BTreeMap<CanonicalKey, SourceLocation> = state
        .items
        .values()
        .filter(|item| item.file() == file)
        .map(|item| (item.canonical_key(), item.source_location.clone()))
        .collect();

    let mut per_key: BTreeMap<&CanonicalKey, Vec<Issue>> =
        known.keys().map(|key| (key, Vec::new())).collect();
    let mut file_level = Vec::new();
    let mut attributed = 0;

    for issue in issues {
        match resolve_issue_key(issue.canonical_key.as_deref(), &known) {
            Some(key) => {
                attributed += 1;
                per_key.entry(key).or_default().push(issue);
            }
            None => file_level.push(issue),
        }
    }

    let summary = Distribution {
        keys: per_key.len(),
        attributed,
        file_level: file_level.len(),
    };
    for (key, issues) in per_key {
        state.cache.complete(key, issues);
    }
    state.file_issues.set(file, file_level);
    summary
}
