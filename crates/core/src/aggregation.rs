//! Heatmap Aggregation
//!
//! Derives per-item issue counts from the cache. Each file has one
//! representative ("top-level") item, which additionally carries the file's
//! unattributed issues. Everything here is a pure function of its inputs;
//! callers decide when to recompute.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::cache::{FileIssueCache, IssueCache};
use crate::issue::{visible_issue_count, ObservedItem};

/// Result of a heatmap recompute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapSnapshot {
    /// file path → instance id of the file's top-level item
    pub top_level_per_file: BTreeMap<String, String>,
    /// instance id → visible issue count
    pub merged_counts: BTreeMap<String, usize>,
}

impl HeatmapSnapshot {
    pub fn count_for(&self, item_id: &str) -> usize {
        self.merged_counts.get(item_id).copied().unwrap_or(0)
    }

    pub fn top_level_for(&self, file: &str) -> Option<&str> {
        self.top_level_per_file.get(file).map(String::as_str)
    }

    /// Sum of all merged counts.
    pub fn total(&self) -> usize {
        self.merged_counts.values().sum()
    }
}

/// Select the representative item of every file.
///
/// Lowest line wins, then lowest column (missing columns count as the
/// canonical default), then lowest instance id so the choice does not depend
/// on discovery order.
pub fn top_level_items<'a>(
    items: impl IntoIterator<Item = &'a ObservedItem>,
) -> BTreeMap<String, String> {
    let mut best: BTreeMap<&'a str, &'a ObservedItem> = BTreeMap::new();
    for item in items {
        let candidate_rank = rank(item);
        best.entry(item.file())
            .and_modify(|current| {
                if candidate_rank < rank(*current) {
                    *current = item;
                }
            })
            .or_insert(item);
    }
    best.into_iter()
        .map(|(file, item)| (file.to_string(), item.id.clone()))
        .collect()
}

fn rank(item: &ObservedItem) -> (u32, u32, &str) {
    let location = &item.source_location;
    (location.line, location.column_or_default(), item.id.as_str())
}

/// Recompute top-level items and merged counts.
pub fn recompute<'a>(
    items: impl IntoIterator<Item = &'a ObservedItem> + Clone,
    cache: &IssueCache,
    file_issues: &FileIssueCache,
    disabled_rules: &HashSet<String>,
) -> HeatmapSnapshot {
    let top_level_per_file = top_level_items(items.clone());

    let merged_counts = items
        .into_iter()
        .map(|item| {
            let own = cache
                .get(&item.canonical_key())
                .map_or(0, |record| record.visible_count(disabled_rules));

            let is_top_level = top_level_per_file
                .get(item.file())
                .is_some_and(|id| *id == item.id);
            let file_level = if is_top_level {
                file_issues
                    .get(item.file())
                    .map_or(0, |issues| visible_issue_count(issues, disabled_rules))
            } else {
                0
            };

            (item.id.clone(), own + file_level)
        })
        .collect();

    HeatmapSnapshot {
        top_level_per_file,
        merged_counts,
    }
}
