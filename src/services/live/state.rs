//! Live Scan State
//!
//! Everything the live scanner owns, in one plain struct. The scanner keeps
//! it behind a single mutex and every method here runs inside one critical
//! section, so each mutation is atomic with respect to message handlers and
//! other scan iterations.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use uilens_core::{
    aggregation, CanonicalKey, FileIssueCache, HeatmapSnapshot, IssueCache, ObservedItem,
    RuleConfig, RuleMetadata,
};

use crate::services::correlator::VisionReport;

/// Top-level scan status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanPhase {
    #[default]
    Idle,
    Scanning,
    Complete,
}

/// Latest `duplicates:indexing:progress` payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexingProgress {
    pub message: Option<String>,
    pub current: Option<u64>,
    pub total: Option<u64>,
}

/// Duplicate-detection indexing on the service side
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum IndexingStatus {
    #[default]
    Idle,
    Indexing { progress: IndexingProgress },
    Complete { total_chunks: Option<u64> },
    Failed { error: String },
}

/// The last rule change the service refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleError {
    pub rule_id: String,
    pub message: String,
}

/// Rule metadata and confirmed configuration.
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    pub configs: BTreeMap<String, RuleConfig>,
    pub metadata: BTreeMap<String, RuleMetadata>,
    /// Rules with a change awaiting confirmation
    pub updating: BTreeSet<String>,
    pub last_error: Option<RuleError>,
}

impl RuleRegistry {
    /// Store published metadata and the configuration it implies.
    pub fn apply_metadata(&mut self, rules: Vec<RuleMetadata>) {
        for rule in rules {
            self.configs.insert(rule.id.clone(), rule.effective_config());
            self.metadata.insert(rule.id.clone(), rule);
        }
    }

    pub fn apply_config(&mut self, config: RuleConfig) {
        self.configs.insert(config.rule_id.clone(), config);
    }
}

/// Items of one file, scanned with a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileGroup {
    pub file: String,
    /// Distinct canonical keys, sorted
    pub keys: Vec<CanonicalKey>,
    /// Number of observed instances
    pub instances: usize,
}

/// Counts from a stale-item prune.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneSummary {
    pub items: usize,
    pub records: usize,
    pub files: usize,
}

#[derive(Debug, Default)]
pub struct LiveState {
    pub cache: IssueCache,
    pub file_issues: FileIssueCache,
    /// Instance id → item, for the current discovery snapshot
    pub items: BTreeMap<String, ObservedItem>,
    pub live: bool,
    /// Held by the full scan for its whole run
    pub scan_in_progress: bool,
    pub phase: ScanPhase,
    /// Bumped whenever cached results are thrown away
    pub epoch: u64,
    pub disabled_rules: HashSet<String>,
    pub heatmap: HeatmapSnapshot,
    /// File → latest `lint:progress` phase
    pub progress: BTreeMap<String, String>,
    pub rules: RuleRegistry,
    pub vision_reports: BTreeMap<String, VisionReport>,
    pub indexing: IndexingStatus,
    /// Files with a `subscribe:file` sent on the current connection
    pub subscribed: HashSet<String>,
}

impl LiveState {
    pub fn new(disabled_rules: HashSet<String>) -> Self {
        Self {
            disabled_rules,
            ..Default::default()
        }
    }

    /// Whether results requested under `epoch` may still be written.
    pub fn is_current(&self, epoch: u64) -> bool {
        self.live && self.epoch == epoch
    }

    /// Add or replace items by instance id.
    pub fn upsert_items(&mut self, items: impl IntoIterator<Item = ObservedItem>) {
        for item in items {
            self.items.insert(item.id.clone(), item);
        }
    }

    pub fn keys_for_file(&self, file: &str) -> Vec<CanonicalKey> {
        self.items
            .values()
            .filter(|item| item.file() == file)
            .map(ObservedItem::canonical_key)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.items.values().any(|item| item.canonical_key() == key)
    }

    /// Group items by file, largest groups first.
    pub fn file_groups(&self) -> Vec<FileGroup> {
        let mut groups: BTreeMap<&str, (BTreeSet<CanonicalKey>, usize)> = BTreeMap::new();
        for item in self.items.values() {
            let (keys, instances) = groups.entry(item.file()).or_default();
            keys.insert(item.canonical_key());
            *instances += 1;
        }

        let mut groups: Vec<FileGroup> = groups
            .into_iter()
            .map(|(file, (keys, instances))| FileGroup {
                file: file.to_string(),
                keys: keys.into_iter().collect(),
                instances,
            })
            .collect();
        groups.sort_by(|a, b| b.instances.cmp(&a.instances).then_with(|| a.file.cmp(&b.file)));
        groups
    }

    /// Seed `Pending` records for every key without one.
    ///
    /// Returns the keys that were newly seeded.
    pub fn seed_pending<'a>(
        &mut self,
        keys: impl IntoIterator<Item = &'a CanonicalKey>,
    ) -> Vec<CanonicalKey> {
        keys.into_iter()
            .filter(|key| self.cache.seed_pending(key))
            .cloned()
            .collect()
    }

    pub fn mark_scanning(&mut self, keys: &[CanonicalKey]) {
        for key in keys {
            self.cache.mark_scanning(key);
        }
    }

    /// Mark keys `Error`, skipping keys whose items have since disappeared.
    pub fn mark_error(&mut self, keys: &[CanonicalKey]) {
        for key in keys {
            if self.has_key(key) {
                self.cache.mark_error(key);
            }
        }
    }

    /// Drop items by instance id along with any cache entries no surviving
    /// instance refers to.
    pub fn remove_items<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) -> PruneSummary {
        let items = ids
            .into_iter()
            .filter(|id| self.items.remove(*id).is_some())
            .count();
        if items == 0 {
            return PruneSummary::default();
        }

        let surviving: HashSet<CanonicalKey> =
            self.items.values().map(ObservedItem::canonical_key).collect();
        let records = self.cache.retain_keys(&surviving);

        let files: HashSet<&str> = self.items.values().map(ObservedItem::file).collect();
        let files = self.file_issues.retain_files(&files);
        self.progress
            .retain(|file, _| self.items.values().any(|item| item.file() == file));

        PruneSummary {
            items,
            records,
            files,
        }
    }

    /// Throw away every cached result and invalidate in-flight ones.
    pub fn clear_results(&mut self) {
        self.cache.clear();
        self.file_issues.clear();
        self.progress.clear();
        self.epoch += 1;
    }

    pub fn recompute(&mut self) {
        self.heatmap = aggregation::recompute(
            self.items.values(),
            &self.cache,
            &self.file_issues,
            &self.disabled_rules,
        );
    }
}
