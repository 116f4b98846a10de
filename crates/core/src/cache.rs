//! Issue Cache
//!
//! Two-tier cache of analysis results:
//!
//! - [`IssueCache`] holds one [`IssueRecord`] per canonical key, shared by
//!   every instance rendered from that source location.
//! - [`FileIssueCache`] holds, per file, the issues that could not be
//!   attributed to any known item. A file's entry is replaced wholesale on
//!   every re-scan, and "no issues" is stored as an absent entry.

use std::collections::{HashMap, HashSet};

use crate::issue::{Issue, IssueRecord, ScanStatus};
use crate::location::CanonicalKey;

/// Per-canonical-key issue records.
#[derive(Debug, Clone, Default)]
pub struct IssueCache {
    records: HashMap<CanonicalKey, IssueRecord>,
}

impl IssueCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&IssueRecord> {
        self.records.get(key)
    }

    /// Insert or replace the record for `key`.
    pub fn set(&mut self, key: impl Into<CanonicalKey>, record: IssueRecord) {
        self.records.insert(key.into(), record);
    }

    /// Seed a `Pending` record unless one already exists.
    ///
    /// Returns `true` when the key was newly seeded. Existing records are
    /// never re-initialized, so a scan cannot reset entries another scan
    /// has already claimed.
    pub fn seed_pending(&mut self, key: &str) -> bool {
        if self.records.contains_key(key) {
            return false;
        }
        self.records
            .insert(key.to_string(), IssueRecord::pending(key));
        true
    }

    /// Move `key` to `Scanning`, creating the record if needed.
    ///
    /// Existing issues are kept as a stale-but-displayed value.
    pub fn mark_scanning(&mut self, key: &str) {
        self.records
            .entry(key.to_string())
            .or_insert_with(|| IssueRecord::pending(key))
            .mark_scanning();
    }

    /// Move `key` to `Error`, keeping any previous issues.
    pub fn mark_error(&mut self, key: &str) {
        self.records
            .entry(key.to_string())
            .or_insert_with(|| IssueRecord::pending(key))
            .mark_error();
    }

    /// Store a completed result for `key`.
    pub fn complete(&mut self, key: &str, issues: Vec<Issue>) {
        self.records
            .insert(key.to_string(), IssueRecord::complete(key, issues));
    }

    /// Remove every listed key; returns how many records were dropped.
    pub fn delete_many<'a>(&mut self, keys: impl IntoIterator<Item = &'a str>) -> usize {
        keys.into_iter()
            .filter(|key| self.records.remove(*key).is_some())
            .count()
    }

    /// Drop every record whose key is not in `surviving`.
    pub fn retain_keys(&mut self, surviving: &HashSet<CanonicalKey>) -> usize {
        let before = self.records.len();
        self.records.retain(|key, _| surviving.contains(key));
        before - self.records.len()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn contains(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CanonicalKey, &IssueRecord)> {
        self.records.iter()
    }

    /// Number of records currently in `status`.
    pub fn count_with_status(&self, status: ScanStatus) -> usize {
        self.records
            .values()
            .filter(|record| record.status == status)
            .count()
    }
}

/// Per-file issues that matched no known item.
#[derive(Debug, Clone, Default)]
pub struct FileIssueCache {
    files: HashMap<String, Vec<Issue>>,
}

impl FileIssueCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, file: &str) -> Option<&[Issue]> {
        self.files.get(file).map(Vec::as_slice)
    }

    /// Replace the file's entry; an empty list removes it.
    pub fn set(&mut self, file: impl Into<String>, issues: Vec<Issue>) {
        let file = file.into();
        if issues.is_empty() {
            self.files.remove(&file);
        } else {
            self.files.insert(file, issues);
        }
    }

    pub fn remove(&mut self, file: &str) -> Option<Vec<Issue>> {
        self.files.remove(file)
    }

    /// Drop entries for files not in `surviving`.
    pub fn retain_files(&mut self, surviving: &HashSet<&str>) -> usize {
        let before = self.files.len();
        self.files.retain(|file, _| surviving.contains(file.as_str()));
        before - self.files.len()
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<Issue>)> {
        self.files.iter()
    }
}
