//! Issue Models
//!
//! Findings reported by the analysis service, the per-key cache record that
//! holds them, and the observed items produced by discovery.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::location::{CanonicalKey, SourceLocation};

/// Severity of a single finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    #[default]
    #[serde(alias = "warn")]
    Warning,
    Info,
}

/// A finding reported by the analysis service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    /// Rule that produced the finding (empty for parser errors)
    #[serde(default)]
    pub rule_id: String,
    pub message: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    /// Location of the element the finding belongs to, when the service
    /// could attribute it to one.
    #[serde(default, alias = "dataLoc", skip_serializing_if = "Option::is_none")]
    pub canonical_key: Option<String>,
}

impl Issue {
    pub fn new(rule_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.into(),
            message: message.into(),
            severity: Severity::default(),
            line: 0,
            column: None,
            canonical_key: None,
        }
    }

    /// Attach an element key to this issue.
    pub fn at(mut self, canonical_key: impl Into<String>) -> Self {
        self.canonical_key = Some(canonical_key.into());
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn is_disabled(&self, disabled_rules: &HashSet<String>) -> bool {
        disabled_rules.contains(&self.rule_id)
    }
}

/// Count issues whose rule is not disabled.
pub fn visible_issue_count(issues: &[Issue], disabled_rules: &HashSet<String>) -> usize {
    issues
        .iter()
        .filter(|issue| !issue.is_disabled(disabled_rules))
        .count()
}

/// Scan status of a cache record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    /// Seeded, no request issued yet
    Pending,
    /// Request in flight
    Scanning,
    /// Result distributed
    Complete,
    /// Request failed; previous issues (if any) are retained
    Error,
}

impl ScanStatus {
    /// Whether the record is waiting on the analysis service.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, ScanStatus::Pending | ScanStatus::Scanning)
    }
}

/// Cache entry for one canonical key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRecord {
    pub canonical_key: CanonicalKey,
    pub issues: Vec<Issue>,
    pub status: ScanStatus,
}

impl IssueRecord {
    /// A freshly seeded record.
    pub fn pending(canonical_key: impl Into<CanonicalKey>) -> Self {
        Self {
            canonical_key: canonical_key.into(),
            issues: Vec::new(),
            status: ScanStatus::Pending,
        }
    }

    /// A record with a distributed result.
    pub fn complete(canonical_key: impl Into<CanonicalKey>, issues: Vec<Issue>) -> Self {
        Self {
            canonical_key: canonical_key.into(),
            issues,
            status: ScanStatus::Complete,
        }
    }

    /// Enter `Scanning`, keeping the current issues as a stale value.
    pub fn mark_scanning(&mut self) {
        self.status = ScanStatus::Scanning;
    }

    /// Enter `Error`, keeping the current issues.
    pub fn mark_error(&mut self) {
        self.status = ScanStatus::Error;
    }

    pub fn visible_count(&self, disabled_rules: &HashSet<String>) -> usize {
        visible_issue_count(&self.issues, disabled_rules)
    }
}

/// A rendered instance reported by discovery.
///
/// `id` identifies the instance; many instances may share a location and
/// therefore a canonical key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservedItem {
    pub id: String,
    pub source_location: SourceLocation,
    /// Opaque display data owned by the rendering consumer
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub display: serde_json::Value,
}

impl ObservedItem {
    pub fn new(id: impl Into<String>, source_location: SourceLocation) -> Self {
        Self {
            id: id.into(),
            source_location,
            display: serde_json::Value::Null,
        }
    }

    pub fn canonical_key(&self) -> CanonicalKey {
        self.source_location.canonical_key()
    }

    pub fn file(&self) -> &str {
        &self.source_location.file
    }
}
