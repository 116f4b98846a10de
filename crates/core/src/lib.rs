//! uilens Core
//!
//! Synchronous, I/O-free building blocks shared by the uilens runtime:
//! canonical source identity, issue models, the two-tier issue cache, the
//! wire protocol and heatmap aggregation.
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `location` - `SourceLocation` and canonical key resolution
//! - `issue` - `Issue`, `IssueRecord`, `ScanStatus`, `ObservedItem`
//! - `rules` - Rule metadata and configuration
//! - `protocol` - `ClientMessage` / `ServerMessage` wire enums
//! - `cache` - `IssueCache` and `FileIssueCache`
//! - `aggregation` - Top-level item selection and merged counts

pub mod aggregation;
pub mod cache;
pub mod error;
pub mod issue;
pub mod location;
pub mod protocol;
pub mod rules;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Identity & Models ──────────────────────────────────────────────────
pub use issue::{visible_issue_count, Issue, IssueRecord, ObservedItem, ScanStatus, Severity};
pub use location::{canonical_key, CanonicalKey, SourceLocation, DEFAULT_COLUMN};
pub use rules::{RuleConfig, RuleMetadata, RuleSeverity};

// ── Wire Protocol ──────────────────────────────────────────────────────
pub use protocol::{ClientMessage, ElementManifest, ServerMessage, VisionIssue};

// ── Cache & Aggregation ────────────────────────────────────────────────
pub use aggregation::{recompute, top_level_items, HeatmapSnapshot};
pub use cache::{FileIssueCache, IssueCache};
