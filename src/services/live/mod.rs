//! Live Scanning
//!
//! The scan orchestrator and everything it keeps in sync:
//! - `state` - `LiveState`, the single injectable store
//! - `distribution` - splitting a file result into per-key and file-level issues
//! - `scanner` - `LiveScanner` entry points, full and incremental scans
//! - `reconcile` - push event handling

pub mod distribution;
mod reconcile;
pub mod scanner;
pub mod state;
#[cfg(test)]
mod testing;

pub use distribution::{distribute, resolve_issue_key, Distribution};
pub use scanner::{FileOutcome, LiveScanner, ScanSummary, ScannerOptions};
pub use state::{
    FileGroup, IndexingProgress, IndexingStatus, LiveState, PruneSummary, RuleError,
    RuleRegistry, ScanPhase,
};
