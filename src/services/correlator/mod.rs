//! Request Correlation
//!
//! Pairs outbound requests with their responses by correlation id. Each
//! request family keeps its own pending map:
//! - `lint` - `lint:file` / `lint:element` plus the short-lived result cache
//! - `vision` - `vision:analyze`, carrying capture metadata
//! - `rules` - `rule:config:set` confirmations

pub mod lint;
pub mod pending;
pub mod rules;
pub mod vision;

pub use lint::{AnalysisOutcome, LintDelivery, LintRequester, RESULT_CACHE_TTL};
pub use pending::{Completion, PendingRequests, Waiter};
pub use rules::RuleConfigRequester;
pub use vision::{CaptureMetadata, CaptureSink, LoggingCaptureSink, VisionReport, VisionRequester};
