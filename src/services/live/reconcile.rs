//! Invalidation & Reconciliation
//!
//! Server push handling. Responses to pending requests are routed
//! synchronously; events that trigger new requests (`file:changed`,
//! `rule:config:changed`) are handled on spawned tasks so the connection's
//! read loop is never blocked on a response it has yet to read.

use std::sync::Arc;

use tracing::{debug, info};
use uilens_core::{Issue, RuleConfig, ServerMessage};

use super::distribution::distribute;
use super::scanner::{Claim, FileOutcome, LiveScanner, ScanSummary};
use super::state::{IndexingProgress, IndexingStatus};
use crate::services::correlator::LintDelivery;

impl LiveScanner {
    /// Apply one message from the analysis service.
    pub fn handle_server_message(self: &Arc<Self>, message: ServerMessage) {
        match message {
            ServerMessage::LintResult {
                file_path,
                issues,
                request_id,
            } => {
                match self
                    .lint
                    .handle_result(&file_path, issues, request_id.as_deref())
                {
                    LintDelivery::Resolved => {}
                    LintDelivery::Stale => {
                        debug!(file = %file_path, ?request_id, "stale lint result ignored")
                    }
                    LintDelivery::Unsolicited(issues) => {
                        self.apply_pushed_result(&file_path, issues)
                    }
                }
            }
            ServerMessage::LintProgress { file_path, phase } => {
                self.state().progress.insert(file_path, phase);
            }
            ServerMessage::FileChanged { file_path } => {
                // Drop synchronously so nothing in between reuses the old result.
                self.lint.invalidate(&file_path);
                let scanner = Arc::clone(self);
                tokio::spawn(async move {
                    scanner.on_file_changed(&file_path).await;
                });
            }
            ServerMessage::RulesMetadata { rules } => {
                let count = rules.len();
                self.state().rules.apply_metadata(rules);
                debug!(rules = count, "rule metadata received");
            }
            ServerMessage::RuleConfigResult {
                rule_id,
                severity,
                options,
                success,
                error,
            } => {
                self.rule_requests
                    .handle_result(&rule_id, severity, options, success, error);
            }
            ServerMessage::RuleConfigChanged {
                rule_id,
                severity,
                options,
            } => {
                let mut config = RuleConfig::new(rule_id, severity);
                config.options = options;
                let scanner = Arc::clone(self);
                tokio::spawn(async move {
                    scanner.on_rule_config_changed(config).await;
                });
            }
            ServerMessage::VisionResult {
                route,
                issues,
                analysis_time,
                error,
                request_id,
            } => {
                self.vision
                    .handle_result(&route, issues, analysis_time, error, request_id.as_deref());
            }
            ServerMessage::DuplicatesIndexingStart { message } => {
                self.state().indexing = IndexingStatus::Indexing {
                    progress: IndexingProgress {
                        message,
                        ..Default::default()
                    },
                };
            }
            ServerMessage::DuplicatesIndexingProgress {
                message,
                current,
                total,
            } => {
                self.state().indexing = IndexingStatus::Indexing {
                    progress: IndexingProgress {
                        message,
                        current,
                        total,
                    },
                };
            }
            ServerMessage::DuplicatesIndexingComplete { total_chunks } => {
                self.state().indexing = IndexingStatus::Complete { total_chunks };
            }
            ServerMessage::DuplicatesIndexingError { error } => {
                self.state().indexing = IndexingStatus::Failed { error };
            }
            ServerMessage::Unknown => debug!("ignoring unhandled server message"),
        }
    }

    /// Re-scan a file the service reports as changed.
    ///
    /// The file's keys go back to `Scanning` with their previous issues kept
    /// for display until the fresh result lands.
    pub async fn on_file_changed(&self, file: &str) -> Option<FileOutcome> {
        self.lint.invalidate(file);

        let epoch = {
            let state = self.state();
            if !state.live {
                return None;
            }
            state.epoch
        };

        let outcome = self.scan_file(file, Claim::AllKeys, epoch).await;
        if outcome == FileOutcome::Empty {
            return None;
        }

        {
            let mut state = self.state();
            if state.epoch == epoch {
                state.recompute();
            }
        }
        info!(file, ?outcome, "changed file re-scanned");
        Some(outcome)
    }

    /// Apply a rule change announced by the service.
    ///
    /// The change may come from any client, and a severity change can affect
    /// every file, so a live cache is cleared and fully re-scanned. When a
    /// full scan is already running the cache is left alone.
    pub async fn on_rule_config_changed(&self, config: RuleConfig) -> Option<ScanSummary> {
        let rescan = {
            let mut state = self.state();
            info!(rule = %config.rule_id, severity = %config.severity, "rule config changed");
            state.rules.apply_config(config);
            let rescan = state.live && !state.scan_in_progress;
            if rescan {
                state.clear_results();
                state.recompute();
            }
            rescan
        };
        if !rescan {
            return None;
        }

        self.lint.clear();
        Some(self.run_full_scan().await)
    }

    /// A `lint:result` no request was waiting for, e.g. pushed for a
    /// subscribed file.
    fn apply_pushed_result(&self, file: &str, issues: Vec<Issue>) {
        let mut state = self.state();
        if !state.live || state.keys_for_file(file).is_empty() {
            debug!(file, "ignoring unsolicited lint result");
            return;
        }
        self.lint.store(file, issues.clone());
        state.progress.remove(file);
        distribute(&mut state, file, issues);
        state.recompute();
        debug!(file, "applied pushed lint result");
    }
}
