//! Text Analysis Requests
//!
//! `lint:file` and `lint:element` requests, correlated on one pending map
//! keyed by file path. A short-lived per-file result cache sits in front of
//! it so repeated scans of the same file do not issue duplicate requests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;
use uilens_core::{ClientMessage, Issue};

use super::pending::PendingRequests;
use crate::services::connection::Transport;
use crate::utils::error::{AppError, AppResult};

/// How long a per-file result is reused.
pub const RESULT_CACHE_TTL: Duration = Duration::from_secs(30);

/// Outcome of a per-file analysis request.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Completed(Vec<Issue>),
    /// Not connected; the caller marks the file as errored and moves on
    Unavailable,
}

/// What happened to an incoming `lint:result`.
#[derive(Debug, Clone, PartialEq)]
pub enum LintDelivery {
    /// Handed to the waiting request
    Resolved,
    /// The correlation id is no longer pending
    Stale,
    /// No request was waiting for this file
    Unsolicited(Vec<Issue>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LintKind {
    File,
    Element,
}

#[derive(Default)]
struct ResultCache {
    entries: HashMap<String, (Instant, Vec<Issue>)>,
    /// Bumped on invalidation so responses to older requests are not cached
    generations: HashMap<String, u64>,
    epoch: u64,
}

impl ResultCache {
    fn stamp(&self, file_path: &str) -> (u64, u64) {
        (
            self.epoch,
            self.generations.get(file_path).copied().unwrap_or(0),
        )
    }
}

pub struct LintRequester {
    transport: Arc<dyn Transport>,
    pending: PendingRequests<Vec<Issue>, LintKind>,
    results: Mutex<ResultCache>,
    timeout: Duration,
}

impl LintRequester {
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration) -> Self {
        Self {
            transport,
            pending: PendingRequests::new("lint"),
            results: Mutex::new(ResultCache::default()),
            timeout,
        }
    }

    fn results(&self) -> MutexGuard<'_, ResultCache> {
        self.results
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Issues for a whole file.
    pub async fn request_analysis(&self, file_path: &str) -> AppResult<AnalysisOutcome> {
        let generation = {
            let mut results = self.results();
            let fresh = results
                .entries
                .get(file_path)
                .filter(|(stored_at, _)| stored_at.elapsed() < RESULT_CACHE_TTL)
                .map(|(_, issues)| issues.clone());
            if let Some(issues) = fresh {
                debug!(file = %file_path, "serving cached analysis result");
                return Ok(AnalysisOutcome::Completed(issues));
            }
            results.entries.remove(file_path);
            results.stamp(file_path)
        };

        if !self.transport.is_connected() {
            debug!(file = %file_path, "not connected; skipping analysis");
            return Ok(AnalysisOutcome::Unavailable);
        }

        let waiter = self.pending.register(file_path, LintKind::File);
        let message = ClientMessage::LintFile {
            file_path: file_path.to_string(),
            request_id: waiter.request_id.clone(),
        };
        if let Err(err) = self.transport.send(&message).await {
            self.pending.remove(&waiter.request_id);
            return match err {
                AppError::ConnectionUnavailable => Ok(AnalysisOutcome::Unavailable),
                other => Err(other),
            };
        }

        let (issues, _) = self.pending.wait(waiter, self.timeout).await?;

        let mut results = self.results();
        if results.stamp(file_path) == generation {
            results
                .entries
                .insert(file_path.to_string(), (Instant::now(), issues.clone()));
        }
        Ok(AnalysisOutcome::Completed(issues))
    }

    /// Issues for a single element, identified by its `file:line[:column]`.
    pub async fn request_element(&self, file_path: &str, data_loc: &str) -> AppResult<Vec<Issue>> {
        if !self.transport.is_connected() {
            return Err(AppError::ConnectionUnavailable);
        }

        let waiter = self.pending.register(file_path, LintKind::Element);
        let message = ClientMessage::LintElement {
            file_path: file_path.to_string(),
            data_loc: data_loc.to_string(),
            request_id: waiter.request_id.clone(),
        };
        if let Err(err) = self.transport.send(&message).await {
            self.pending.remove(&waiter.request_id);
            return Err(err);
        }

        let (issues, kind) = self.pending.wait(waiter, self.timeout).await?;
        debug_assert_eq!(kind, LintKind::Element);
        Ok(issues)
    }

    /// Route an incoming `lint:result`.
    ///
    /// Results without a correlation id go to the oldest `lint:file` request
    /// for the file. Element requests only resolve by id.
    pub fn handle_result(
        &self,
        file_path: &str,
        issues: Vec<Issue>,
        request_id: Option<&str>,
    ) -> LintDelivery {
        let request_id = match request_id {
            Some(id) => id.to_string(),
            None => match self.pending.oldest_where(file_path, |kind| *kind == LintKind::File) {
                Some(id) => id,
                None => return LintDelivery::Unsolicited(issues),
            },
        };

        if self.pending.resolve(&request_id, issues) {
            LintDelivery::Resolved
        } else {
            LintDelivery::Stale
        }
    }

    /// Remember a result that arrived without a request.
    pub fn store(&self, file_path: &str, issues: Vec<Issue>) {
        self.results()
            .entries
            .insert(file_path.to_string(), (Instant::now(), issues));
    }

    /// Forget the cached result for one file.
    pub fn invalidate(&self, file_path: &str) {
        let mut results = self.results();
        results.entries.remove(file_path);
        *results.generations.entry(file_path.to_string()).or_insert(0) += 1;
    }

    /// Forget every cached result, including results still in flight.
    pub fn clear(&self) {
        let mut results = self.results();
        results.entries.clear();
        results.epoch += 1;
        debug!("analysis result cache cleared");
    }

    pub fn is_cached(&self, file_path: &str) -> bool {
        self.results().entries.contains_key(file_path)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
