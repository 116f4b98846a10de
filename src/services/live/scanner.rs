//! Live Scanner
//!
//! Keeps the issue cache synchronized with the analysis service. Items are
//! scanned one file at a time: the file's keys are marked `Scanning`, the
//! scheduler yields so a renderer can show that, one `lint:file` request
//! goes out, the result is distributed, and the scheduler yields again.
//!
//! The full scan holds `scan_in_progress` for its whole run and checks for
//! abort before each file. Incremental scans of newly observed items do not
//! take that lock; they only seed keys that have no record yet, so they never
//! reset work a running full scan has claimed. Results are written only if
//! the epoch they were requested under is still current.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uilens_core::{
    CanonicalKey, ClientMessage, ElementManifest, HeatmapSnapshot, Issue, IssueRecord,
    ObservedItem, RuleConfig, RuleMetadata, RuleSeverity, ServerMessage,
};

use super::distribution::distribute;
use super::state::{IndexingStatus, LiveState, PruneSummary, RuleError, ScanPhase};
use crate::models::settings::{ClientSettings, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::services::connection::{ConnectionEvent, ConnectionManager, Transport};
use crate::services::correlator::{
    AnalysisOutcome, CaptureSink, LintRequester, LoggingCaptureSink, RuleConfigRequester,
    VisionReport, VisionRequester,
};
use crate::services::scheduler::Scheduler;
use crate::utils::error::{AppError, AppResult};

/// Construction options for [`LiveScanner`].
#[derive(Debug, Clone)]
pub struct ScannerOptions {
    pub request_timeout: Duration,
    pub vision_timeout: Duration,
    pub disabled_rules: HashSet<String>,
}

impl Default for ScannerOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            vision_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            disabled_rules: HashSet::new(),
        }
    }
}

impl From<&ClientSettings> for ScannerOptions {
    fn from(settings: &ClientSettings) -> Self {
        Self {
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
            vision_timeout: Duration::from_secs(settings.vision_timeout_secs),
            disabled_rules: settings.disabled_rules.iter().cloned().collect(),
        }
    }
}

/// Counts from one scan run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub files: usize,
    pub completed: usize,
    pub failed: usize,
    /// Results that arrived after the cache was cleared
    pub discarded: usize,
    pub aborted: bool,
    /// Another full scan was running, or live scanning is off
    pub skipped: bool,
}

impl ScanSummary {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Default::default()
        }
    }

    fn record(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Completed => self.completed += 1,
            FileOutcome::Failed => self.failed += 1,
            FileOutcome::Discarded => self.discarded += 1,
            FileOutcome::Empty => return,
        }
        self.files += 1;
    }
}

/// What happened to one file's scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Completed,
    Failed,
    Discarded,
    /// No known items left in the file
    Empty,
}

/// Which keys a per-file scan marks `Scanning` up front.
pub(crate) enum Claim {
    /// Every known key of the file
    AllKeys,
    /// Only the given keys
    Keys(Vec<CanonicalKey>),
}

pub struct LiveScanner {
    state: Mutex<LiveState>,
    transport: Arc<dyn Transport>,
    scheduler: Arc<dyn Scheduler>,
    pub(crate) lint: LintRequester,
    pub(crate) vision: VisionRequester,
    pub(crate) rule_requests: RuleConfigRequester,
    capture_sink: Arc<dyn CaptureSink>,
}

impl LiveScanner {
    pub fn new(
        transport: Arc<dyn Transport>,
        scheduler: Arc<dyn Scheduler>,
        options: ScannerOptions,
    ) -> Self {
        Self {
            state: Mutex::new(LiveState::new(options.disabled_rules)),
            lint: LintRequester::new(transport.clone(), options.request_timeout),
            vision: VisionRequester::new(transport.clone(), options.vision_timeout),
            rule_requests: RuleConfigRequester::new(transport.clone(), options.request_timeout),
            transport,
            scheduler,
            capture_sink: Arc::new(LoggingCaptureSink),
        }
    }

    pub fn with_capture_sink(mut self, sink: Arc<dyn CaptureSink>) -> Self {
        self.capture_sink = sink;
        self
    }

    /// Route server messages from `connection` into this scanner.
    pub fn attach(self: &Arc<Self>, connection: &ConnectionManager) {
        let weak: Weak<Self> = Arc::downgrade(self);
        connection.on_message(Arc::new(move |message: ServerMessage| {
            if let Some(scanner) = weak.upgrade() {
                scanner.handle_server_message(message);
            }
        }));

        let weak: Weak<Self> = Arc::downgrade(self);
        connection.on_connection_change(Arc::new(move |event: ConnectionEvent| {
            if let (ConnectionEvent::Opened, Some(scanner)) = (event, weak.upgrade()) {
                // Subscriptions belong to the previous socket.
                scanner.state().subscribed.clear();
                tokio::spawn(async move {
                    scanner.resubscribe().await;
                });
            }
        }));
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, LiveState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ── Mutation entry points ──────────────────────────────────────────

    /// Turn live scanning on and run a full scan of the known items.
    pub async fn enable_live_scan(&self) -> ScanSummary {
        {
            let mut state = self.state();
            if state.live {
                debug!("live scan already enabled");
                return ScanSummary::skipped();
            }
            state.live = true;
        }
        info!("live scan enabled");
        self.run_full_scan().await
    }

    /// Turn live scanning off and clear every cached result.
    ///
    /// A running full scan stops at its next file; responses still in
    /// flight are dropped when they arrive.
    pub fn disable_live_scan(&self) {
        {
            let mut state = self.state();
            state.live = false;
            state.scan_in_progress = false;
            state.phase = ScanPhase::Idle;
            state.subscribed.clear();
            state.clear_results();
            state.recompute();
        }
        self.lint.clear();
        info!("live scan disabled");
    }

    /// Replace the discovery snapshot.
    ///
    /// Records of locations no longer present are dropped. Nothing is scanned.
    pub fn set_items(&self, items: Vec<ObservedItem>) -> PruneSummary {
        let mut state = self.state();
        let incoming: HashSet<&str> = items.iter().map(|item| item.id.as_str()).collect();
        let gone: Vec<String> = state
            .items
            .keys()
            .filter(|id| !incoming.contains(id.as_str()))
            .cloned()
            .collect();
        let summary = state.remove_items(gone.iter().map(String::as_str));
        state.upsert_items(items);
        state.recompute();
        summary
    }

    /// Add newly observed items and, when live, scan the files of any
    /// locations not seen before.
    pub async fn scan_new_items(&self, items: Vec<ObservedItem>) -> ScanSummary {
        let (epoch, files) = {
            let mut state = self.state();
            let key_files: BTreeMap<CanonicalKey, String> = items
                .iter()
                .map(|item| (item.canonical_key(), item.file().to_string()))
                .collect();
            state.upsert_items(items);

            if !state.live {
                state.recompute();
                return ScanSummary::skipped();
            }

            let mut files: BTreeMap<String, Vec<CanonicalKey>> = BTreeMap::new();
            for key in state.seed_pending(key_files.keys()) {
                if let Some(file) = key_files.get(&key) {
                    files.entry(file.clone()).or_default().push(key);
                }
            }
            (state.epoch, files)
        };

        let mut summary = ScanSummary::default();
        if files.is_empty() {
            self.state().recompute();
            return summary;
        }
        debug!(files = files.len(), "incremental scan started");

        for (file, keys) in files {
            if !self.state().is_current(epoch) {
                summary.aborted = true;
                break;
            }
            let outcome = self.scan_file(&file, Claim::Keys(keys), epoch).await;
            summary.record(outcome);
        }

        {
            let mut state = self.state();
            if state.epoch == epoch {
                state.recompute();
            }
        }
        debug!(?summary, "incremental scan finished");
        summary
    }

    /// Forget items that discovery no longer sees.
    pub fn remove_items(&self, ids: &[String]) -> PruneSummary {
        let mut state = self.state();
        let summary = state.remove_items(ids.iter().map(String::as_str));
        if summary.items > 0 {
            state.recompute();
            debug!(
                items = summary.items,
                records = summary.records,
                "pruned stale items"
            );
        }
        summary
    }

    /// Hide or show one rule's issues in the counts. Returns whether the
    /// rule is now disabled.
    pub fn toggle_disabled_rule(&self, rule_id: &str) -> bool {
        let mut state = self.state();
        let disabled = if state.disabled_rules.remove(rule_id) {
            false
        } else {
            state.disabled_rules.insert(rule_id.to_string());
            true
        };
        state.recompute();
        disabled
    }

    /// Recompute the heatmap from the current cache.
    pub fn recompute(&self) -> HeatmapSnapshot {
        let mut state = self.state();
        state.recompute();
        state.heatmap.clone()
    }

    // ── Full scan ──────────────────────────────────────────────────────

    /// Scan every known file. Skipped when another full scan holds the lock
    /// or live scanning is off.
    pub async fn run_full_scan(&self) -> ScanSummary {
        let (epoch, files) = {
            let mut state = self.state();
            if !state.live {
                return ScanSummary::skipped();
            }
            if state.scan_in_progress {
                debug!("full scan already running");
                return ScanSummary::skipped();
            }
            state.scan_in_progress = true;
            state.phase = ScanPhase::Scanning;

            let groups = state.file_groups();
            for group in &groups {
                state.seed_pending(&group.keys);
            }
            let files: Vec<String> = groups.into_iter().map(|group| group.file).collect();
            (state.epoch, files)
        };
        info!(files = files.len(), "full scan started");

        let mut summary = ScanSummary::default();
        for file in &files {
            if !self.state().is_current(epoch) {
                summary.aborted = true;
                break;
            }
            let outcome = self.scan_file(file, Claim::AllKeys, epoch).await;
            summary.record(outcome);
        }

        {
            let mut state = self.state();
            if state.epoch == epoch {
                state.scan_in_progress = false;
                state.phase = if summary.aborted {
                    ScanPhase::Idle
                } else {
                    ScanPhase::Complete
                };
                state.recompute();
            }
        }

        if summary.aborted {
            info!(completed = summary.completed, "full scan aborted");
        } else {
            info!(
                files = summary.files,
                completed = summary.completed,
                failed = summary.failed,
                "full scan complete"
            );
        }
        summary
    }

    /// Scan one file: mark, yield, request, distribute, yield.
    pub(crate) async fn scan_file(&self, file: &str, claim: Claim, epoch: u64) -> FileOutcome {
        let Some(claimed) = self.claim_file(file, claim, epoch) else {
            return FileOutcome::Empty;
        };

        self.subscribe(file).await;
        self.scheduler.yield_now().await;

        let result = self.lint.request_analysis(file).await;
        let outcome = self.apply_file_result(file, &claimed, epoch, result);

        self.scheduler.yield_now().await;
        outcome
    }

    fn claim_file(&self, file: &str, claim: Claim, epoch: u64) -> Option<Vec<CanonicalKey>> {
        let mut state = self.state();
        if !state.is_current(epoch) {
            return None;
        }
        let keys = match claim {
            Claim::AllKeys => state.keys_for_file(file),
            Claim::Keys(keys) => keys.into_iter().filter(|key| state.has_key(key)).collect(),
        };
        if keys.is_empty() {
            return None;
        }
        state.mark_scanning(&keys);
        Some(keys)
    }

    fn apply_file_result(
        &self,
        file: &str,
        claimed: &[CanonicalKey],
        epoch: u64,
        result: AppResult<AnalysisOutcome>,
    ) -> FileOutcome {
        let mut state = self.state();
        if !state.is_current(epoch) {
            debug!(file, "discarding result for a cleared cache");
            return FileOutcome::Discarded;
        }

        match result {
            Ok(AnalysisOutcome::Completed(issues)) => {
                state.progress.remove(file);
                let summary = distribute(&mut state, file, issues);
                debug!(
                    file,
                    attributed = summary.attributed,
                    file_level = summary.file_level,
                    "file scanned"
                );
                FileOutcome::Completed
            }
            Ok(AnalysisOutcome::Unavailable) => {
                state.mark_error(claimed);
                debug!(file, "analysis service unavailable");
                FileOutcome::Failed
            }
            Err(err) => {
                state.mark_error(claimed);
                if err.is_soft() {
                    warn!(file, error = %err, "file scan failed");
                } else {
                    error!(file, error = %err, "file scan failed unexpectedly");
                }
                FileOutcome::Failed
            }
        }
    }

    /// Send `subscribe:file` once per file while live. Returns whether a
    /// subscription went out.
    async fn subscribe(&self, file: &str) -> bool {
        if !self.transport.is_connected() {
            return false;
        }
        let first = {
            let mut state = self.state();
            state.live && state.subscribed.insert(file.to_string())
        };
        if !first {
            return false;
        }

        let message = ClientMessage::SubscribeFile {
            file_path: file.to_string(),
        };
        if let Err(err) = self.transport.send(&message).await {
            debug!(file, error = %err, "subscribe failed");
            self.state().subscribed.remove(file);
            return false;
        }
        true
    }

    /// Subscribe every known file that has no subscription on the current
    /// connection. Nothing happens while live scanning is off.
    pub async fn resubscribe(&self) -> usize {
        let files: Vec<String> = {
            let state = self.state();
            if !state.live {
                return 0;
            }
            state
                .file_groups()
                .into_iter()
                .map(|group| group.file)
                .collect()
        };

        let mut sent = 0;
        for file in &files {
            if self.subscribe(file).await {
                sent += 1;
            }
        }
        if sent > 0 {
            info!(files = sent, "resubscribed to file changes");
        }
        sent
    }

    // ── Targeted requests ──────────────────────────────────────────────

    /// Re-analyze a single item with `lint:element`.
    pub async fn analyze_item(&self, item_id: &str) -> AppResult<IssueRecord> {
        let (epoch, key, file, data_loc) = {
            let mut state = self.state();
            let item = state
                .items
                .get(item_id)
                .ok_or_else(|| AppError::not_found(format!("item {item_id}")))?;
            let key = item.canonical_key();
            let file = item.file().to_string();
            let data_loc = item.source_location.to_string();
            state.cache.mark_scanning(&key);
            (state.epoch, key, file, data_loc)
        };
        self.scheduler.yield_now().await;

        let result = self.lint.request_element(&file, &data_loc).await;

        let mut state = self.state();
        if state.epoch != epoch || !state.has_key(&key) {
            return Err(AppError::stale(format!("element result for {key}")));
        }
        match result {
            Ok(issues) => {
                state.cache.complete(&key, issues);
                state.recompute();
                state
                    .cache
                    .get(&key)
                    .cloned()
                    .ok_or_else(|| AppError::internal(format!("record {key} vanished")))
            }
            Err(err) => {
                state.cache.mark_error(&key);
                state.recompute();
                Err(err)
            }
        }
    }

    /// Ask the service to drop its cached results, for one file or all.
    pub async fn invalidate_remote_cache(&self, file: Option<&str>) -> AppResult<()> {
        match file {
            Some(file) => self.lint.invalidate(file),
            None => self.lint.clear(),
        }
        self.transport
            .send(&ClientMessage::CacheInvalidate {
                file_path: file.map(str::to_string),
            })
            .await
    }

    /// Run a vision analysis of a route and keep the report.
    pub async fn analyze_route(
        &self,
        route: &str,
        screenshot: Option<String>,
        manifest: Vec<ElementManifest>,
    ) -> AppResult<VisionReport> {
        let report = self.vision.analyze(route, screenshot, manifest).await?;
        self.state()
            .vision_reports
            .insert(route.to_string(), report.clone());

        if let Err(err) = self.capture_sink.persist(&report).await {
            warn!(route, error = %err, "failed to persist vision capture");
        }
        Ok(report)
    }

    /// Change a rule's configuration and wait for the service to confirm.
    ///
    /// The local configuration changes only on confirmation; a refusal
    /// leaves it as it was and is recorded as the last rule error.
    pub async fn set_rule_config(
        &self,
        rule_id: &str,
        severity: RuleSeverity,
        options: Option<Value>,
    ) -> AppResult<RuleConfig> {
        self.state().rules.updating.insert(rule_id.to_string());

        let result = self.rule_requests.set(rule_id, severity, options).await;

        let mut state = self.state();
        state.rules.updating.remove(rule_id);
        match result {
            Ok(config) => {
                info!(rule = rule_id, severity = %config.severity, "rule config confirmed");
                state.rules.apply_config(config.clone());
                state.rules.last_error = None;
                Ok(config)
            }
            Err(err) => {
                warn!(rule = rule_id, error = %err, "rule config not applied");
                state.rules.last_error = Some(RuleError {
                    rule_id: rule_id.to_string(),
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    // ── Read-only accessors ────────────────────────────────────────────

    pub fn record(&self, key: &str) -> Option<IssueRecord> {
        self.state().cache.get(key).cloned()
    }

    pub fn records(&self) -> Vec<IssueRecord> {
        let state = self.state();
        let mut records: Vec<IssueRecord> =
            state.cache.iter().map(|(_, record)| record.clone()).collect();
        records.sort_by(|a, b| a.canonical_key.cmp(&b.canonical_key));
        records
    }

    pub fn file_issues(&self, file: &str) -> Option<Vec<Issue>> {
        self.state().file_issues.get(file).map(<[Issue]>::to_vec)
    }

    pub fn heatmap(&self) -> HeatmapSnapshot {
        self.state().heatmap.clone()
    }

    pub fn items(&self) -> Vec<ObservedItem> {
        self.state().items.values().cloned().collect()
    }

    pub fn phase(&self) -> ScanPhase {
        self.state().phase
    }

    pub fn is_live(&self) -> bool {
        self.state().live
    }

    pub fn is_scanning(&self) -> bool {
        self.state().scan_in_progress
    }

    pub fn epoch(&self) -> u64 {
        self.state().epoch
    }

    pub fn disabled_rules(&self) -> BTreeSet<String> {
        self.state().disabled_rules.iter().cloned().collect()
    }

    /// File → latest reported analysis phase, for files still in flight.
    pub fn progress(&self) -> BTreeMap<String, String> {
        self.state().progress.clone()
    }

    pub fn rule_config(&self, rule_id: &str) -> Option<RuleConfig> {
        self.state().rules.configs.get(rule_id).cloned()
    }

    pub fn rule_metadata(&self) -> Vec<RuleMetadata> {
        self.state().rules.metadata.values().cloned().collect()
    }

    pub fn is_rule_updating(&self, rule_id: &str) -> bool {
        self.state().rules.updating.contains(rule_id)
    }

    pub fn last_rule_error(&self) -> Option<RuleError> {
        self.state().rules.last_error.clone()
    }

    pub fn vision_report(&self, route: &str) -> Option<VisionReport> {
        self.state().vision_reports.get(route).cloned()
    }

    pub fn indexing_status(&self) -> IndexingStatus {
        self.state().indexing.clone()
    }

    pub fn subscribed_files(&self) -> BTreeSet<String> {
        self.state().subscribed.iter().cloned().collect()
    }
}
