//! In-process analysis service for scanner tests.
//!
//! Replies to requests synchronously from inside `send`, so a request's
//! response is routed before the requester starts waiting on it.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};

use async_trait::async_trait;
use uilens_core::{ClientMessage, Issue, ObservedItem, ServerMessage, SourceLocation};

use super::scanner::{LiveScanner, ScannerOptions};
use crate::services::connection::Transport;
use crate::services::scheduler::RecordingScheduler;
use crate::utils::error::AppResult;

#[derive(Default)]
pub(crate) struct FakeService {
    connected: AtomicBool,
    sent: Mutex<Vec<ClientMessage>>,
    results: Mutex<HashMap<String, Vec<Issue>>>,
    /// Files whose requests are never answered
    silent: Mutex<HashSet<String>>,
    refused_rules: Mutex<HashSet<String>>,
    scanner: OnceLock<Weak<LiveScanner>>,
}

impl FakeService {
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn set_result(&self, file: &str, issues: Vec<Issue>) {
        self.results.lock().unwrap().insert(file.to_string(), issues);
    }

    pub fn silence(&self, file: &str) {
        self.silent.lock().unwrap().insert(file.to_string());
    }

    pub fn refuse_rule(&self, rule_id: &str) {
        self.refused_rules.lock().unwrap().insert(rule_id.to_string());
    }

    pub fn sent(&self) -> Vec<ClientMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_of(&self, kind: &str) -> usize {
        self.sent().iter().filter(|m| m.kind() == kind).count()
    }

    pub fn lint_requests_for(&self, file: &str) -> usize {
        self.sent()
            .iter()
            .filter(|m| matches!(m, ClientMessage::LintFile { file_path, .. } if file_path == file))
            .count()
    }

    fn reply_to(&self, message: &ClientMessage) -> Option<ServerMessage> {
        match message {
            ClientMessage::LintFile {
                file_path,
                request_id,
            } => {
                if self.silent.lock().unwrap().contains(file_path) {
                    return None;
                }
                let issues = self
                    .results
                    .lock()
                    .unwrap()
                    .get(file_path)
                    .cloned()
                    .unwrap_or_default();
                Some(ServerMessage::LintResult {
                    file_path: file_path.clone(),
                    issues,
                    request_id: Some(request_id.clone()),
                })
            }
            ClientMessage::LintElement {
                file_path,
                data_loc,
                request_id,
            } => {
                let issues = self
                    .results
                    .lock()
                    .unwrap()
                    .get(file_path)
                    .map(|issues| {
                        issues
                            .iter()
                            .filter(|issue| {
                                issue.canonical_key.as_deref() == Some(data_loc.as_str())
                            })
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default();
                Some(ServerMessage::LintResult {
                    file_path: file_path.clone(),
                    issues,
                    request_id: Some(request_id.clone()),
                })
            }
            ClientMessage::RuleConfigSet {
                rule_id,
                severity,
                options,
                ..
            } => {
                let refused = self.refused_rules.lock().unwrap().contains(rule_id);
                Some(ServerMessage::RuleConfigResult {
                    rule_id: rule_id.clone(),
                    severity: *severity,
                    options: options.clone(),
                    success: Some(!refused),
                    error: refused.then(|| format!("unknown rule {rule_id}")),
                })
            }
            _ => None,
        }
    }
}

#[async_trait]
impl Transport for FakeService {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send(&self, message: &ClientMessage) -> AppResult<()> {
        self.sent.lock().unwrap().push(message.clone());
        let reply = self.reply_to(message);
        if let (Some(reply), Some(scanner)) =
            (reply, self.scanner.get().and_then(Weak::upgrade))
        {
            scanner.handle_server_message(reply);
        }
        Ok(())
    }
}

pub(crate) struct Harness {
    pub scanner: Arc<LiveScanner>,
    pub service: Arc<FakeService>,
    pub scheduler: Arc<RecordingScheduler>,
}

pub(crate) fn harness() -> Harness {
    harness_with(ScannerOptions::default())
}

pub(crate) fn harness_with(options: ScannerOptions) -> Harness {
    let service = Arc::new(FakeService::default());
    service.set_connected(true);
    let scheduler = Arc::new(RecordingScheduler::new());
    let scanner = Arc::new(LiveScanner::new(
        service.clone(),
        scheduler.clone(),
        options,
    ));
    let _ = service.scanner.set(Arc::downgrade(&scanner));
    Harness {
        scanner,
        service,
        scheduler,
    }
}

pub(crate) fn item(id: &str, file: &str, line: u32, column: Option<u32>) -> ObservedItem {
    ObservedItem::new(id, SourceLocation::new(file, line, column))
}

pub(crate) async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}
