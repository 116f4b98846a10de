//! Shared test wiring: an in-process analysis service reached through a
//! channel-backed connector, and a client built the way the binary builds it.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use uilens::core::{ClientMessage, Issue, ObservedItem, ServerMessage, SourceLocation, VisionIssue};
use uilens::services::connection::{Connector, DuplexChannel, ReconnectConfig};
use uilens::services::{ConnectionManager, LiveScanner, RecordingScheduler, ScannerOptions};
use uilens::{AppError, AppResult};

pub const URL: &str = "ws://analysis.test";

#[derive(Default)]
struct ServiceState {
    results: Mutex<HashMap<String, Vec<Issue>>>,
    silent: Mutex<HashSet<String>>,
    refused_rules: Mutex<HashSet<String>>,
    vision_issues: Mutex<Vec<VisionIssue>>,
    received: Mutex<Vec<ClientMessage>>,
    peers: Mutex<Vec<mpsc::UnboundedSender<String>>>,
}

impl ServiceState {
    fn reply_to(&self, message: &ClientMessage) -> Option<ServerMessage> {
        match message {
            ClientMessage::LintFile {
                file_path,
                request_id,
            } => {
                if self.silent.lock().unwrap().contains(file_path) {
                    return None;
                }
                Some(ServerMessage::LintResult {
                    file_path: file_path.clone(),
                    issues: self.issues_for(file_path),
                    request_id: Some(request_id.clone()),
                })
            }
            ClientMessage::LintElement {
                file_path,
                data_loc,
                request_id,
            } => Some(ServerMessage::LintResult {
                file_path: file_path.clone(),
                issues: self
                    .issues_for(file_path)
                    .into_iter()
                    .filter(|issue| issue.canonical_key.as_deref() == Some(data_loc.as_str()))
                    .collect(),
                request_id: Some(request_id.clone()),
            }),
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
                    error: refused.then(|| format!("rule {rule_id} is locked")),
                })
            }
            ClientMessage::VisionAnalyze {
                route, request_id, ..
            } => Some(ServerMessage::VisionResult {
                route: route.clone(),
                issues: self.vision_issues.lock().unwrap().clone(),
                analysis_time: 850,
                error: None,
                request_id: Some(request_id.clone()),
            }),
            ClientMessage::SubscribeFile { .. } | ClientMessage::CacheInvalidate { .. } => None,
        }
    }

    fn issues_for(&self, file: &str) -> Vec<Issue> {
        self.results
            .lock()
            .unwrap()
            .get(file)
            .cloned()
            .unwrap_or_default()
    }
}

/// Analysis service double. Every accepted connection gets its own task that
/// records client messages and answers them from the scripted results.
#[derive(Clone, Default)]
pub struct FakeAnalysisService {
    state: Arc<ServiceState>,
}

impl FakeAnalysisService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_result(&self, file: &str, issues: Vec<Issue>) {
        self.state
            .results
            .lock()
            .unwrap()
            .insert(file.to_string(), issues);
    }

    pub fn silence(&self, file: &str) {
        self.state.silent.lock().unwrap().insert(file.to_string());
    }

    pub fn refuse_rule(&self, rule_id: &str) {
        self.state
            .refused_rules
            .lock()
            .unwrap()
            .insert(rule_id.to_string());
    }

    pub fn set_vision_issues(&self, issues: Vec<VisionIssue>) {
        *self.state.vision_issues.lock().unwrap() = issues;
    }

    pub fn received(&self) -> Vec<ClientMessage> {
        self.state.received.lock().unwrap().clone()
    }

    pub fn received_of(&self, kind: &str) -> usize {
        self.received().iter().filter(|m| m.kind() == kind).count()
    }

    pub fn lint_requests_for(&self, file: &str) -> Vec<String> {
        self.received()
            .into_iter()
            .filter_map(|m| match m {
                ClientMessage::LintFile {
                    file_path,
                    request_id,
                } if file_path == file => Some(request_id),
                _ => None,
            })
            .collect()
    }

    /// Send a message to every open connection.
    pub fn push(&self, message: &ServerMessage) {
        let text = serde_json::to_string(message).unwrap();
        for peer in self.state.peers.lock().unwrap().iter() {
            let _ = peer.send(text.clone());
        }
    }

    fn accept(&self) -> DuplexChannel {
        let (channel, to_client, mut from_client) = DuplexChannel::pair();
        self.state.peers.lock().unwrap().push(to_client.clone());

        let state = self.state.clone();
        tokio::spawn(async move {
            while let Some(text) = from_client.recv().await {
                let message: ClientMessage = serde_json::from_str(&text).unwrap();
                state.received.lock().unwrap().push(message.clone());
                if let Some(reply) = state.reply_to(&message) {
                    let _ = to_client.send(serde_json::to_string(&reply).unwrap());
                }
            }
        });
        channel
    }
}

/// Connector that hands out connections to a [`FakeAnalysisService`] while
/// it is reachable.
pub struct FakeConnector {
    service: FakeAnalysisService,
    reachable: AtomicBool,
    attempts: AtomicUsize,
}

impl FakeConnector {
    pub fn new(service: &FakeAnalysisService) -> Arc<Self> {
        Arc::new(Self {
            service: service.clone(),
            reachable: AtomicBool::new(true),
            attempts: AtomicUsize::new(0),
        })
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, _url: &str) -> AppResult<DuplexChannel> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(AppError::websocket("connection refused"));
        }
        Ok(self.service.accept())
    }
}

pub struct Client {
    pub connection: Arc<ConnectionManager>,
    pub scanner: Arc<LiveScanner>,
    pub scheduler: Arc<RecordingScheduler>,
}

pub fn client(connector: Arc<FakeConnector>) -> Client {
    client_with(connector, ScannerOptions::default())
}

pub fn client_with(connector: Arc<FakeConnector>, options: ScannerOptions) -> Client {
    let scheduler = Arc::new(RecordingScheduler::new());
    let connection = Arc::new(ConnectionManager::new(
        connector,
        scheduler.clone(),
        ReconnectConfig::default(),
    ));
    let scanner = Arc::new(LiveScanner::new(
        connection.clone(),
        scheduler.clone(),
        options,
    ));
    scanner.attach(&connection);
    Client {
        connection,
        scanner,
        scheduler,
    }
}

/// A client already connected to `service`.
pub async fn connected_client(service: &FakeAnalysisService) -> Client {
    let client = client(FakeConnector::new(service));
    client.connection.connect(URL).await.unwrap();
    client
}

pub fn item(id: &str, file: &str, line: u32, column: Option<u32>) -> ObservedItem {
    ObservedItem::new(id, SourceLocation::new(file, line, column))
}

/// Yield until `check` passes, giving spawned tasks a chance to run.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..500 {
        if check() {
            return true;
        }
        tokio::task::yield_now().await;
    }
    check()
}
