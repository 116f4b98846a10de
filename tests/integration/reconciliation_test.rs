//! Reconciliation Integration Tests
//!
//! Server pushes arriving over the connection: file changes, rule changes,
//! pushed results, rule metadata, and the request/response families that
//! ride alongside lint requests (rule config, vision).

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use uilens::core::{ElementManifest, Issue, RuleSeverity, ScanStatus, ServerMessage, VisionIssue};
use uilens::services::correlator::{CaptureSink, VisionReport};
use uilens::services::{LiveScanner, RecordingScheduler, ScannerOptions};
use uilens::{AppError, AppResult, ConnectionManager, ReconnectConfig};

use crate::common::{connected_client, eventually, item, FakeAnalysisService, FakeConnector, URL};

// ============================================================================
// file:changed
// ============================================================================

#[tokio::test]
async fn test_file_changed_push_rescans_that_file() {
    let service = FakeAnalysisService::new();
    service.set_result("a.tsx", vec![Issue::new("r", "old").at("a.tsx:1:0")]);
    let client = connected_client(&service).await;
    client.scanner.set_items(vec![
        item("a", "a.tsx", 1, Some(0)),
        item("b", "b.tsx", 1, Some(0)),
    ]);
    client.scanner.enable_live_scan().await;
    assert_eq!(client.scanner.heatmap().count_for("a"), 1);

    service.set_result(
        "a.tsx",
        vec![
            Issue::new("r", "new").at("a.tsx:1:0"),
            Issue::new("r", "another").at("a.tsx:1:0"),
        ],
    );
    service.push(&ServerMessage::FileChanged {
        file_path: "a.tsx".to_string(),
    });

    assert!(eventually(|| client.scanner.heatmap().count_for("a") == 2).await);
    assert_eq!(service.lint_requests_for("a.tsx").len(), 2);
    assert_eq!(service.lint_requests_for("b.tsx").len(), 1);
    assert_eq!(
        client.scanner.record("a.tsx:1:0").unwrap().status,
        ScanStatus::Complete
    );
}

#[tokio::test]
async fn test_file_changed_for_unknown_file_is_ignored() {
    let service = FakeAnalysisService::new();
    let client = connected_client(&service).await;
    client.scanner.set_items(vec![item("a", "a.tsx", 1, Some(0))]);
    client.scanner.enable_live_scan().await;

    service.push(&ServerMessage::FileChanged {
        file_path: "other.tsx".to_string(),
    });
    assert!(client.scanner.on_file_changed("other.tsx").await.is_none());

    assert!(service.lint_requests_for("other.tsx").is_empty());
    assert_eq!(client.scanner.records().len(), 1);
}

#[tokio::test]
async fn test_reconnect_resubscribes_files() {
    let service = FakeAnalysisService::new();
    let client = connected_client(&service).await;
    client.scanner.set_items(vec![item("a", "a.tsx", 1, Some(0))]);
    client.scanner.enable_live_scan().await;
    assert_eq!(client.scanner.subscribed_files().len(), 1);

    client.connection.connect(URL).await.unwrap();

    assert!(eventually(|| service.received_of("subscribe:file") == 2).await);
    assert!(eventually(|| client.scanner.subscribed_files().len() == 1).await);
    assert_eq!(service.lint_requests_for("a.tsx").len(), 1);
}

#[tokio::test]
async fn test_reconnect_without_live_scan_sends_nothing() {
    let service = FakeAnalysisService::new();
    let client = connected_client(&service).await;
    client.scanner.set_items(vec![item("a", "a.tsx", 1, Some(0))]);

    client.connection.connect(URL).await.unwrap();

    assert!(!eventually(|| service.received_of("subscribe:file") > 0).await);
}

// ============================================================================
// Pushed results and rule changes
// ============================================================================

#[tokio::test]
async fn test_pushed_result_without_request_is_applied() {
    let service = FakeAnalysisService::new();
    let client = connected_client(&service).await;
    client.scanner.set_items(vec![item("a", "a.tsx", 5, Some(1))]);
    client.scanner.enable_live_scan().await;

    service.push(&ServerMessage::LintResult {
        file_path: "a.tsx".to_string(),
        issues: vec![
            Issue::new("r", "pushed").at("a.tsx:5:1"),
            Issue::new("r", "unattributed").at("a.tsx:99:1"),
        ],
        request_id: None,
    });

    assert!(eventually(|| client.scanner.heatmap().count_for("a") == 2).await);
    assert_eq!(client.scanner.file_issues("a.tsx").unwrap().len(), 1);
}

#[tokio::test]
async fn test_rule_config_changed_push_rescans_everything() {
    let service = FakeAnalysisService::new();
    service.set_result("a.tsx", vec![Issue::new("spacing", "gap").at("a.tsx:1:0")]);
    let client = connected_client(&service).await;
    client.scanner.set_items(vec![
        item("a", "a.tsx", 1, Some(0)),
        item("b", "b.tsx", 1, Some(0)),
    ]);
    client.scanner.enable_live_scan().await;
    let epoch = client.scanner.epoch();

    service.set_result("a.tsx", vec![]);
    service.push(&ServerMessage::RuleConfigChanged {
        rule_id: "spacing".to_string(),
        severity: RuleSeverity::Off,
        options: None,
    });

    assert!(eventually(|| service.lint_requests_for("b.tsx").len() == 2).await);
    assert!(eventually(|| !client.scanner.is_scanning()).await);
    assert_eq!(client.scanner.epoch(), epoch + 1);
    assert_eq!(service.lint_requests_for("a.tsx").len(), 2);
    assert_eq!(client.scanner.heatmap().total(), 0);
    assert_eq!(
        client.scanner.rule_config("spacing").unwrap().severity,
        RuleSeverity::Off
    );
}

#[tokio::test]
async fn test_rule_config_round_trip() {
    let service = FakeAnalysisService::new();
    service.refuse_rule("locked");
    let client = connected_client(&service).await;

    let config = client
        .scanner
        .set_rule_config(
            "spacing",
            RuleSeverity::Error,
            Some(serde_json::json!({ "scale": [4, 8, 16] })),
        )
        .await
        .unwrap();
    assert_eq!(config.severity, RuleSeverity::Error);
    assert_eq!(client.scanner.rule_config("spacing"), Some(config));

    let err = client
        .scanner
        .set_rule_config("locked", RuleSeverity::Off, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ServerRejected(ref msg) if msg.contains("locked")));
    assert!(client.scanner.rule_config("locked").is_none());
    assert_eq!(client.scanner.last_rule_error().unwrap().rule_id, "locked");
}

#[tokio::test]
async fn test_rules_metadata_push() {
    let service = FakeAnalysisService::new();
    let client = connected_client(&service).await;

    service.push(
        &serde_json::from_value::<ServerMessage>(serde_json::json!({
            "type": "rules:metadata",
            "rules": [
                { "id": "spacing", "name": "Spacing", "defaultSeverity": "warn" },
                { "id": "contrast", "defaultSeverity": "error", "currentSeverity": "off" }
            ]
        }))
        .unwrap(),
    );

    assert!(eventually(|| client.scanner.rule_metadata().len() == 2).await);
    assert_eq!(
        client.scanner.rule_config("contrast").unwrap().severity,
        RuleSeverity::Off
    );
}

// ============================================================================
// Vision
// ============================================================================

#[derive(Default)]
struct RecordingSink {
    routes: Mutex<Vec<String>>,
}

#[async_trait]
impl CaptureSink for RecordingSink {
    async fn persist(&self, report: &VisionReport) -> AppResult<()> {
        self.routes.lock().unwrap().push(report.route.clone());
        Ok(())
    }
}

#[tokio::test]
async fn test_vision_analysis_round_trip() {
    let service = FakeAnalysisService::new();
    service.set_vision_issues(vec![VisionIssue {
        message: "buttons misaligned".to_string(),
        category: "alignment".to_string(),
        severity: Default::default(),
        element_text: Some("Save".to_string()),
        data_loc: Some("src/Form.tsx:40:6".to_string()),
    }]);

    let scheduler = Arc::new(RecordingScheduler::new());
    let connection = Arc::new(ConnectionManager::new(
        FakeConnector::new(&service),
        scheduler.clone(),
        ReconnectConfig::default(),
    ));
    let sink = Arc::new(RecordingSink::default());
    let scanner = Arc::new(
        LiveScanner::new(connection.clone(), scheduler, ScannerOptions::default())
            .with_capture_sink(sink.clone()),
    );
    scanner.attach(&connection);
    connection.connect(URL).await.unwrap();

    let manifest = vec![ElementManifest {
        id: "save".to_string(),
        data_loc: "src/Form.tsx:40:6".to_string(),
        tag_name: "button".to_string(),
        text: Some("Save".to_string()),
    }];
    let report = scanner
        .analyze_route("/settings", Some("iVBORw0KGgo=".to_string()), manifest)
        .await
        .unwrap();

    assert_eq!(report.issues.len(), 1);
    assert_eq!(report.analysis_time_ms, 850);
    assert_eq!(report.capture.manifest.len(), 1);
    assert_eq!(scanner.vision_report("/settings"), Some(report));
    assert_eq!(*sink.routes.lock().unwrap(), vec!["/settings".to_string()]);
}
