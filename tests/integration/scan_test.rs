//! Scan Integration Tests
//!
//! Full and incremental scans against the fake analysis service:
//! - one request per file, one record per source location
//! - soft failures (timeout, no connection) mark keys as errored
//! - disabling mid-scan aborts and drops late results

use std::time::Duration;

use uilens::core::{ClientMessage, Issue, ScanStatus, ServerMessage};
use uilens::services::live::ScanPhase;
use uilens::{ScannerOptions, SettingsStore};

use crate::common::{
    client, client_with, connected_client, eventually, item, FakeAnalysisService, FakeConnector,
    URL,
};

// ============================================================================
// Full scan
// ============================================================================

#[tokio::test]
async fn test_full_scan_over_connection() {
    let service = FakeAnalysisService::new();
    service.set_result(
        "src/Table.tsx",
        vec![
            Issue::new("spacing", "uneven cell padding").at("src/Table.tsx:12:6"),
            Issue::new("semantic", "table without caption"),
        ],
    );
    service.set_result(
        "src/Nav.tsx",
        vec![Issue::new("contrast", "low contrast").at("src/Nav.tsx:4")],
    );
    let client = connected_client(&service).await;
    client.scanner.set_items(vec![
        item("cell-1", "src/Table.tsx", 12, Some(6)),
        item("cell-2", "src/Table.tsx", 12, Some(6)),
        item("cell-3", "src/Table.tsx", 12, Some(6)),
        item("nav-a", "src/Nav.tsx", 4, Some(9)),
        item("nav-b", "src/Nav.tsx", 4, Some(2)),
    ]);

    let summary = client.scanner.enable_live_scan().await;

    assert_eq!(summary.files, 2);
    assert_eq!(summary.completed, 2);
    assert_eq!(client.scanner.phase(), ScanPhase::Complete);
    assert_eq!(service.lint_requests_for("src/Table.tsx").len(), 1);
    assert_eq!(service.lint_requests_for("src/Nav.tsx").len(), 1);
    assert_eq!(service.received_of("subscribe:file"), 2);

    // Largest file first.
    let first = service
        .received()
        .into_iter()
        .find_map(|m| match m {
            ClientMessage::LintFile { file_path, .. } => Some(file_path),
            _ => None,
        })
        .unwrap();
    assert_eq!(first, "src/Table.tsx");

    let cell = client.scanner.record("src/Table.tsx:12:6").unwrap();
    assert_eq!(cell.status, ScanStatus::Complete);
    assert_eq!(cell.issues.len(), 1);
    assert_eq!(
        client.scanner.file_issues("src/Table.tsx").unwrap().len(),
        1
    );

    // Legacy key lands on the lowest column of line 4.
    assert_eq!(client.scanner.record("src/Nav.tsx:4:2").unwrap().issues.len(), 1);
    assert!(client.scanner.record("src/Nav.tsx:4:9").unwrap().issues.is_empty());

    let heatmap = client.scanner.heatmap();
    assert_eq!(heatmap.count_for("cell-1"), 2);
    assert_eq!(heatmap.count_for("cell-2"), 1);
    assert_eq!(heatmap.count_for("nav-b"), 1);
    assert_eq!(heatmap.count_for("nav-a"), 0);
    assert_eq!(heatmap.total(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_file_times_out_as_error() {
    let service = FakeAnalysisService::new();
    service.silence("src/Slow.tsx");
    let client = connected_client(&service).await;
    client.scanner.set_items(vec![
        item("slow", "src/Slow.tsx", 1, Some(0)),
        item("fast", "src/Fast.tsx", 1, Some(0)),
    ]);

    let started = tokio::time::Instant::now();
    let summary = client.scanner.enable_live_scan().await;

    assert!(started.elapsed() >= Duration::from_secs(120));
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.completed, 1);
    assert_eq!(
        client.scanner.record("src/Slow.tsx:1:0").unwrap().status,
        ScanStatus::Error
    );
    assert_eq!(
        client.scanner.record("src/Fast.tsx:1:0").unwrap().status,
        ScanStatus::Complete
    );
}

#[tokio::test]
async fn test_unreachable_service_marks_everything_error() {
    let service = FakeAnalysisService::new();
    let connector = FakeConnector::new(&service);
    connector.set_reachable(false);
    let client = client(connector.clone());

    assert!(client.connection.connect(URL).await.is_err());
    client.scanner.set_items(vec![
        item("a", "a.tsx", 1, Some(0)),
        item("b", "b.tsx", 1, Some(0)),
    ]);

    let summary = client.scanner.enable_live_scan().await;

    assert_eq!(summary.failed, 2);
    assert!(service.received().is_empty());
    assert!(client
        .scanner
        .records()
        .iter()
        .all(|record| record.status == ScanStatus::Error));

    // The service comes back: an explicit connect and a rescan recover.
    assert!(eventually(|| connector.attempts() == 6).await);
    connector.set_reachable(true);
    client.connection.connect(URL).await.unwrap();

    let summary = client.scanner.run_full_scan().await;
    assert_eq!(summary.completed, 2);
    assert!(client
        .scanner
        .records()
        .iter()
        .all(|record| record.status == ScanStatus::Complete));
}

#[tokio::test]
async fn test_disable_mid_scan_drops_late_result() {
    let service = FakeAnalysisService::new();
    service.silence("a.tsx");
    let client = connected_client(&service).await;
    client.scanner.set_items(vec![
        item("a1", "a.tsx", 1, Some(0)),
        item("a2", "a.tsx", 2, Some(0)),
        item("b", "b.tsx", 1, Some(0)),
    ]);

    let scanner = client.scanner.clone();
    let scan = tokio::spawn(async move { scanner.enable_live_scan().await });
    assert!(eventually(|| service.lint_requests_for("a.tsx").len() == 1).await);

    client.scanner.disable_live_scan();
    let request_id = service.lint_requests_for("a.tsx").remove(0);
    service.push(&ServerMessage::LintResult {
        file_path: "a.tsx".to_string(),
        issues: vec![Issue::new("r", "late").at("a.tsx:1:0")],
        request_id: Some(request_id),
    });

    let summary = scan.await.unwrap();
    assert!(summary.aborted);
    assert_eq!(summary.discarded, 1);
    assert!(client.scanner.records().is_empty());
    assert!(service.lint_requests_for("b.tsx").is_empty());
    assert_eq!(client.scanner.heatmap().total(), 0);
}

// ============================================================================
// Incremental scans and targeted requests
// ============================================================================

#[tokio::test]
async fn test_new_items_scan_only_their_files() {
    let service = FakeAnalysisService::new();
    service.set_result("a.tsx", vec![Issue::new("r", "a").at("a.tsx:1:0")]);
    service.set_result("c.tsx", vec![Issue::new("r", "c").at("c.tsx:3:1")]);
    let client = connected_client(&service).await;
    client.scanner.set_items(vec![item("a1", "a.tsx", 1, Some(0))]);
    client.scanner.enable_live_scan().await;

    let summary = client
        .scanner
        .scan_new_items(vec![
            item("a2", "a.tsx", 1, Some(0)),
            item("c1", "c.tsx", 3, Some(1)),
        ])
        .await;

    assert_eq!(summary.files, 1);
    assert_eq!(service.lint_requests_for("a.tsx").len(), 1);
    assert_eq!(service.lint_requests_for("c.tsx").len(), 1);
    assert_eq!(client.scanner.record("c.tsx:3:1").unwrap().issues.len(), 1);
    assert_eq!(client.scanner.heatmap().count_for("a2"), 1);
}

#[tokio::test]
async fn test_analyze_item_sends_element_request() {
    let service = FakeAnalysisService::new();
    let client = connected_client(&service).await;
    client.scanner.set_items(vec![item("btn", "src/Form.tsx", 30, Some(8))]);
    client.scanner.enable_live_scan().await;
    service.set_result(
        "src/Form.tsx",
        vec![Issue::new("touch-target", "too small").at("src/Form.tsx:30:8")],
    );

    let record = client.scanner.analyze_item("btn").await.unwrap();

    assert_eq!(record.issues.len(), 1);
    let element = service
        .received()
        .into_iter()
        .find_map(|m| match m {
            ClientMessage::LintElement { data_loc, .. } => Some(data_loc),
            _ => None,
        })
        .unwrap();
    assert_eq!(element, "src/Form.tsx:30:8");
}

#[tokio::test]
async fn test_disabled_rules_filter_counts_only() {
    let service = FakeAnalysisService::new();
    service.set_result(
        "a.tsx",
        vec![
            Issue::new("spacing", "gap").at("a.tsx:1:0"),
            Issue::new("spacing", "file-wide"),
            Issue::new("contrast", "low").at("a.tsx:1:0"),
        ],
    );
    let client = connected_client(&service).await;
    client.scanner.set_items(vec![item("a", "a.tsx", 1, Some(0))]);
    client.scanner.enable_live_scan().await;
    assert_eq!(client.scanner.heatmap().count_for("a"), 3);

    client.scanner.toggle_disabled_rule("spacing");

    assert_eq!(client.scanner.heatmap().count_for("a"), 1);
    assert_eq!(client.scanner.record("a.tsx:1:0").unwrap().issues.len(), 2);
    assert_eq!(service.lint_requests_for("a.tsx").len(), 1);
}

#[tokio::test]
async fn test_disabled_rules_carry_over_through_settings() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("settings.json");
    let mut store = SettingsStore::load_from(&path).unwrap();
    assert!(store.toggle_disabled_rule("spacing").unwrap());

    // A later run starts from the saved settings.
    let store = SettingsStore::load_from(&path).unwrap();
    let service = FakeAnalysisService::new();
    service.set_result(
        "a.tsx",
        vec![
            Issue::new("spacing", "gap").at("a.tsx:1:0"),
            Issue::new("contrast", "low").at("a.tsx:1:0"),
        ],
    );
    let client = client_with(
        FakeConnector::new(&service),
        ScannerOptions::from(store.settings()),
    );
    client.connection.connect(URL).await.unwrap();
    client.scanner.set_items(vec![item("a", "a.tsx", 1, Some(0))]);

    client.scanner.enable_live_scan().await;

    assert_eq!(client.scanner.heatmap().count_for("a"), 1);
    assert!(client.scanner.disabled_rules().contains("spacing"));
}
