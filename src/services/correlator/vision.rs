//! Vision Analysis Requests
//!
//! `vision:analyze` requests on their own pending map. The capture that was
//! sent (route, screenshot, element manifest) rides along with the pending
//! entry and comes back with the response, so it can be handed to a
//! [`CaptureSink`] afterwards.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uilens_core::{ClientMessage, ElementManifest, VisionIssue};

use super::pending::PendingRequests;
use crate::services::connection::Transport;
use crate::utils::error::{AppError, AppResult};

/// The capture submitted with a vision request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureMetadata {
    pub route: String,
    /// Base64-encoded screenshot, when one was captured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    pub manifest: Vec<ElementManifest>,
    /// RFC 3339 timestamp
    pub captured_at: String,
}

/// A completed vision analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionReport {
    pub route: String,
    pub issues: Vec<VisionIssue>,
    pub analysis_time_ms: u64,
    pub capture: CaptureMetadata,
}

/// Best-effort side channel for finished captures.
#[async_trait]
pub trait CaptureSink: Send + Sync {
    async fn persist(&self, report: &VisionReport) -> AppResult<()>;
}

/// Sink that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingCaptureSink;

#[async_trait]
impl CaptureSink for LoggingCaptureSink {
    async fn persist(&self, report: &VisionReport) -> AppResult<()> {
        info!(
            route = %report.route,
            issues = report.issues.len(),
            elements = report.capture.manifest.len(),
            "vision capture analyzed"
        );
        Ok(())
    }
}

struct VisionPayload {
    issues: Vec<VisionIssue>,
    analysis_time_ms: u64,
}

pub struct VisionRequester {
    transport: Arc<dyn Transport>,
    pending: PendingRequests<VisionPayload, CaptureMetadata>,
    timeout: Duration,
}

impl VisionRequester {
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration) -> Self {
        Self {
            transport,
            pending: PendingRequests::new("vision"),
            timeout,
        }
    }

    pub async fn analyze(
        &self,
        route: &str,
        screenshot: Option<String>,
        manifest: Vec<ElementManifest>,
    ) -> AppResult<VisionReport> {
        if !self.transport.is_connected() {
            return Err(AppError::ConnectionUnavailable);
        }

        let capture = CaptureMetadata {
            route: route.to_string(),
            screenshot: screenshot.clone(),
            manifest: manifest.clone(),
            captured_at: Utc::now().to_rfc3339(),
        };
        let waiter = self.pending.register(route, capture);
        let message = ClientMessage::VisionAnalyze {
            route: route.to_string(),
            screenshot,
            manifest,
            request_id: waiter.request_id.clone(),
        };
        if let Err(err) = self.transport.send(&message).await {
            self.pending.remove(&waiter.request_id);
            return Err(err);
        }
        debug!(route, request_id = %waiter.request_id, "vision analysis requested");

        let (payload, capture) = self.pending.wait(waiter, self.timeout).await?;
        Ok(VisionReport {
            route: route.to_string(),
            issues: payload.issues,
            analysis_time_ms: payload.analysis_time_ms,
            capture,
        })
    }

    /// Route an incoming `vision:result`. Returns `false` when no request
    /// was waiting for it.
    pub fn handle_result(
        &self,
        route: &str,
        issues: Vec<VisionIssue>,
        analysis_time_ms: u64,
        error: Option<String>,
        request_id: Option<&str>,
    ) -> bool {
        let request_id = match request_id {
            Some(id) => id.to_string(),
            None => match self.pending.oldest_for(route) {
                Some(id) => id,
                None => {
                    debug!(route, "ignoring unsolicited vision result");
                    return false;
                }
            },
        };

        match error {
            Some(error) => self
                .pending
                .reject(&request_id, AppError::AnalysisFailed(error)),
            None => self.pending.resolve(
                &request_id,
                VisionPayload {
                    issues,
                    analysis_time_ms,
                },
            ),
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
