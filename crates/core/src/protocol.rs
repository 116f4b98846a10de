//! Wire Protocol
//!
//! JSON messages exchanged with the analysis service over the persistent
//! connection. Every message is an object tagged by its `type` field; field
//! names are camelCase on the wire.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreResult;
use crate::issue::{Issue, Severity};
use crate::rules::{RuleMetadata, RuleSeverity};

/// Element entry sent with a vision analysis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementManifest {
    pub id: String,
    pub data_loc: String,
    #[serde(default)]
    pub tag_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// A finding from the vision analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionIssue {
    pub message: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_loc: Option<String>,
}

/// Client → server messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "lint:file", rename_all = "camelCase")]
    LintFile { file_path: String, request_id: String },

    #[serde(rename = "lint:element", rename_all = "camelCase")]
    LintElement {
        file_path: String,
        data_loc: String,
        request_id: String,
    },

    #[serde(rename = "subscribe:file", rename_all = "camelCase")]
    SubscribeFile { file_path: String },

    #[serde(rename = "cache:invalidate", rename_all = "camelCase")]
    CacheInvalidate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_path: Option<String>,
    },

    #[serde(rename = "rule:config:set", rename_all = "camelCase")]
    RuleConfigSet {
        rule_id: String,
        severity: RuleSeverity,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        options: Option<Value>,
        request_id: String,
    },

    #[serde(rename = "vision:analyze", rename_all = "camelCase")]
    VisionAnalyze {
        route: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        screenshot: Option<String>,
        manifest: Vec<ElementManifest>,
        request_id: String,
    },
}

impl ClientMessage {
    /// Correlation id carried by request-style messages.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            ClientMessage::LintFile { request_id, .. }
            | ClientMessage::LintElement { request_id, .. }
            | ClientMessage::RuleConfigSet { request_id, .. }
            | ClientMessage::VisionAnalyze { request_id, .. } => Some(request_id),
            ClientMessage::SubscribeFile { .. } | ClientMessage::CacheInvalidate { .. } => None,
        }
    }

    /// The `type` tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::LintFile { .. } => "lint:file",
            ClientMessage::LintElement { .. } => "lint:element",
            ClientMessage::SubscribeFile { .. } => "subscribe:file",
            ClientMessage::CacheInvalidate { .. } => "cache:invalidate",
            ClientMessage::RuleConfigSet { .. } => "rule:config:set",
            ClientMessage::VisionAnalyze { .. } => "vision:analyze",
        }
    }

    pub fn to_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Server → client messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "lint:result", rename_all = "camelCase")]
    LintResult {
        file_path: String,
        #[serde(default)]
        issues: Vec<Issue>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },

    #[serde(rename = "lint:progress", rename_all = "camelCase")]
    LintProgress { file_path: String, phase: String },

    #[serde(rename = "file:changed", rename_all = "camelCase")]
    FileChanged { file_path: String },

    #[serde(rename = "rules:metadata", rename_all = "camelCase")]
    RulesMetadata {
        #[serde(default)]
        rules: Vec<RuleMetadata>,
    },

    #[serde(rename = "rule:config:result", rename_all = "camelCase")]
    RuleConfigResult {
        rule_id: String,
        severity: RuleSeverity,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        options: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        success: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    #[serde(rename = "rule:config:changed", rename_all = "camelCase")]
    RuleConfigChanged {
        rule_id: String,
        severity: RuleSeverity,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        options: Option<Value>,
    },

    #[serde(rename = "vision:result", rename_all = "camelCase")]
    VisionResult {
        route: String,
        #[serde(default)]
        issues: Vec<VisionIssue>,
        #[serde(default)]
        analysis_time: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },

    #[serde(rename = "duplicates:indexing:start", rename_all = "camelCase")]
    DuplicatesIndexingStart {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    #[serde(rename = "duplicates:indexing:progress", rename_all = "camelCase")]
    DuplicatesIndexingProgress {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        current: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        total: Option<u64>,
    },

    #[serde(rename = "duplicates:indexing:complete", rename_all = "camelCase")]
    DuplicatesIndexingComplete {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        total_chunks: Option<u64>,
    },

    #[serde(rename = "duplicates:indexing:error", rename_all = "camelCase")]
    DuplicatesIndexingError {
        #[serde(default)]
        error: String,
    },

    /// Any message type this client does not handle.
    #[serde(other)]
    Unknown,
}

impl ServerMessage {
    pub fn parse(text: &str) -> CoreResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Whether a `rule:config:result` reports success.
    ///
    /// A result without an explicit `success` flag succeeds unless it carries
    /// an error.
    pub fn config_result_succeeded(success: Option<bool>, error: Option<&str>) -> bool {
        success.unwrap_or(error.is_none())
    }
}
