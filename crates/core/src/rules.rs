//! Rule Configuration
//!
//! Rule metadata and per-rule configuration as published by the analysis
//! service. Configuration changes are round-tripped through the service and
//! only applied locally once it confirms them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Configured severity of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleSeverity {
    Error,
    #[serde(alias = "warning")]
    Warn,
    Off,
}

impl RuleSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleSeverity::Error => "error",
            RuleSeverity::Warn => "warn",
            RuleSeverity::Off => "off",
        }
    }
}

impl std::fmt::Display for RuleSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current configuration of one rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleConfig {
    pub rule_id: String,
    pub severity: RuleSeverity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
}

impl RuleConfig {
    pub fn new(rule_id: impl Into<String>, severity: RuleSeverity) -> Self {
        Self {
            rule_id: rule_id.into(),
            severity,
            options: None,
        }
    }

    pub fn with_options(mut self, options: Value) -> Self {
        self.options = Some(options);
        self
    }
}

/// Description of a rule published in `rules:metadata`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleMetadata {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_rule_severity")]
    pub default_severity: RuleSeverity,
    #[serde(default)]
    pub current_severity: Option<RuleSeverity>,
    #[serde(default)]
    pub current_options: Option<Value>,
    #[serde(default)]
    pub docs: Option<String>,
}

fn default_rule_severity() -> RuleSeverity {
    RuleSeverity::Warn
}

impl RuleMetadata {
    /// The configuration this metadata implies.
    pub fn effective_config(&self) -> RuleConfig {
        RuleConfig {
            rule_id: self.id.clone(),
            severity: self.current_severity.unwrap_or(self.default_severity),
            options: self.current_options.clone(),
        }
    }
}
