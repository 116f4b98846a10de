//! Rule Configuration Requests
//!
//! `rule:config:set` is confirmed by a `rule:config:result` that names the
//! rule but carries no correlation id, so confirmations are matched to the
//! oldest pending request for that rule.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};
use uilens_core::{ClientMessage, RuleConfig, RuleSeverity, ServerMessage};

use super::pending::PendingRequests;
use crate::services::connection::Transport;
use crate::utils::error::{AppError, AppResult};

pub struct RuleConfigRequester {
    transport: Arc<dyn Transport>,
    pending: PendingRequests<RuleConfig>,
    timeout: Duration,
}

impl RuleConfigRequester {
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration) -> Self {
        Self {
            transport,
            pending: PendingRequests::new("rule-config"),
            timeout,
        }
    }

    /// Ask the service to change a rule and wait for its confirmation.
    ///
    /// Resolves with the configuration the service confirmed.
    pub async fn set(
        &self,
        rule_id: &str,
        severity: RuleSeverity,
        options: Option<Value>,
    ) -> AppResult<RuleConfig> {
        if !self.transport.is_connected() {
            return Err(AppError::ConnectionUnavailable);
        }

        let waiter = self.pending.register(rule_id, ());
        let message = ClientMessage::RuleConfigSet {
            rule_id: rule_id.to_string(),
            severity,
            options,
            request_id: waiter.request_id.clone(),
        };
        if let Err(err) = self.transport.send(&message).await {
            self.pending.remove(&waiter.request_id);
            return Err(err);
        }
        debug!(rule = rule_id, %severity, "rule config change requested");

        let (config, ()) = self.pending.wait(waiter, self.timeout).await?;
        Ok(config)
    }

    /// Route an incoming `rule:config:result`.
    pub fn handle_result(
        &self,
        rule_id: &str,
        severity: RuleSeverity,
        options: Option<Value>,
        success: Option<bool>,
        error: Option<String>,
    ) -> bool {
        let Some(request_id) = self.pending.oldest_for(rule_id) else {
            debug!(rule = rule_id, "ignoring unsolicited rule config result");
            return false;
        };

        if ServerMessage::config_result_succeeded(success, error.as_deref()) {
            let mut config = RuleConfig::new(rule_id, severity);
            config.options = options;
            self.pending.resolve(&request_id, config)
        } else {
            let reason = error.unwrap_or_else(|| format!("rule '{rule_id}' update rejected"));
            warn!(rule = rule_id, error = %reason, "rule config change rejected");
            self.pending.reject(&request_id, AppError::rejected(reason))
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
