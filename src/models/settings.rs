//! Settings Models
//!
//! Client configuration persisted between sessions. Only auxiliary settings
//! live here; the issue cache itself is never persisted.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::services::connection::ReconnectConfig;

/// Default analysis service endpoint
pub const DEFAULT_SERVER_URL: &str = "ws://localhost:9234";

/// Default timeout for correlated requests (2 minutes)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Client configuration stored in settings.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSettings {
    /// WebSocket URL of the analysis service
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Timeout for `lint:file` / `lint:element` / `rule:config:set`
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Timeout for `vision:analyze`
    #[serde(default = "default_request_timeout")]
    pub vision_timeout_secs: u64,
    /// Reconnect backoff
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    /// Rules hidden from heatmap counts
    #[serde(default)]
    pub disabled_rules: BTreeSet<String>,
    /// Start live scanning as soon as a connection is open
    #[serde(default)]
    pub live_scan_on_start: bool,
    /// Show the heatmap overlay
    #[serde(default = "default_true")]
    pub heatmap_enabled: bool,
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_true() -> bool {
    true
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            vision_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            reconnect: ReconnectConfig::default(),
            disabled_rules: BTreeSet::new(),
            live_scan_on_start: false,
            heatmap_enabled: true,
        }
    }
}

/// Settings update request (partial update)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SettingsUpdate {
    pub server_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub vision_timeout_secs: Option<u64>,
    pub reconnect: Option<ReconnectConfig>,
    pub disabled_rules: Option<BTreeSet<String>>,
    pub live_scan_on_start: Option<bool>,
    pub heatmap_enabled: Option<bool>,
}

impl ClientSettings {
    /// Apply a partial update to the settings
    pub fn apply_update(&mut self, update: SettingsUpdate) {
        if let Some(url) = update.server_url {
            self.server_url = url;
        }
        if let Some(timeout) = update.request_timeout_secs {
            self.request_timeout_secs = timeout;
        }
        if let Some(timeout) = update.vision_timeout_secs {
            self.vision_timeout_secs = timeout;
        }
        if let Some(reconnect) = update.reconnect {
            self.reconnect = reconnect;
        }
        if let Some(rules) = update.disabled_rules {
            self.disabled_rules = rules;
        }
        if let Some(live) = update.live_scan_on_start {
            self.live_scan_on_start = live;
        }
        if let Some(enabled) = update.heatmap_enabled {
            self.heatmap_enabled = enabled;
        }
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<(), String> {
        if !(self.server_url.starts_with("ws://") || self.server_url.starts_with("wss://")) {
            return Err(format!(
                "Invalid server_url: {}. Must start with ws:// or wss://",
                self.server_url
            ));
        }

        if self.request_timeout_secs == 0 || self.vision_timeout_secs == 0 {
            return Err("Request timeouts must be at least 1 second".to_string());
        }

        if self.reconnect.base_delay_ms == 0 {
            return Err("reconnect.base_delay_ms must be positive".to_string());
        }

        if self.reconnect.max_delay_ms < self.reconnect.base_delay_ms {
            return Err("reconnect.max_delay_ms cannot be below base_delay_ms".to_string());
        }

        Ok(())
    }
}
