//! JSON Settings Management
//!
//! Handles reading and writing the client settings file. This is the only
//! state uilens persists; issue caches live in memory for the session.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::models::settings::{ClientSettings, SettingsUpdate};
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::{ensure_dir, settings_path};

/// Settings store backed by a JSON file
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    settings: ClientSettings,
}

impl SettingsStore {
    /// Open the store at the default location, creating defaults if absent
    pub fn new() -> AppResult<Self> {
        Self::load_from(settings_path()?)
    }

    /// Open the store at an explicit path, creating defaults if absent
    pub fn load_from(path: impl Into<PathBuf>) -> AppResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }

        let settings = if path.exists() {
            Self::load_from_file(&path)?
        } else {
            let defaults = ClientSettings::default();
            Self::save_to_file(&path, &defaults)?;
            defaults
        };
        debug!(path = %path.display(), "settings loaded");

        Ok(Self { path, settings })
    }

    fn load_from_file(path: &Path) -> AppResult<ClientSettings> {
        let content = fs::read_to_string(path)?;
        let settings: ClientSettings = serde_json::from_str(&content)?;
        settings.validate().map_err(AppError::validation)?;
        Ok(settings)
    }

    fn save_to_file(path: &Path, settings: &ClientSettings) -> AppResult<()> {
        settings.validate().map_err(AppError::validation)?;
        let content = serde_json::to_string_pretty(settings)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the current settings
    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Apply a partial update and persist it.
    ///
    /// Invalid updates are rejected and leave the in-memory settings unchanged.
    pub fn update(&mut self, update: SettingsUpdate) -> AppResult<ClientSettings> {
        let mut next = self.settings.clone();
        next.apply_update(update);
        Self::save_to_file(&self.path, &next)?;
        self.settings = next;
        Ok(self.settings.clone())
    }

    /// Flip one rule in the persisted disabled set; returns whether it is now disabled
    pub fn toggle_disabled_rule(&mut self, rule_id: &str) -> AppResult<bool> {
        let mut rules = self.settings.disabled_rules.clone();
        let disabled = if rules.remove(rule_id) {
            false
        } else {
            rules.insert(rule_id.to_string());
            true
        };
        self.update(SettingsUpdate {
            disabled_rules: Some(rules),
            ..Default::default()
        })?;
        Ok(disabled)
    }

    /// Reload settings from disk
    pub fn reload(&mut self) -> AppResult<()> {
        self.settings = Self::load_from_file(&self.path)?;
        Ok(())
    }

    /// Reset settings to defaults
    pub fn reset(&mut self) -> AppResult<()> {
        self.settings = ClientSettings::default();
        Self::save_to_file(&self.path, &self.settings)
    }
}
