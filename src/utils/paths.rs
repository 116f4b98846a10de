//! Cross-Platform Path Utilities
//!
//! Resolves where uilens keeps its auxiliary settings.

use std::path::{Path, PathBuf};

use crate::utils::error::{AppError, AppResult};

/// Get the platform configuration directory
pub fn config_dir() -> AppResult<PathBuf> {
    dirs::config_dir().ok_or_else(|| AppError::config("Could not determine config directory"))
}

/// Get the uilens directory (<config_dir>/uilens/)
pub fn uilens_dir() -> AppResult<PathBuf> {
    Ok(config_dir()?.join("uilens"))
}

/// Get the settings file path (<config_dir>/uilens/settings.json)
pub fn settings_path() -> AppResult<PathBuf> {
    Ok(uilens_dir()?.join("settings.json"))
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> AppResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
