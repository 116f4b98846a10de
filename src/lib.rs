//! uilens - Live UI Issue Cache
//!
//! Client runtime that keeps a per-location issue cache in sync with a
//! remote analysis service. It includes:
//! - Connection management with reconnect backoff
//! - Request/response correlation with timeouts
//! - The live scanner: full and incremental scans, push reconciliation
//! - Settings persistence and utilities
//!
//! Shared wire and cache types come from `uilens-core` and are re-exported
//! here as `core`.

pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

pub use uilens_core as core;

pub use models::settings::{ClientSettings, SettingsUpdate};
pub use services::connection::{ConnectionManager, ReconnectConfig, Transport};
pub use services::live::{LiveScanner, ScanSummary, ScannerOptions};
pub use storage::config::SettingsStore;
pub use utils::error::{AppError, AppResult};
