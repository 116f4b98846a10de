//! Storage Layer
//!
//! JSON persistence of client settings. Analysis results are never persisted.

pub mod config;

pub use config::*;
