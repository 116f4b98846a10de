//! Data Models
//!
//! Client-side data structures. Wire and cache types live in `uilens-core`.

pub mod settings;

pub use settings::*;
