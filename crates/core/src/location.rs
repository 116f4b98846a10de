//! Source Locations
//!
//! Canonical identity for rendered items. Many runtime instances (list rows,
//! repeated components) originate from one source location and must share a
//! single cache entry, keyed by `file:line:column`.
//!
//! Locations arrive from two places: the discovery collaborator, which
//! reports `{ file, line, column? }`, and the analysis service, which tags
//! issues with a `file:line:column` string (or the legacy `file:line` form).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Column used in canonical keys when a location carries none.
pub const DEFAULT_COLUMN: u32 = 0;

/// Canonical cache key in `file:line:column` form.
pub type CanonicalKey = String;

/// A position in a source file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32, column: Option<u32>) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    /// Column with the canonical default applied.
    pub fn column_or_default(&self) -> u32 {
        self.column.unwrap_or(DEFAULT_COLUMN)
    }

    /// The canonical cache key for this location.
    pub fn canonical_key(&self) -> CanonicalKey {
        canonical_key(self)
    }

    /// Whether two locations denote the same source position.
    ///
    /// A missing column matches any column on the same line; the legacy
    /// `file:line` format never carried one.
    pub fn same_location(&self, other: &SourceLocation) -> bool {
        if self.file != other.file || self.line != other.line {
            return false;
        }
        match (self.column, other.column) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }

    /// Parse a `file:line:column` or legacy `file:line` string.
    ///
    /// Splits from the right so that paths containing `:` (drive letters,
    /// URL-ish module ids) survive intact.
    pub fn parse(raw: &str) -> CoreResult<Self> {
        let invalid = || CoreError::invalid_location(raw);

        let (head, last) = raw.rsplit_once(':').ok_or_else(invalid)?;
        let last: u32 = last.parse().map_err(|_| invalid())?;

        if let Some((file, line)) = head.rsplit_once(':') {
            if let (false, Ok(line)) = (file.is_empty(), line.parse::<u32>()) {
                return Ok(Self::new(file, line, Some(last)));
            }
        }

        if head.is_empty() {
            return Err(invalid());
        }
        Ok(Self::new(head, last, None))
    }
}

/// `file:line[:column]`, the form used for `dataLoc` on the wire.
impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.column {
            Some(column) => write!(f, "{}:{}:{}", self.file, self.line, column),
            None => write!(f, "{}:{}", self.file, self.line),
        }
    }
}

/// Compute the canonical key of a location.
///
/// Pure and deterministic: the full path and both numbers are kept, so keys
/// of distinct files or lines never collide.
pub fn canonical_key(location: &SourceLocation) -> CanonicalKey {
    format!(
        "{}:{}:{}",
        location.file,
        location.line,
        location.column_or_default()
    )
}

/// Normalize a key reported by the analysis service.
///
/// Returns the parsed location, or `None` when the string is not a location.
pub fn parse_reported_key(raw: &str) -> Option<SourceLocation> {
    SourceLocation::parse(raw).ok()
}
