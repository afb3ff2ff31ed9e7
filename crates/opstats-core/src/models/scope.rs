//! Canonical query scope
//!
//! A `Scope` is the fully resolved form of a caller-supplied selector:
//! opaque entity ids plus a validated time range. Scopes are immutable once
//! built by the normalizer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A resolved time range with `from <= to`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Start of the range (inclusive)
    pub from: DateTime<Utc>,
    /// End of the range (inclusive)
    pub to: DateTime<Utc>,
}

impl DateRange {
    /// Build a range, rejecting inverted bounds
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self> {
        if from > to {
            return Err(Error::invalid_range(format!(
                "start {from} is after end {to}"
            )));
        }
        Ok(Self { from, to })
    }

    /// Span of the range
    pub fn duration(&self) -> chrono::Duration {
        self.to - self.from
    }
}

/// Canonical, fully resolved query context.
///
/// Ids are resolved identifiers, never human-readable references. A scope
/// may cover several targets (multi-target queries).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    /// Resolved organization id
    pub organization: String,
    /// Resolved project id
    pub project: String,
    /// Resolved target ids (non-empty)
    pub targets: Vec<String>,
    /// Time range the scope covers
    pub period: DateRange,
}

/// Optional, orthogonal restriction applied within a scope.
///
/// Empty lists mean "no restriction", not "match nothing". The empty
/// string in `clients` is the store's representation of an anonymous
/// client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeFilter {
    /// Restrict to these operation hashes
    pub operations: Vec<String>,
    /// Restrict to these client names
    pub clients: Vec<String>,
    /// Restrict to requests touching this schema coordinate
    pub schema_coordinate: Option<String>,
}

impl ScopeFilter {
    /// Whether the filter restricts anything at all
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty() && self.clients.is_empty() && self.schema_coordinate.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn inverted_range_is_rejected() {
        let from = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let err = DateRange::new(from, to).unwrap_err();
        assert!(matches!(err, Error::InvalidRange(_)));
    }

    #[test]
    fn equal_bounds_are_allowed() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let range = DateRange::new(at, at).unwrap();
        assert_eq!(range.duration(), chrono::Duration::zero());
    }
}
