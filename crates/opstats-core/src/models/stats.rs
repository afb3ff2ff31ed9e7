//! Statistics data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pagination::Connection;

/// Kind of a collected operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Read operation
    Query,
    /// Write operation
    Mutation,
    /// Long-lived subscription
    Subscription,
}

impl OperationKind {
    /// Store-native string form
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Subscription => "subscription",
        }
    }
}

/// One distinct operation observed in scope, with its request counts.
///
/// Identity is `(operation_name, operation_hash)`.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationRecord {
    /// Content hash of the operation
    pub operation_hash: String,
    /// Name of the operation
    pub operation_name: String,
    /// Kind of the operation
    pub kind: OperationKind,
    /// Total requests for this operation in scope
    pub count: u64,
    /// Requests that succeeded
    pub count_ok: u64,
    /// Share of all requests in scope, in percent
    pub percentage: f64,
}

/// Raw latency percentiles in store-native nanoseconds.
///
/// A `None` entry means no samples existed in the window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DurationPercentiles {
    /// 75th percentile
    pub p75: Option<f64>,
    /// 90th percentile
    pub p90: Option<f64>,
    /// 95th percentile
    pub p95: Option<f64>,
    /// 99th percentile
    pub p99: Option<f64>,
}

/// Caller-facing latency percentiles in whole milliseconds.
///
/// Absent raw values are presented as `0`; callers must treat `0` as
/// "no data".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DurationStats {
    /// 75th percentile in ms
    pub p75: u64,
    /// 90th percentile in ms
    pub p90: u64,
    /// 95th percentile in ms
    pub p95: u64,
    /// 99th percentile in ms
    pub p99: u64,
}

/// An operation record joined with its duration percentiles
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedOperation {
    /// Stable opaque identifier, derived from name and hash
    pub id: String,
    /// Content hash of the operation
    pub operation_hash: String,
    /// Name of the operation
    pub name: String,
    /// Kind of the operation
    pub kind: OperationKind,
    /// Total requests
    pub count: u64,
    /// Requests that succeeded
    pub count_ok: u64,
    /// Share of all requests in scope, in percent
    pub percentage: f64,
    /// Latency percentiles in ms
    pub duration: DurationStats,
}

/// Aggregated request count for one client name
#[derive(Debug, Clone, PartialEq)]
pub struct ClientNameGroup {
    /// Client name; empty string for anonymous clients
    pub name: String,
    /// Requests issued by this client in scope
    pub count: u64,
    /// Distinct versions seen for this client
    pub versions: Vec<String>,
}

/// Per-client statistics with its share of all requests
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientStat {
    /// Client name; empty string for anonymous clients
    pub name: String,
    /// Requests issued by this client in scope
    pub count: u64,
    /// Share of all requests, zero when the scope saw no requests
    pub percentage: f64,
    /// Distinct versions seen for this client
    pub versions: Vec<String>,
}

impl ClientStat {
    /// Build a stat from an aggregated group and the scope-wide total
    pub fn new(group: ClientNameGroup, total: u64) -> Self {
        Self {
            percentage: share_of_total(group.count, total),
            name: group.name,
            count: group.count,
            versions: group.versions,
        }
    }
}

/// `count / total * 100`, zero when `total == 0`
pub fn share_of_total(count: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

/// One time-series bucket with a scalar value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesPoint {
    /// Start of the bucket
    pub date: DateTime<Utc>,
    /// Aggregated value for the bucket
    pub value: u64,
}

/// One time-series bucket with raw duration percentiles
#[derive(Debug, Clone, PartialEq)]
pub struct DurationSeriesPoint {
    /// Start of the bucket
    pub date: DateTime<Utc>,
    /// Raw percentiles for the bucket
    pub duration: DurationPercentiles,
}

/// One time-series bucket with caller-facing duration percentiles
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DurationSeriesStats {
    /// Start of the bucket
    pub date: DateTime<Utc>,
    /// Percentiles in ms for the bucket
    pub duration: DurationStats,
}

/// Usage statistics for a single schema coordinate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldStats {
    /// The dotted schema coordinate
    pub coordinate: String,
    /// Requests touching the coordinate in scope
    pub count: u64,
    /// All requests in scope
    pub total: u64,
    /// Share of all requests, zero when the scope saw no requests
    pub percentage: f64,
}

/// The full statistical view for a general operations-stats query
#[derive(Debug, Clone, Serialize)]
pub struct OperationsStats {
    /// Total requests in scope
    pub total_requests: u64,
    /// Total failed requests in scope
    pub total_failures: u64,
    /// Distinct operations in scope
    pub total_operations: u64,
    /// Scope-wide latency percentiles in ms
    pub duration: DurationStats,
    /// Merged per-operation stats, descending by request count
    pub operations: Connection<MergedOperation>,
    /// Per-client stats
    pub clients: Connection<ClientStat>,
    /// Requests per time bucket
    pub requests_over_time: Vec<SeriesPoint>,
    /// Failures per time bucket
    pub failures_over_time: Vec<SeriesPoint>,
    /// Latency percentiles per time bucket
    pub duration_over_time: Vec<DurationSeriesStats>,
}

/// The statistical view for a schema-coordinate-scoped query
#[derive(Debug, Clone, Serialize)]
pub struct SchemaCoordinateStats {
    /// The dotted schema coordinate the view is scoped to
    pub schema_coordinate: String,
    /// Total requests touching the coordinate
    pub total_requests: u64,
    /// Merged per-operation stats, descending by request count
    pub operations: Connection<MergedOperation>,
    /// Per-client stats
    pub clients: Vec<ClientStat>,
    /// Requests per time bucket
    pub requests_over_time: Vec<SeriesPoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_of_total_guards_division_by_zero() {
        assert_eq!(share_of_total(5, 0), 0.0);
        assert_eq!(share_of_total(0, 0), 0.0);
    }

    #[test]
    fn share_of_total_is_a_percentage() {
        assert!((share_of_total(25, 100) - 25.0).abs() < f64::EPSILON);
        assert!((share_of_total(1, 3) - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn client_stat_carries_group_fields() {
        let stat = ClientStat::new(
            ClientNameGroup {
                name: "web".to_string(),
                count: 30,
                versions: vec!["1.0".to_string()],
            },
            60,
        );
        assert_eq!(stat.name, "web");
        assert!((stat.percentage - 50.0).abs() < f64::EPSILON);
    }
}
