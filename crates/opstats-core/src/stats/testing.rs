//! In-memory collaborators for exercising the resolution layer without a
//! running database or translation service.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use crate::db::MetricsStore;
use crate::error::{Error, Result};
use crate::models::{
    ClientNameGroup, DateRange, DurationPercentiles, DurationSeriesPoint, OperationRecord, Scope,
    ScopeFilter, SeriesPoint,
};
use crate::translate::IdTranslator;

/// A fixed scope for store-level tests
pub fn test_scope() -> Scope {
    let from = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let to = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
    Scope {
        organization: "org-acme".to_string(),
        project: "project-shop".to_string(),
        targets: vec!["target-prod".to_string()],
        period: DateRange::new(from, to).unwrap(),
    }
}

/// Canned metrics store.
///
/// Every read first passes the failure gate: while `failures_remaining` is
/// non-zero, the call consumes one unit and fails with a retryable upstream
/// error. `calls` counts every read, failed or not.
#[derive(Default)]
pub struct MemoryStore {
    /// Scope-wide request count
    pub total_requests: u64,
    /// Scope-wide failure count
    pub total_failures: u64,
    /// Distinct operation count
    pub unique_operations: u64,
    /// Per-operation count records
    pub records: Vec<OperationRecord>,
    /// Per-operation duration percentiles, keyed by hash
    pub durations: HashMap<String, DurationPercentiles>,
    /// Scope-wide duration percentiles
    pub general_durations: DurationPercentiles,
    /// Per-client groups
    pub clients: Vec<ClientNameGroup>,
    /// Request time series
    pub requests_series: Vec<SeriesPoint>,
    /// Failure time series
    pub failures_series: Vec<SeriesPoint>,
    /// Duration time series
    pub duration_series: Vec<DurationSeriesPoint>,
    /// Request counts per schema coordinate
    pub coordinate_counts: HashMap<String, u64>,
    /// Operation bodies keyed by hash
    pub bodies: HashMap<String, String>,
    /// Whether the target has collected anything
    pub collected: bool,
    /// Whether any target of the organization has collected anything
    pub org_collected: bool,
    /// Project-wide request time series
    pub project_series: Vec<SeriesPoint>,
    /// Request time series keyed by target id
    pub per_target_series: HashMap<String, Vec<SeriesPoint>>,
    /// Reads left to fail before the store recovers
    pub failures_remaining: AtomicU32,
    /// Total reads observed
    pub calls: AtomicU32,
}

impl MemoryStore {
    fn gate(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            if remaining != u32::MAX {
                self.failures_remaining.fetch_sub(1, Ordering::SeqCst);
            }
            return Err(Error::upstream("injected store failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl MetricsStore for MemoryStore {
    async fn count_requests(&self, _scope: &Scope, filter: &ScopeFilter) -> Result<u64> {
        self.gate()?;
        match &filter.schema_coordinate {
            Some(coordinate) => Ok(self.coordinate_counts.get(coordinate).copied().unwrap_or(0)),
            None => Ok(self.total_requests),
        }
    }

    async fn count_failures(&self, _scope: &Scope, _filter: &ScopeFilter) -> Result<u64> {
        self.gate()?;
        Ok(self.total_failures)
    }

    async fn count_unique_operations(&self, _scope: &Scope, _filter: &ScopeFilter) -> Result<u64> {
        self.gate()?;
        Ok(self.unique_operations)
    }

    async fn read_unique_client_names(
        &self,
        _scope: &Scope,
        _filter: &ScopeFilter,
    ) -> Result<Vec<ClientNameGroup>> {
        self.gate()?;
        Ok(self.clients.clone())
    }

    async fn read_general_duration_percentiles(
        &self,
        _scope: &Scope,
        _filter: &ScopeFilter,
    ) -> Result<DurationPercentiles> {
        self.gate()?;
        Ok(self.general_durations)
    }

    async fn read_detailed_duration_percentiles(
        &self,
        _scope: &Scope,
        _filter: &ScopeFilter,
    ) -> Result<HashMap<String, DurationPercentiles>> {
        self.gate()?;
        Ok(self.durations.clone())
    }

    async fn read_operation_records(
        &self,
        _scope: &Scope,
        _filter: &ScopeFilter,
    ) -> Result<Vec<OperationRecord>> {
        self.gate()?;
        Ok(self.records.clone())
    }

    async fn read_project_requests_over_time(
        &self,
        _organization: &str,
        _project: &str,
        _period: &DateRange,
        _resolution: u32,
    ) -> Result<Vec<SeriesPoint>> {
        self.gate()?;
        Ok(self.project_series.clone())
    }

    async fn read_requests_over_time_by_target(
        &self,
        _scope: &Scope,
        _filter: &ScopeFilter,
        _resolution: u32,
    ) -> Result<HashMap<String, Vec<SeriesPoint>>> {
        self.gate()?;
        Ok(self.per_target_series.clone())
    }

    async fn read_requests_over_time(
        &self,
        _scope: &Scope,
        _filter: &ScopeFilter,
        _resolution: u32,
    ) -> Result<Vec<SeriesPoint>> {
        self.gate()?;
        Ok(self.requests_series.clone())
    }

    async fn read_failures_over_time(
        &self,
        _scope: &Scope,
        _filter: &ScopeFilter,
        _resolution: u32,
    ) -> Result<Vec<SeriesPoint>> {
        self.gate()?;
        Ok(self.failures_series.clone())
    }

    async fn read_duration_over_time(
        &self,
        _scope: &Scope,
        _filter: &ScopeFilter,
        _resolution: u32,
    ) -> Result<Vec<DurationSeriesPoint>> {
        self.gate()?;
        Ok(self.duration_series.clone())
    }

    async fn has_collected_operations_for_org(&self, _organization: &str) -> Result<bool> {
        self.gate()?;
        Ok(self.org_collected)
    }

    async fn has_collected_operations(
        &self,
        _organization: &str,
        _project: &str,
        _target: &str,
    ) -> Result<bool> {
        self.gate()?;
        Ok(self.collected)
    }

    async fn get_operation_body(
        &self,
        _organization: &str,
        _project: &str,
        _target: &str,
        hash: &str,
    ) -> Result<Option<String>> {
        self.gate()?;
        Ok(self.bodies.get(hash).cloned())
    }
}

/// Deterministic id translator.
///
/// Maps a reference `x` to `org-x`, `project-x`, `target-x`; target
/// references listed as failing resolve to a not-found error instead.
#[derive(Default)]
pub struct StubTranslator {
    failing_targets: Vec<String>,
}

impl StubTranslator {
    /// A translator that cannot resolve the listed target references
    pub fn failing_targets(targets: &[&str]) -> Self {
        Self {
            failing_targets: targets.iter().map(ToString::to_string).collect(),
        }
    }
}

#[async_trait]
impl IdTranslator for StubTranslator {
    async fn translate_organization_id(&self, organization: &str) -> Result<String> {
        Ok(format!("org-{organization}"))
    }

    async fn translate_project_id(&self, _organization: &str, project: &str) -> Result<String> {
        Ok(format!("project-{project}"))
    }

    async fn translate_target_id(
        &self,
        _organization: &str,
        _project: &str,
        target: &str,
    ) -> Result<String> {
        if self.failing_targets.iter().any(|t| t == target) {
            return Err(Error::not_found("target", target));
        }
        Ok(format!("target-{target}"))
    }
}
