//! Storage layer for opstats
//!
//! Defines the contract the resolution layer requires from the metrics
//! store, and provides the Postgres-backed implementation.

mod postgres;

pub use postgres::{OperationsRepository, PostgresPool};

use std::collections::HashMap;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::Result;
use crate::models::{
    ClientNameGroup, DateRange, DurationPercentiles, DurationSeriesPoint, OperationRecord, Scope,
    ScopeFilter, SeriesPoint,
};

/// The aggregate-query contract of the metrics store.
///
/// Every method is an independent read over the same sample population;
/// implementations must tolerate concurrent queries against the same scope
/// without serializing them.
#[async_trait]
pub trait MetricsStore: Send + Sync {
    /// Count all requests in scope
    async fn count_requests(&self, scope: &Scope, filter: &ScopeFilter) -> Result<u64>;

    /// Count failed requests in scope
    async fn count_failures(&self, scope: &Scope, filter: &ScopeFilter) -> Result<u64>;

    /// Count distinct operations in scope
    async fn count_unique_operations(&self, scope: &Scope, filter: &ScopeFilter) -> Result<u64>;

    /// Aggregate request counts per client name
    async fn read_unique_client_names(
        &self,
        scope: &Scope,
        filter: &ScopeFilter,
    ) -> Result<Vec<ClientNameGroup>>;

    /// Latency percentiles over the whole scope
    async fn read_general_duration_percentiles(
        &self,
        scope: &Scope,
        filter: &ScopeFilter,
    ) -> Result<DurationPercentiles>;

    /// Latency percentiles per operation hash.
    ///
    /// Computed over the exact same sample population as
    /// [`read_operation_records`](Self::read_operation_records), so every
    /// hash returned there has an entry here.
    async fn read_detailed_duration_percentiles(
        &self,
        scope: &Scope,
        filter: &ScopeFilter,
    ) -> Result<HashMap<String, DurationPercentiles>>;

    /// Per-operation request counts and success shares
    async fn read_operation_records(
        &self,
        scope: &Scope,
        filter: &ScopeFilter,
    ) -> Result<Vec<OperationRecord>>;

    /// Requests per time bucket across all targets of a project
    async fn read_project_requests_over_time(
        &self,
        organization: &str,
        project: &str,
        period: &DateRange,
        resolution: u32,
    ) -> Result<Vec<SeriesPoint>>;

    /// Requests per time bucket, keyed by target id. Targets without any
    /// requests in the period produce no entry.
    async fn read_requests_over_time_by_target(
        &self,
        scope: &Scope,
        filter: &ScopeFilter,
        resolution: u32,
    ) -> Result<HashMap<String, Vec<SeriesPoint>>>;

    /// Requests per time bucket; `resolution` is the number of buckets the
    /// period is divided into
    async fn read_requests_over_time(
        &self,
        scope: &Scope,
        filter: &ScopeFilter,
        resolution: u32,
    ) -> Result<Vec<SeriesPoint>>;

    /// Failures per time bucket
    async fn read_failures_over_time(
        &self,
        scope: &Scope,
        filter: &ScopeFilter,
        resolution: u32,
    ) -> Result<Vec<SeriesPoint>>;

    /// Latency percentiles per time bucket
    async fn read_duration_over_time(
        &self,
        scope: &Scope,
        filter: &ScopeFilter,
        resolution: u32,
    ) -> Result<Vec<DurationSeriesPoint>>;

    /// Whether any target of the organization has ever collected operations
    async fn has_collected_operations_for_org(&self, organization: &str) -> Result<bool>;

    /// Whether a target has ever collected operations
    async fn has_collected_operations(
        &self,
        organization: &str,
        project: &str,
        target: &str,
    ) -> Result<bool>;

    /// Full operation document by content hash
    async fn get_operation_body(
        &self,
        organization: &str,
        project: &str,
        target: &str,
        hash: &str,
    ) -> Result<Option<String>>;
}

/// Database connections bundle
#[derive(Clone)]
pub struct Database {
    /// PostgreSQL connection pool
    pub postgres: PostgresPool,
}

impl Database {
    /// Create a new database connection bundle
    pub async fn new(config: &Config) -> Result<Self> {
        let postgres = PostgresPool::new(&config.database).await?;
        Ok(Self { postgres })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        self.postgres.migrate().await
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<()> {
        self.postgres.health_check().await
    }
}
