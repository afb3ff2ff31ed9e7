//! PostgreSQL connection and aggregate queries

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, QueryBuilder, Row};

use async_trait::async_trait;

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use crate::models::{
    ClientNameGroup, DateRange, DurationPercentiles, DurationSeriesPoint, OperationKind,
    OperationRecord, Scope, ScopeFilter, SeriesPoint,
};

use super::MetricsStore;

const PERCENTILE_COLUMNS: &str = "\
    percentile_cont(0.75) WITHIN GROUP (ORDER BY duration_ns) AS p75, \
    percentile_cont(0.90) WITHIN GROUP (ORDER BY duration_ns) AS p90, \
    percentile_cont(0.95) WITHIN GROUP (ORDER BY duration_ns) AS p95, \
    percentile_cont(0.99) WITHIN GROUP (ORDER BY duration_ns) AS p99";

/// PostgreSQL connection pool
#[derive(Clone)]
pub struct PostgresPool {
    pool: PgPool,
}

impl PostgresPool {
    /// Create a new PostgreSQL connection pool
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect(&config.url)
            .await
            .map_err(|e| Error::database(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Run migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::database(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// Health check
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::database(e.to_string()))?;
        Ok(())
    }

    /// Get the underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Metrics store backed by the `operations` fact table
#[derive(Clone)]
pub struct OperationsRepository {
    pool: PgPool,
}

impl OperationsRepository {
    /// Create a new repository over a connection pool
    pub fn new(pool: &PostgresPool) -> Self {
        Self {
            pool: pool.pool.clone(),
        }
    }

    async fn fetch_scalar_count(&self, builder: QueryBuilder<'_, Postgres>) -> Result<u64> {
        let mut builder = builder;
        let row = builder
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::database(e.to_string()))?;
        let count: i64 = row.try_get(0).map_err(|e| Error::database(e.to_string()))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

/// Append the scope and filter restrictions to a query ending in `WHERE`
/// (or `WHERE <condition> AND`).
fn push_scope_conditions(
    builder: &mut QueryBuilder<'_, Postgres>,
    scope: &Scope,
    filter: &ScopeFilter,
) {
    builder.push(" organization_id = ");
    builder.push_bind(scope.organization.clone());
    builder.push(" AND project_id = ");
    builder.push_bind(scope.project.clone());
    builder.push(" AND target_id = ANY(");
    builder.push_bind(scope.targets.clone());
    builder.push(")");
    builder.push(" AND occurred_at >= ");
    builder.push_bind(scope.period.from);
    builder.push(" AND occurred_at <= ");
    builder.push_bind(scope.period.to);

    if !filter.operations.is_empty() {
        builder.push(" AND operation_hash = ANY(");
        builder.push_bind(filter.operations.clone());
        builder.push(")");
    }
    if !filter.clients.is_empty() {
        builder.push(" AND client_name = ANY(");
        builder.push_bind(filter.clients.clone());
        builder.push(")");
    }
    if let Some(coordinate) = &filter.schema_coordinate {
        builder.push(" AND ");
        builder.push_bind(coordinate.clone());
        builder.push(" = ANY(schema_coordinates)");
    }
}

/// Append the epoch-bucketing select list for a time series query.
///
/// The bucket width is the period span divided by the caller-supplied
/// resolution, clamped to at least one second.
fn push_bucket_column(builder: &mut QueryBuilder<'_, Postgres>, width_seconds: f64) {
    builder.push("to_timestamp(floor(extract(epoch FROM occurred_at) / ");
    builder.push_bind(width_seconds);
    builder.push(") * ");
    builder.push_bind(width_seconds);
    builder.push(") AS bucket");
}

fn bucket_width_seconds(period: &DateRange, resolution: u32) -> f64 {
    let span = period.duration().num_seconds().max(1) as f64;
    (span / f64::from(resolution.max(1))).max(1.0)
}

fn operation_kind_from_str(kind: &str) -> OperationKind {
    match kind {
        "mutation" => OperationKind::Mutation,
        "subscription" => OperationKind::Subscription,
        _ => OperationKind::Query,
    }
}

fn row_to_percentiles(row: &PgRow) -> DurationPercentiles {
    DurationPercentiles {
        p75: row.try_get("p75").unwrap_or(None),
        p90: row.try_get("p90").unwrap_or(None),
        p95: row.try_get("p95").unwrap_or(None),
        p99: row.try_get("p99").unwrap_or(None),
    }
}

#[async_trait]
impl MetricsStore for OperationsRepository {
    async fn count_requests(&self, scope: &Scope, filter: &ScopeFilter) -> Result<u64> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM operations WHERE");
        push_scope_conditions(&mut builder, scope, filter);
        self.fetch_scalar_count(builder).await
    }

    async fn count_failures(&self, scope: &Scope, filter: &ScopeFilter) -> Result<u64> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM operations WHERE ok = FALSE AND");
        push_scope_conditions(&mut builder, scope, filter);
        self.fetch_scalar_count(builder).await
    }

    async fn count_unique_operations(&self, scope: &Scope, filter: &ScopeFilter) -> Result<u64> {
        let mut builder =
            QueryBuilder::new("SELECT COUNT(DISTINCT operation_hash) FROM operations WHERE");
        push_scope_conditions(&mut builder, scope, filter);
        self.fetch_scalar_count(builder).await
    }

    async fn read_unique_client_names(
        &self,
        scope: &Scope,
        filter: &ScopeFilter,
    ) -> Result<Vec<ClientNameGroup>> {
        let mut builder = QueryBuilder::new(
            "SELECT client_name, COUNT(*) AS count, \
             ARRAY_AGG(DISTINCT client_version) FILTER (WHERE client_version IS NOT NULL) AS versions \
             FROM operations WHERE",
        );
        push_scope_conditions(&mut builder, scope, filter);
        builder.push(" GROUP BY client_name ORDER BY count DESC");

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::database(e.to_string()))?;

        let mut groups = Vec::with_capacity(rows.len());
        for row in rows {
            let count: i64 = row.try_get("count").unwrap_or(0);
            groups.push(ClientNameGroup {
                name: row.try_get("client_name").unwrap_or_default(),
                count: u64::try_from(count).unwrap_or(0),
                versions: row
                    .try_get::<Option<Vec<String>>, _>("versions")
                    .unwrap_or(None)
                    .unwrap_or_default(),
            });
        }
        Ok(groups)
    }

    async fn read_general_duration_percentiles(
        &self,
        scope: &Scope,
        filter: &ScopeFilter,
    ) -> Result<DurationPercentiles> {
        let mut builder =
            QueryBuilder::new(format!("SELECT {PERCENTILE_COLUMNS} FROM operations WHERE"));
        push_scope_conditions(&mut builder, scope, filter);

        let row = builder
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::database(e.to_string()))?;

        Ok(row_to_percentiles(&row))
    }

    async fn read_detailed_duration_percentiles(
        &self,
        scope: &Scope,
        filter: &ScopeFilter,
    ) -> Result<HashMap<String, DurationPercentiles>> {
        let mut builder = QueryBuilder::new(format!(
            "SELECT operation_hash, {PERCENTILE_COLUMNS} FROM operations WHERE"
        ));
        push_scope_conditions(&mut builder, scope, filter);
        builder.push(" GROUP BY operation_hash");

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::database(e.to_string()))?;

        let mut durations = HashMap::with_capacity(rows.len());
        for row in rows {
            let hash: String = row
                .try_get("operation_hash")
                .map_err(|e| Error::database(e.to_string()))?;
            durations.insert(hash, row_to_percentiles(&row));
        }
        Ok(durations)
    }

    async fn read_operation_records(
        &self,
        scope: &Scope,
        filter: &ScopeFilter,
    ) -> Result<Vec<OperationRecord>> {
        let mut builder = QueryBuilder::new(
            "SELECT operation_hash, \
             MAX(operation_name) AS operation_name, \
             MAX(operation_kind) AS operation_kind, \
             COUNT(*) AS count, \
             COUNT(*) FILTER (WHERE ok) AS count_ok, \
             COUNT(*)::float8 * 100.0 / SUM(COUNT(*)) OVER () AS percentage \
             FROM operations WHERE",
        );
        push_scope_conditions(&mut builder, scope, filter);
        builder.push(" GROUP BY operation_hash ORDER BY count DESC");

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::database(e.to_string()))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let count: i64 = row.try_get("count").unwrap_or(0);
            let count_ok: i64 = row.try_get("count_ok").unwrap_or(0);
            let kind: String = row.try_get("operation_kind").unwrap_or_default();
            records.push(OperationRecord {
                operation_hash: row
                    .try_get("operation_hash")
                    .map_err(|e| Error::database(e.to_string()))?,
                operation_name: row.try_get("operation_name").unwrap_or_default(),
                kind: operation_kind_from_str(&kind),
                count: u64::try_from(count).unwrap_or(0),
                count_ok: u64::try_from(count_ok).unwrap_or(0),
                percentage: row.try_get::<f64, _>("percentage").unwrap_or(0.0),
            });
        }
        Ok(records)
    }

    async fn read_project_requests_over_time(
        &self,
        organization: &str,
        project: &str,
        period: &DateRange,
        resolution: u32,
    ) -> Result<Vec<SeriesPoint>> {
        let width = bucket_width_seconds(period, resolution);
        let mut builder = QueryBuilder::new("SELECT ");
        push_bucket_column(&mut builder, width);
        builder.push(", COUNT(*) AS value FROM operations WHERE organization_id = ");
        builder.push_bind(organization.to_string());
        builder.push(" AND project_id = ");
        builder.push_bind(project.to_string());
        builder.push(" AND occurred_at >= ");
        builder.push_bind(period.from);
        builder.push(" AND occurred_at <= ");
        builder.push_bind(period.to);
        builder.push(" GROUP BY 1 ORDER BY 1");

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::database(e.to_string()))?;

        Ok(rows.iter().map(row_to_series_point).collect())
    }

    async fn read_requests_over_time_by_target(
        &self,
        scope: &Scope,
        filter: &ScopeFilter,
        resolution: u32,
    ) -> Result<HashMap<String, Vec<SeriesPoint>>> {
        let width = bucket_width_seconds(&scope.period, resolution);
        let mut builder = QueryBuilder::new("SELECT target_id, ");
        push_bucket_column(&mut builder, width);
        builder.push(", COUNT(*) AS value FROM operations WHERE");
        push_scope_conditions(&mut builder, scope, filter);
        builder.push(" GROUP BY 1, 2 ORDER BY 1, 2");

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::database(e.to_string()))?;

        let mut series: HashMap<String, Vec<SeriesPoint>> = HashMap::new();
        for row in &rows {
            let target: String = row
                .try_get("target_id")
                .map_err(|e| Error::database(e.to_string()))?;
            series
                .entry(target)
                .or_default()
                .push(row_to_series_point(row));
        }
        Ok(series)
    }

    async fn read_requests_over_time(
        &self,
        scope: &Scope,
        filter: &ScopeFilter,
        resolution: u32,
    ) -> Result<Vec<SeriesPoint>> {
        let width = bucket_width_seconds(&scope.period, resolution);
        let mut builder = QueryBuilder::new("SELECT ");
        push_bucket_column(&mut builder, width);
        builder.push(", COUNT(*) AS value FROM operations WHERE");
        push_scope_conditions(&mut builder, scope, filter);
        builder.push(" GROUP BY 1 ORDER BY 1");

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::database(e.to_string()))?;

        Ok(rows.iter().map(row_to_series_point).collect())
    }

    async fn read_failures_over_time(
        &self,
        scope: &Scope,
        filter: &ScopeFilter,
        resolution: u32,
    ) -> Result<Vec<SeriesPoint>> {
        let width = bucket_width_seconds(&scope.period, resolution);
        let mut builder = QueryBuilder::new("SELECT ");
        push_bucket_column(&mut builder, width);
        builder.push(", COUNT(*) AS value FROM operations WHERE ok = FALSE AND");
        push_scope_conditions(&mut builder, scope, filter);
        builder.push(" GROUP BY 1 ORDER BY 1");

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::database(e.to_string()))?;

        Ok(rows.iter().map(row_to_series_point).collect())
    }

    async fn read_duration_over_time(
        &self,
        scope: &Scope,
        filter: &ScopeFilter,
        resolution: u32,
    ) -> Result<Vec<DurationSeriesPoint>> {
        let width = bucket_width_seconds(&scope.period, resolution);
        let mut builder = QueryBuilder::new("SELECT ");
        push_bucket_column(&mut builder, width);
        builder.push(format!(", {PERCENTILE_COLUMNS} FROM operations WHERE"));
        push_scope_conditions(&mut builder, scope, filter);
        builder.push(" GROUP BY 1 ORDER BY 1");

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::database(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|row| DurationSeriesPoint {
                date: row
                    .try_get("bucket")
                    .unwrap_or_else(|_| DateTime::<Utc>::UNIX_EPOCH),
                duration: row_to_percentiles(row),
            })
            .collect())
    }

    async fn has_collected_operations_for_org(&self, organization: &str) -> Result<bool> {
        let row = sqlx::query(
            "SELECT EXISTS( \
             SELECT 1 FROM operations WHERE organization_id = $1) AS collected",
        )
        .bind(organization)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::database(e.to_string()))?;

        Ok(row.try_get("collected").unwrap_or(false))
    }

    async fn has_collected_operations(
        &self,
        organization: &str,
        project: &str,
        target: &str,
    ) -> Result<bool> {
        let row = sqlx::query(
            "SELECT EXISTS( \
             SELECT 1 FROM operations \
             WHERE organization_id = $1 AND project_id = $2 AND target_id = $3) AS collected",
        )
        .bind(organization)
        .bind(project)
        .bind(target)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::database(e.to_string()))?;

        Ok(row.try_get("collected").unwrap_or(false))
    }

    async fn get_operation_body(
        &self,
        organization: &str,
        project: &str,
        target: &str,
        hash: &str,
    ) -> Result<Option<String>> {
        let row = sqlx::query(
            "SELECT body FROM operation_bodies \
             WHERE organization_id = $1 AND project_id = $2 AND target_id = $3 \
             AND operation_hash = $4",
        )
        .bind(organization)
        .bind(project)
        .bind(target)
        .bind(hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::database(e.to_string()))?;

        match row {
            Some(row) => Ok(Some(
                row.try_get("body")
                    .map_err(|e| Error::database(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }
}

fn row_to_series_point(row: &PgRow) -> SeriesPoint {
    let value: i64 = row.try_get("value").unwrap_or(0);
    SeriesPoint {
        date: row
            .try_get("bucket")
            .unwrap_or_else(|_| DateTime::<Utc>::UNIX_EPOCH),
        value: u64::try_from(value).unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day_period() -> DateRange {
        DateRange::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn bucket_width_divides_the_period() {
        // 24h split into 24 buckets is one hour per bucket.
        assert!((bucket_width_seconds(&day_period(), 24) - 3600.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bucket_width_never_drops_below_one_second() {
        let narrow = DateRange::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 10).unwrap(),
        )
        .unwrap();
        assert!((bucket_width_seconds(&narrow, 100) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unknown_operation_kind_defaults_to_query() {
        assert_eq!(operation_kind_from_str("mutation"), OperationKind::Mutation);
        assert_eq!(operation_kind_from_str("whatever"), OperationKind::Query);
    }
}
