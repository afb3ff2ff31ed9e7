//! Concurrent metric query fan-out
//!
//! Each requested metric becomes one independent query against the metrics
//! store. All metrics of a single dispatch execute concurrently and the
//! dispatcher waits for the full set; one terminal failure fails the whole
//! dispatch so the caller never observes a partially degraded view.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future;
use tracing::warn;

use crate::db::MetricsStore;
use crate::error::{Error, Result};
use crate::models::{
    ClientNameGroup, DurationPercentiles, DurationSeriesPoint, Scope, ScopeFilter, SeriesPoint,
};

/// One aggregate metric the dispatcher can fan out.
///
/// Time-series kinds carry the caller-supplied resolution (number of
/// buckets over the period), passed through to the store unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// Total request count
    RequestCount,
    /// Failed request count
    FailureCount,
    /// Distinct operation count
    UniqueOperationCount,
    /// Request counts grouped by client name
    UniqueClientNames,
    /// Latency percentiles over the whole scope
    GeneralDurationPercentiles,
    /// Requests per time bucket
    RequestsOverTime(u32),
    /// Failures per time bucket
    FailuresOverTime(u32),
    /// Latency percentiles per time bucket
    DurationOverTime(u32),
}

/// The raw result of one metric query
#[derive(Debug, Clone)]
pub enum MetricData {
    /// A scalar count
    Count(u64),
    /// Per-client request counts
    ClientNames(Vec<ClientNameGroup>),
    /// Raw percentiles over the whole scope
    DurationPercentiles(DurationPercentiles),
    /// A scalar time series
    Series(Vec<SeriesPoint>),
    /// A duration-percentile time series
    DurationSeries(Vec<DurationSeriesPoint>),
}

/// The completed results of one dispatch, keyed by metric kind
#[derive(Debug, Default)]
pub struct MetricResults {
    results: HashMap<MetricKind, MetricData>,
}

impl MetricResults {
    /// Scalar count for a count-shaped kind
    pub fn count(&self, kind: &MetricKind) -> Result<u64> {
        match self.get(kind)? {
            MetricData::Count(value) => Ok(*value),
            other => Err(mismatch(kind, other)),
        }
    }

    /// Per-client groups from a `UniqueClientNames` dispatch
    pub fn client_names(&self) -> Result<&[ClientNameGroup]> {
        match self.get(&MetricKind::UniqueClientNames)? {
            MetricData::ClientNames(groups) => Ok(groups),
            other => Err(mismatch(&MetricKind::UniqueClientNames, other)),
        }
    }

    /// Scope-wide percentiles from a `GeneralDurationPercentiles` dispatch
    pub fn duration_percentiles(&self) -> Result<&DurationPercentiles> {
        match self.get(&MetricKind::GeneralDurationPercentiles)? {
            MetricData::DurationPercentiles(percentiles) => Ok(percentiles),
            other => Err(mismatch(&MetricKind::GeneralDurationPercentiles, other)),
        }
    }

    /// Scalar time series for a series-shaped kind
    pub fn series(&self, kind: &MetricKind) -> Result<&[SeriesPoint]> {
        match self.get(kind)? {
            MetricData::Series(points) => Ok(points),
            other => Err(mismatch(kind, other)),
        }
    }

    /// Duration time series for a `DurationOverTime` kind
    pub fn duration_series(&self, kind: &MetricKind) -> Result<&[DurationSeriesPoint]> {
        match self.get(kind)? {
            MetricData::DurationSeries(points) => Ok(points),
            other => Err(mismatch(kind, other)),
        }
    }

    fn get(&self, kind: &MetricKind) -> Result<&MetricData> {
        self.results
            .get(kind)
            .ok_or_else(|| Error::internal(format!("metric {kind:?} was not dispatched")))
    }
}

fn mismatch(kind: &MetricKind, data: &MetricData) -> Error {
    Error::internal(format!("metric {kind:?} produced mismatched data {data:?}"))
}

/// Fans out aggregate metric queries against the store
pub struct QueryDispatcher {
    store: Arc<dyn MetricsStore>,
    max_attempts: u32,
}

impl QueryDispatcher {
    /// Create a dispatcher; `max_attempts` is the total tries per metric
    /// query (minimum 1)
    pub fn new(store: Arc<dyn MetricsStore>, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Execute all requested metrics concurrently and wait for the full
    /// set. Fails as a whole if any single metric query fails terminally.
    pub async fn dispatch(
        &self,
        scope: &Scope,
        filter: &ScopeFilter,
        kinds: &[MetricKind],
    ) -> Result<MetricResults> {
        let queries = kinds
            .iter()
            .map(|kind| self.query_with_retry(scope, filter, kind.clone()));
        let results = future::try_join_all(queries).await?.into_iter().collect();

        Ok(MetricResults { results })
    }

    async fn query_with_retry(
        &self,
        scope: &Scope,
        filter: &ScopeFilter,
        kind: MetricKind,
    ) -> Result<(MetricKind, MetricData)> {
        let mut attempt = 1;
        loop {
            match self.query(scope, filter, &kind).await {
                Ok(data) => return Ok((kind, data)),
                Err(err) if attempt < self.max_attempts && err.is_retryable() => {
                    warn!(
                        "metric query {:?} failed on attempt {}/{}: {}",
                        kind, attempt, self.max_attempts, err
                    );
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn query(
        &self,
        scope: &Scope,
        filter: &ScopeFilter,
        kind: &MetricKind,
    ) -> Result<MetricData> {
        match kind {
            MetricKind::RequestCount => self
                .store
                .count_requests(scope, filter)
                .await
                .map(MetricData::Count),
            MetricKind::FailureCount => self
                .store
                .count_failures(scope, filter)
                .await
                .map(MetricData::Count),
            MetricKind::UniqueOperationCount => self
                .store
                .count_unique_operations(scope, filter)
                .await
                .map(MetricData::Count),
            MetricKind::UniqueClientNames => self
                .store
                .read_unique_client_names(scope, filter)
                .await
                .map(MetricData::ClientNames),
            MetricKind::GeneralDurationPercentiles => self
                .store
                .read_general_duration_percentiles(scope, filter)
                .await
                .map(MetricData::DurationPercentiles),
            MetricKind::RequestsOverTime(resolution) => self
                .store
                .read_requests_over_time(scope, filter, *resolution)
                .await
                .map(MetricData::Series),
            MetricKind::FailuresOverTime(resolution) => self
                .store
                .read_failures_over_time(scope, filter, *resolution)
                .await
                .map(MetricData::Series),
            MetricKind::DurationOverTime(resolution) => self
                .store
                .read_duration_over_time(scope, filter, *resolution)
                .await
                .map(MetricData::DurationSeries),
        }
    }
}
