//! Query orchestration
//!
//! [`StatsManager`] is the public face of the resolution layer: it takes a
//! caller-supplied selector, resolves it to a canonical scope, fans out the
//! aggregate queries and assembles the merged statistical view.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future;

use crate::db::MetricsStore;
use crate::error::Result;
use crate::models::{
    ClientStat, FieldListStatsSelector, FieldStats, FieldStatsSelector, MultiTargetSelector,
    OperationBodySelector, OperationsStats, OperationsStatsSelector, OrganizationSelector,
    ProjectPeriodSelector, SchemaCoordinateStats, SchemaCoordinateStatsSelector, Scope,
    ScopeFilter, SeriesPoint, TargetSelector, share_of_total,
};
use crate::pagination::{self, CursorArgs};
use crate::translate::IdTranslator;

use super::dispatcher::{MetricKind, QueryDispatcher};
use super::normalizer::{self, SelectorNormalizer};
use super::{merger, percentile};

/// Resolves selectors into complete statistical views
pub struct StatsManager {
    store: Arc<dyn MetricsStore>,
    normalizer: SelectorNormalizer,
    dispatcher: QueryDispatcher,
}

impl StatsManager {
    /// Create a manager over a metrics store and an id translator;
    /// `max_attempts` bounds retries of individual aggregate queries
    pub fn new(
        store: Arc<dyn MetricsStore>,
        translator: Arc<dyn IdTranslator>,
        max_attempts: u32,
    ) -> Self {
        Self {
            dispatcher: QueryDispatcher::new(store.clone(), max_attempts),
            normalizer: SelectorNormalizer::new(translator),
            store,
        }
    }

    /// Whether any target of the organization has ever collected operations
    pub async fn has_collected_operations_for_org(
        &self,
        selector: &OrganizationSelector,
    ) -> Result<bool> {
        let organization = self
            .normalizer
            .resolve_organization_id(&selector.organization)
            .await?;
        self.store
            .has_collected_operations_for_org(&organization)
            .await
    }

    /// Whether the target has ever collected operations
    pub async fn has_collected_operations(&self, selector: &TargetSelector) -> Result<bool> {
        let (organization, project, target) = self
            .normalizer
            .resolve_target_ids(&selector.organization, &selector.project, &selector.target)
            .await?;
        self.store
            .has_collected_operations(&organization, &project, &target)
            .await
    }

    /// Usage statistics for a single schema coordinate
    pub async fn field_stats(&self, selector: &FieldStatsSelector) -> Result<FieldStats> {
        let scope = self
            .normalizer
            .resolve_target_scope(
                &selector.organization,
                &selector.project,
                &selector.target,
                &selector.period,
            )
            .await?;
        self.coordinate_usage(&scope, selector.coordinate.coordinate())
            .await
    }

    /// Usage statistics for a list of schema coordinates.
    ///
    /// The scope resolves once; per-coordinate counts run concurrently.
    pub async fn field_list_stats(
        &self,
        selector: &FieldListStatsSelector,
    ) -> Result<Vec<FieldStats>> {
        let scope = self
            .normalizer
            .resolve_target_scope(
                &selector.organization,
                &selector.project,
                &selector.target,
                &selector.period,
            )
            .await?;

        future::try_join_all(
            selector
                .fields
                .iter()
                .map(|field| self.coordinate_usage(&scope, field.coordinate())),
        )
        .await
    }

    async fn coordinate_usage(&self, scope: &Scope, coordinate: String) -> Result<FieldStats> {
        let filtered = ScopeFilter {
            schema_coordinate: Some(coordinate.clone()),
            ..ScopeFilter::default()
        };
        let unfiltered = ScopeFilter::default();
        let (count, total) = tokio::try_join!(
            self.store.count_requests(scope, &filtered),
            self.store.count_requests(scope, &unfiltered),
        )?;

        Ok(FieldStats {
            coordinate,
            count,
            total,
            percentage: share_of_total(count, total),
        })
    }

    /// The full statistical view over one target and period
    pub async fn operations_stats(
        &self,
        selector: &OperationsStatsSelector,
        resolution: u32,
        pagination: &CursorArgs,
    ) -> Result<OperationsStats> {
        let scope = self
            .normalizer
            .resolve_target_scope(
                &selector.organization,
                &selector.project,
                &selector.target,
                &selector.period,
            )
            .await?;
        let filter = normalizer::filter_from(
            selector.operations.clone(),
            selector.client_names.clone(),
            None,
        );

        let kinds = [
            MetricKind::RequestCount,
            MetricKind::FailureCount,
            MetricKind::UniqueOperationCount,
            MetricKind::UniqueClientNames,
            MetricKind::GeneralDurationPercentiles,
            MetricKind::RequestsOverTime(resolution),
            MetricKind::FailuresOverTime(resolution),
            MetricKind::DurationOverTime(resolution),
        ];
        let (results, records, durations) = tokio::try_join!(
            self.dispatcher.dispatch(&scope, &filter, &kinds),
            self.store.read_operation_records(&scope, &filter),
            self.store.read_detailed_duration_percentiles(&scope, &filter),
        )?;

        let total_requests = results.count(&MetricKind::RequestCount)?;
        let operations = merger::merge(records, &durations)?;
        let clients: Vec<ClientStat> = results
            .client_names()?
            .iter()
            .map(|group| ClientStat::new(group.clone(), total_requests))
            .collect();

        Ok(OperationsStats {
            total_requests,
            total_failures: results.count(&MetricKind::FailureCount)?,
            total_operations: results.count(&MetricKind::UniqueOperationCount)?,
            duration: percentile::transform(results.duration_percentiles()?),
            operations: pagination::paginate(operations, pagination)?,
            clients: pagination::paginate(clients, &CursorArgs::default())?,
            requests_over_time: results
                .series(&MetricKind::RequestsOverTime(resolution))?
                .to_vec(),
            failures_over_time: results
                .series(&MetricKind::FailuresOverTime(resolution))?
                .to_vec(),
            duration_over_time: percentile::transform_series(
                results.duration_series(&MetricKind::DurationOverTime(resolution))?,
            ),
        })
    }

    /// The statistical view restricted to requests touching one schema
    /// coordinate
    pub async fn schema_coordinate_stats(
        &self,
        selector: &SchemaCoordinateStatsSelector,
        resolution: u32,
        pagination: &CursorArgs,
    ) -> Result<SchemaCoordinateStats> {
        let scope = self
            .normalizer
            .resolve_target_scope(
                &selector.organization,
                &selector.project,
                &selector.target,
                &selector.period,
            )
            .await?;
        let filter = normalizer::filter_from(None, None, Some(selector.schema_coordinate.clone()));

        let kinds = [
            MetricKind::RequestCount,
            MetricKind::UniqueClientNames,
            MetricKind::RequestsOverTime(resolution),
        ];
        let (results, records, durations) = tokio::try_join!(
            self.dispatcher.dispatch(&scope, &filter, &kinds),
            self.store.read_operation_records(&scope, &filter),
            self.store.read_detailed_duration_percentiles(&scope, &filter),
        )?;

        let total_requests = results.count(&MetricKind::RequestCount)?;
        let operations = merger::merge(records, &durations)?;
        let clients = results
            .client_names()?
            .iter()
            .map(|group| ClientStat::new(group.clone(), total_requests))
            .collect();

        Ok(SchemaCoordinateStats {
            schema_coordinate: selector.schema_coordinate.clone(),
            total_requests,
            operations: pagination::paginate(operations, pagination)?,
            clients,
            requests_over_time: results
                .series(&MetricKind::RequestsOverTime(resolution))?
                .to_vec(),
        })
    }

    /// Requests per time bucket across all targets of a project
    pub async fn project_requests_over_time(
        &self,
        selector: &ProjectPeriodSelector,
        resolution: u32,
    ) -> Result<Vec<SeriesPoint>> {
        let period = normalizer::parse_period(&selector.period)?;
        let (organization, project) = self
            .normalizer
            .resolve_project_ids(&selector.organization, &selector.project)
            .await?;
        self.store
            .read_project_requests_over_time(&organization, &project, &period, resolution)
            .await
    }

    /// Requests per time bucket for each selected target, keyed by resolved
    /// target id. A target with no requests in the period maps to an empty
    /// series.
    pub async fn requests_over_time_by_targets(
        &self,
        selector: &MultiTargetSelector,
        resolution: u32,
    ) -> Result<HashMap<String, Vec<SeriesPoint>>> {
        let scope = self
            .normalizer
            .resolve_multi_target_scope(
                &selector.organization,
                &selector.project,
                &selector.target_ids,
                &selector.period,
            )
            .await?;
        let mut series = self
            .store
            .read_requests_over_time_by_target(&scope, &ScopeFilter::default(), resolution)
            .await?;

        for target in &scope.targets {
            series.entry(target.clone()).or_default();
        }
        Ok(series)
    }

    /// Per-client statistics aggregated across several targets
    pub async fn client_stats_by_targets(
        &self,
        selector: &MultiTargetSelector,
    ) -> Result<Vec<ClientStat>> {
        let scope = self
            .normalizer
            .resolve_multi_target_scope(
                &selector.organization,
                &selector.project,
                &selector.target_ids,
                &selector.period,
            )
            .await?;
        let filter = ScopeFilter::default();

        let kinds = [MetricKind::UniqueClientNames, MetricKind::RequestCount];
        let results = self.dispatcher.dispatch(&scope, &filter, &kinds).await?;

        let total_requests = results.count(&MetricKind::RequestCount)?;
        Ok(results
            .client_names()?
            .iter()
            .map(|group| ClientStat::new(group.clone(), total_requests))
            .collect())
    }

    /// Full operation document by content hash; `None` when the hash was
    /// never collected for the target
    pub async fn operation_body_by_hash(
        &self,
        selector: &OperationBodySelector,
    ) -> Result<Option<String>> {
        let (organization, project, target) = self
            .normalizer
            .resolve_target_ids(&selector.organization, &selector.project, &selector.target)
            .await?;
        self.store
            .get_operation_body(&organization, &project, &target, &selector.hash)
            .await
    }
}
