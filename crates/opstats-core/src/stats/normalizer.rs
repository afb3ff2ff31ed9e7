//! Selector normalization
//!
//! Resolves human-facing selectors into a canonical [`Scope`] plus
//! [`ScopeFilter`]. All id translations for one selector are independent
//! lookups and run concurrently; any single failed translation fails the
//! whole resolution.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future;

use crate::error::{Error, Result};
use crate::models::{DateRange, PeriodInput, Scope, ScopeFilter};
use crate::translate::IdTranslator;

/// The caller-facing sentinel for requests without a client name. The
/// store represents anonymous clients as the empty string.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Resolves selectors to canonical scopes via the id-translation
/// collaborator
pub struct SelectorNormalizer {
    translator: Arc<dyn IdTranslator>,
}

impl SelectorNormalizer {
    /// Create a normalizer over an id translator
    pub fn new(translator: Arc<dyn IdTranslator>) -> Self {
        Self { translator }
    }

    /// Resolve an organization reference alone
    pub async fn resolve_organization_id(&self, organization: &str) -> Result<String> {
        self.translator.translate_organization_id(organization).await
    }

    /// Resolve organization and project references concurrently
    pub async fn resolve_project_ids(
        &self,
        organization: &str,
        project: &str,
    ) -> Result<(String, String)> {
        tokio::try_join!(
            self.translator.translate_organization_id(organization),
            self.translator.translate_project_id(organization, project),
        )
    }

    /// Resolve org/project/target references concurrently, without a period
    pub async fn resolve_target_ids(
        &self,
        organization: &str,
        project: &str,
        target: &str,
    ) -> Result<(String, String, String)> {
        tokio::try_join!(
            self.translator.translate_organization_id(organization),
            self.translator.translate_project_id(organization, project),
            self.translator
                .translate_target_id(organization, project, target),
        )
    }

    /// Resolve a single-target selector into a scope
    pub async fn resolve_target_scope(
        &self,
        organization: &str,
        project: &str,
        target: &str,
        period: &PeriodInput,
    ) -> Result<Scope> {
        let period = parse_period(period)?;
        let (organization, project, target) = self
            .resolve_target_ids(organization, project, target)
            .await?;

        Ok(Scope {
            organization,
            project,
            targets: vec![target],
            period,
        })
    }

    /// Resolve a multi-target selector into a scope.
    ///
    /// All target references translate concurrently; one unresolvable
    /// target fails the whole resolution even when the others resolved.
    pub async fn resolve_multi_target_scope(
        &self,
        organization: &str,
        project: &str,
        targets: &[String],
        period: &PeriodInput,
    ) -> Result<Scope> {
        let period = parse_period(period)?;
        let (organization, project, targets) = tokio::try_join!(
            self.translator.translate_organization_id(organization),
            self.translator.translate_project_id(organization, project),
            future::try_join_all(targets.iter().map(|target| {
                self.translator
                    .translate_target_id(organization, project, target)
            })),
        )?;

        Ok(Scope {
            organization,
            project,
            targets,
            period,
        })
    }
}

/// Parse a raw RFC 3339 period into a validated range
pub fn parse_period(period: &PeriodInput) -> Result<DateRange> {
    let from = parse_bound(&period.from)?;
    let to = parse_bound(&period.to)?;
    DateRange::new(from, to)
}

fn parse_bound(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|e| Error::invalid_range(format!("unparsable bound {raw:?}: {e}")))
}

/// Normalize a client-name filter list.
///
/// The `"unknown"` sentinel rewrites to the empty string; an absent list
/// normalizes to an empty set, meaning "no restriction".
pub fn normalize_client_names(raw: Option<Vec<String>>) -> Vec<String> {
    raw.map(|names| {
        names
            .into_iter()
            .map(|name| {
                if name == UNKNOWN_CLIENT {
                    String::new()
                } else {
                    name
                }
            })
            .collect()
    })
    .unwrap_or_default()
}

/// Build a scope filter from optional selector fields
pub fn filter_from(
    operations: Option<Vec<String>>,
    client_names: Option<Vec<String>>,
    schema_coordinate: Option<String>,
) -> ScopeFilter {
    ScopeFilter {
        operations: operations.unwrap_or_default(),
        clients: normalize_client_names(client_names),
        schema_coordinate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::testing::StubTranslator;
    use pretty_assertions::assert_eq;

    fn period() -> PeriodInput {
        PeriodInput {
            from: "2024-03-01T00:00:00Z".to_string(),
            to: "2024-03-02T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn unknown_client_rewrites_to_empty_string() {
        let normalized = normalize_client_names(Some(vec![
            "unknown".to_string(),
            "web".to_string(),
        ]));
        assert_eq!(normalized, vec![String::new(), "web".to_string()]);
    }

    #[test]
    fn absent_client_list_means_no_restriction() {
        assert!(normalize_client_names(None).is_empty());
    }

    #[test]
    fn inverted_period_is_invalid() {
        let err = parse_period(&PeriodInput {
            from: "2024-03-02T00:00:00Z".to_string(),
            to: "2024-03-01T00:00:00Z".to_string(),
        })
        .unwrap_err();
        assert!(matches!(err, Error::InvalidRange(_)));
    }

    #[test]
    fn unparsable_bound_is_invalid() {
        let err = parse_period(&PeriodInput {
            from: "last tuesday".to_string(),
            to: "2024-03-01T00:00:00Z".to_string(),
        })
        .unwrap_err();
        assert!(matches!(err, Error::InvalidRange(_)));
    }

    #[tokio::test]
    async fn resolves_a_single_target_scope() {
        let normalizer = SelectorNormalizer::new(Arc::new(StubTranslator::default()));
        let scope = normalizer
            .resolve_target_scope("acme", "shop", "prod", &period())
            .await
            .unwrap();

        assert_eq!(scope.organization, "org-acme");
        assert_eq!(scope.project, "project-shop");
        assert_eq!(scope.targets, vec!["target-prod".to_string()]);
    }

    #[tokio::test]
    async fn one_bad_target_fails_the_whole_resolution() {
        let translator = StubTranslator::failing_targets(&["staging"]);
        let normalizer = SelectorNormalizer::new(Arc::new(translator));

        let err = normalizer
            .resolve_multi_target_scope(
                "acme",
                "shop",
                &["prod".to_string(), "staging".to_string()],
                &period(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn multi_target_scope_resolves_every_target() {
        let normalizer = SelectorNormalizer::new(Arc::new(StubTranslator::default()));
        let scope = normalizer
            .resolve_multi_target_scope(
                "acme",
                "shop",
                &["prod".to_string(), "staging".to_string()],
                &period(),
            )
            .await
            .unwrap();
        assert_eq!(
            scope.targets,
            vec!["target-prod".to_string(), "target-staging".to_string()]
        );
    }
}
