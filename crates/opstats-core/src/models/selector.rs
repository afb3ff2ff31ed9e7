//! Caller-facing query selectors
//!
//! Selectors carry human-facing entity references and raw date strings as
//! received from the API boundary. The normalizer turns them into a
//! canonical [`Scope`](super::Scope).

use serde::{Deserialize, Serialize};

/// Raw, unparsed time range as supplied by the caller (RFC 3339 strings)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodInput {
    /// Start of the range
    pub from: String,
    /// End of the range
    pub to: String,
}

/// Selector identifying an organization alone
#[derive(Debug, Clone, Deserialize)]
pub struct OrganizationSelector {
    /// Organization reference
    pub organization: String,
}

/// Selector for project-wide queries over a period
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectPeriodSelector {
    /// Organization reference
    pub organization: String,
    /// Project reference
    pub project: String,
    /// Time range to aggregate over
    pub period: PeriodInput,
}

/// Selector identifying a single target without a time range
#[derive(Debug, Clone, Deserialize)]
pub struct TargetSelector {
    /// Organization reference
    pub organization: String,
    /// Project reference
    pub project: String,
    /// Target reference
    pub target: String,
}

/// Selector for general operation stats over one target
#[derive(Debug, Clone, Deserialize)]
pub struct OperationsStatsSelector {
    /// Organization reference
    pub organization: String,
    /// Project reference
    pub project: String,
    /// Target reference
    pub target: String,
    /// Time range to aggregate over
    pub period: PeriodInput,
    /// Optional restriction to these operation hashes
    pub operations: Option<Vec<String>>,
    /// Optional restriction to these client names ("unknown" = anonymous)
    pub client_names: Option<Vec<String>>,
}

/// A schema coordinate addressed structurally (type, field, argument)
#[derive(Debug, Clone, Deserialize)]
pub struct FieldCoordinate {
    /// Type name
    pub type_name: String,
    /// Field name
    pub field: String,
    /// Optional argument name
    pub argument: Option<String>,
}

impl FieldCoordinate {
    /// The dotted string form used by the metrics store
    pub fn coordinate(&self) -> String {
        match &self.argument {
            Some(argument) => format!("{}.{}.{}", self.type_name, self.field, argument),
            None => format!("{}.{}", self.type_name, self.field),
        }
    }
}

/// Selector for single-field usage stats
#[derive(Debug, Clone, Deserialize)]
pub struct FieldStatsSelector {
    /// Organization reference
    pub organization: String,
    /// Project reference
    pub project: String,
    /// Target reference
    pub target: String,
    /// Time range to aggregate over
    pub period: PeriodInput,
    /// The schema coordinate to count usage of
    #[serde(flatten)]
    pub coordinate: FieldCoordinate,
}

/// Selector for usage stats of a list of fields
#[derive(Debug, Clone, Deserialize)]
pub struct FieldListStatsSelector {
    /// Organization reference
    pub organization: String,
    /// Project reference
    pub project: String,
    /// Target reference
    pub target: String,
    /// Time range to aggregate over
    pub period: PeriodInput,
    /// The schema coordinates to count usage of
    pub fields: Vec<FieldCoordinate>,
}

/// Selector for stats scoped to one schema coordinate
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaCoordinateStatsSelector {
    /// Organization reference
    pub organization: String,
    /// Project reference
    pub project: String,
    /// Target reference
    pub target: String,
    /// Time range to aggregate over
    pub period: PeriodInput,
    /// Dotted schema coordinate (e.g. `Query.user.id`)
    pub schema_coordinate: String,
}

/// Selector covering several targets of one project over a period
#[derive(Debug, Clone, Deserialize)]
pub struct MultiTargetSelector {
    /// Organization reference
    pub organization: String,
    /// Project reference
    pub project: String,
    /// Target references (all must resolve)
    pub target_ids: Vec<String>,
    /// Time range to aggregate over
    pub period: PeriodInput,
}

/// Selector for an operation body lookup
#[derive(Debug, Clone, Deserialize)]
pub struct OperationBodySelector {
    /// Organization reference
    pub organization: String,
    /// Project reference
    pub project: String,
    /// Target reference
    pub target: String,
    /// Operation content hash
    pub hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinate_includes_argument_when_present() {
        let field = FieldCoordinate {
            type_name: "Query".to_string(),
            field: "user".to_string(),
            argument: None,
        };
        assert_eq!(field.coordinate(), "Query.user");

        let with_argument = FieldCoordinate {
            argument: Some("id".to_string()),
            ..field
        };
        assert_eq!(with_argument.coordinate(), "Query.user.id");
    }
}
