//! Identifier translation collaborator
//!
//! Maps human-facing organization/project/target references to the
//! canonical ids the metrics store is keyed by. Lookups are independent,
//! read-only, and safe to run concurrently.

mod http;

pub use http::HttpIdTranslator;

use async_trait::async_trait;

use crate::error::Result;

/// Resolves human-facing entity references to canonical ids.
///
/// Each method fails with [`Error::NotFound`](crate::Error::NotFound) when
/// the reference does not resolve.
#[async_trait]
pub trait IdTranslator: Send + Sync {
    /// Resolve an organization reference
    async fn translate_organization_id(&self, organization: &str) -> Result<String>;

    /// Resolve a project reference within an organization
    async fn translate_project_id(&self, organization: &str, project: &str) -> Result<String>;

    /// Resolve a target reference within a project
    async fn translate_target_id(
        &self,
        organization: &str,
        project: &str,
        target: &str,
    ) -> Result<String>;
}
