//! HTTP client for the id-translation service

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::config::TranslatorConfig;
use crate::error::{Error, Result};

use super::IdTranslator;

/// Id translator backed by the translation service's JSON lookup endpoints
#[derive(Debug, Clone)]
pub struct HttpIdTranslator {
    client: reqwest::Client,
    base_url: Url,
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    id: String,
}

impl HttpIdTranslator {
    /// Create a translator client from configuration
    pub fn new(config: &TranslatorConfig) -> Result<Self> {
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| Error::config(format!("invalid translator base URL {base:?}: {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::internal(e.to_string()))?;

        Ok(Self { client, base_url })
    }

    async fn lookup(&self, segments: &[&str], entity: &str, reference: &str) -> Result<String> {
        // References may contain '/', '?' or '%'; extending the path
        // segment-wise percent-encodes each one instead of splicing raw
        // text into the URL.
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::internal("translator base URL cannot carry path segments"))?
            .pop_if_empty()
            .extend(segments);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::upstream(format!("id translation request failed: {e}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::not_found(entity, reference));
        }
        if !response.status().is_success() {
            return Err(Error::upstream(format!(
                "id translation returned {} for {entity} {reference:?}",
                response.status()
            )));
        }

        let body: IdResponse = response
            .json()
            .await
            .map_err(|e| Error::upstream(format!("id translation returned a bad payload: {e}")))?;

        Ok(body.id)
    }
}

#[async_trait]
impl IdTranslator for HttpIdTranslator {
    async fn translate_organization_id(&self, organization: &str) -> Result<String> {
        self.lookup(&["organizations", organization], "organization", organization)
            .await
    }

    async fn translate_project_id(&self, organization: &str, project: &str) -> Result<String> {
        self.lookup(
            &["organizations", organization, "projects", project],
            "project",
            project,
        )
        .await
    }

    async fn translate_target_id(
        &self,
        organization: &str,
        project: &str,
        target: &str,
    ) -> Result<String> {
        self.lookup(
            &[
                "organizations",
                organization,
                "projects",
                project,
                "targets",
                target,
            ],
            "target",
            target,
        )
        .await
    }
}
