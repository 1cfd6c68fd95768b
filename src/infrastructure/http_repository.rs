// HTTP repository for the upstream chart backend
use crate::application::chart_repository::ChartRepository;
use crate::domain::annotation::{Annotation, AnnotationDetails, AnnotationDraft};
use crate::domain::rule::Rule;
use crate::domain::tag::Tag;
use crate::domain::telemetry::Sample;
use crate::infrastructure::config::BackendSettings;
use crate::infrastructure::wire::{
    annotation_from_wire, samples_from_wire, tags_from_wire, AnnotationRequest,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpChartRepository {
    base_url: String,
    client: reqwest::Client,
}

impl HttpChartRepository {
    pub fn new(settings: &BackendSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn samples_url(&self, tag_ids: &[String], limit: Option<usize>) -> String {
        let mut url = format!(
            "{}/api/timeseries?tagIds={}",
            self.base_url,
            urlencoding::encode(&tag_ids.join(","))
        );
        if let Some(limit) = limit {
            url.push_str(&format!("&limit={}", limit));
        }
        url
    }

    async fn check(response: reqwest::Response, what: &str) -> Result<Value> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("{} failed with status {}: {}", what, status, body);
        }

        response
            .json::<Value>()
            .await
            .with_context(|| format!("Failed to parse {} response", what))
    }

    async fn get_list(&self, url: &str, what: &str) -> Result<Vec<Value>> {
        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .with_context(|| format!("Failed to send {} request", what))?;

        match Self::check(response, what).await? {
            Value::Array(items) => Ok(items),
            other => anyhow::bail!("{} returned {} instead of a list", what, type_name(&other)),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[async_trait]
impl ChartRepository for HttpChartRepository {
    async fn list_tags(&self) -> Result<Vec<Tag>> {
        let url = format!("{}/api/tags", self.base_url);
        let items = self.get_list(&url, "Tag fetch").await?;
        Ok(tags_from_wire(items))
    }

    async fn fetch_samples(&self, tag_ids: &[String], limit: Option<usize>) -> Result<Vec<Sample>> {
        let url = self.samples_url(tag_ids, limit);
        let items = self.get_list(&url, "Sample fetch").await?;
        let samples = samples_from_wire(items);
        tracing::debug!("Fetched {} samples for {} tags", samples.len(), tag_ids.len());
        Ok(samples)
    }

    async fn commit_annotation(
        &self,
        draft: &AnnotationDraft,
        details: &AnnotationDetails,
    ) -> Result<Annotation> {
        let url = format!("{}/api/annotations", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&AnnotationRequest::new(draft, details))
            .send()
            .await
            .context("Failed to send annotation commit")?;

        let body = Self::check(response, "Annotation commit").await?;
        annotation_from_wire(body, draft, details).context("Annotation commit returned no id")
    }

    async fn list_rules(&self) -> Result<Vec<Rule>> {
        let url = format!("{}/api/rules", self.base_url);
        let items = self.get_list(&url, "Rule fetch").await?;
        Ok(items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<Rule>(item) {
                Ok(rule) => Some(rule),
                Err(e) => {
                    tracing::warn!("Dropping malformed rule: {}", e);
                    None
                }
            })
            .collect())
    }
}
