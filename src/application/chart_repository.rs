// Repository trait for the upstream chart backend
use crate::domain::annotation::{Annotation, AnnotationDetails, AnnotationDraft};
use crate::domain::rule::Rule;
use crate::domain::tag::Tag;
use crate::domain::telemetry::Sample;
use async_trait::async_trait;

#[async_trait]
pub trait ChartRepository: Send + Sync {
    /// List every known tag descriptor
    async fn list_tags(&self) -> anyhow::Result<Vec<Tag>>;

    /// Fetch samples for the given tags, at most `limit` when set.
    /// Malformed samples are dropped, not reported.
    async fn fetch_samples(&self, tag_ids: &[String], limit: Option<usize>)
        -> anyhow::Result<Vec<Sample>>;

    /// Durably store a confirmed annotation and return it with its identity
    async fn commit_annotation(
        &self,
        draft: &AnnotationDraft,
        details: &AnnotationDetails,
    ) -> anyhow::Result<Annotation>;

    /// Threshold rules configured on the backend
    async fn list_rules(&self) -> anyhow::Result<Vec<Rule>>;
}
