//! Report writer
//!
//! Serializes the per-image record stream (JSONL), the summary index, the
//! metrics report (JSON + Markdown), the recommendation evaluation, and the
//! duplicate report.

use crate::models::{
    DuplicateReport, ImageRecord, MetricsReport, RecommendationEvaluation, SummaryIndex,
};
use crate::report::markdown::render_metrics_markdown;
use std::path::{Path, PathBuf};
use tagmetry_common::api::artifacts;
use tagmetry_common::Result;

/// Report writer service, rooted at the job's output directory.
pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Absolute path of a named artifact.
    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }

    /// One compact record per line, canonical enumeration order.
    pub async fn write_dataset_jsonl(&self, records: &[ImageRecord]) -> Result<PathBuf> {
        let mut body = String::new();
        for record in records {
            body.push_str(&serde_json::to_string(record).map_err(to_io_error)?);
            body.push('\n');
        }
        self.write_artifact(artifacts::DATASET_JSONL, body).await
    }

    pub async fn write_summary(&self, summary: &SummaryIndex) -> Result<PathBuf> {
        self.write_pretty_json(artifacts::SUMMARY_JSON, summary).await
    }

    /// Metrics as JSON and as the Markdown summary.
    pub async fn write_metrics(&self, report: &MetricsReport) -> Result<(PathBuf, PathBuf)> {
        let json_path = self.write_pretty_json(artifacts::METRICS_JSON, report).await?;
        let md_path = self
            .write_artifact(artifacts::METRICS_MD, render_metrics_markdown(report))
            .await?;
        Ok((json_path, md_path))
    }

    pub async fn write_recommendations(
        &self,
        evaluation: &RecommendationEvaluation,
    ) -> Result<PathBuf> {
        self.write_pretty_json(artifacts::RECOMMENDATIONS_JSON, evaluation)
            .await
    }

    pub async fn write_duplicates(&self, report: &DuplicateReport) -> Result<PathBuf> {
        self.write_pretty_json(artifacts::DUPLICATES_JSON, report).await
    }

    async fn write_pretty_json<T: serde::Serialize>(
        &self,
        name: &str,
        value: &T,
    ) -> Result<PathBuf> {
        let mut body = serde_json::to_string_pretty(value).map_err(to_io_error)?;
        body.push('\n');
        self.write_artifact(name, body).await
    }

    async fn write_artifact(&self, name: &str, body: String) -> Result<PathBuf> {
        let path = self.artifact_path(name);
        tokio::fs::write(&path, body.as_bytes()).await?;
        tracing::debug!(artifact = name, bytes = body.len(), "Artifact written");
        Ok(path)
    }
}

fn to_io_error(e: serde_json::Error) -> tagmetry_common::Error {
    tagmetry_common::Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}
