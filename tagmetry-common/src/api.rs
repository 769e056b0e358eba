//! Shared analysis job request/result types
//!
//! Used by the analysis engine and by whatever surface drives it (CLI, job
//! runner). The engine itself never reads configuration from disk or
//! environment; everything arrives through [`AnalysisRequest`].

use crate::events::JobState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Artifact file names, relative to the job's output directory.
pub mod artifacts {
    /// One `ImageRecord` per line
    pub const DATASET_JSONL: &str = "dataset.jsonl";
    /// The `SummaryIndex`
    pub const SUMMARY_JSON: &str = "summary.json";
    /// M1-M11 in JSON
    pub const METRICS_JSON: &str = "metrics.json";
    /// M1-M11 as Markdown
    pub const METRICS_MD: &str = "metrics.md";
    /// The `RecommendationEvaluation`
    pub const RECOMMENDATIONS_JSON: &str = "recommendations.json";
    /// The `DuplicateReport`
    pub const DUPLICATES_JSON: &str = "duplicates.json";
}

/// Everything needed to run one analysis job.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// Dataset root to scan
    pub input_dir: PathBuf,
    /// Artifact directory; defaults to `<input_dir>/tagmetry-out`
    pub output_dir: Option<PathBuf>,
    /// Recommendation ruleset (JSON or YAML); no ruleset means an empty one
    pub rules_path: Option<PathBuf>,
    pub enable_duplicate_detection: bool,
    pub enable_tag_metrics: bool,
    pub enable_recommendations: bool,
}

impl AnalysisRequest {
    /// Request with every analysis feature enabled.
    pub fn new(input_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: None,
            rules_path: None,
            enable_duplicate_detection: true,
            enable_tag_metrics: true,
            enable_recommendations: true,
        }
    }
}

/// Terminal result of an analysis job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    pub state: JobState,
    /// Artifact name -> absolute path, for every artifact that was written
    pub outputs: BTreeMap<String, String>,
    /// Error kind and summary when `state` is `Failed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub finished_at_utc: DateTime<Utc>,
}

impl AnalysisOutcome {
    pub fn completed(outputs: BTreeMap<String, String>) -> Self {
        Self {
            state: JobState::Completed,
            outputs,
            error: None,
            finished_at_utc: crate::time::now(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            state: JobState::Failed,
            outputs: BTreeMap::new(),
            error: Some(error.into()),
            finished_at_utc: crate::time::now(),
        }
    }

    pub fn cancelled() -> Self {
        Self {
            state: JobState::Cancelled,
            outputs: BTreeMap::new(),
            error: None,
            finished_at_utc: crate::time::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_request_enables_everything() {
        let request = AnalysisRequest::new("/data/set");
        assert!(request.enable_duplicate_detection);
        assert!(request.enable_tag_metrics);
        assert!(request.enable_recommendations);
        assert!(request.output_dir.is_none());
    }

    #[test]
    fn test_outcome_states() {
        assert_eq!(AnalysisOutcome::cancelled().state, JobState::Cancelled);
        let failed = AnalysisOutcome::failed("IoFailure: disk gone");
        assert_eq!(failed.state, JobState::Failed);
        assert!(failed.error.as_deref().unwrap().starts_with("IoFailure"));
    }

    #[test]
    fn test_outcome_serializes_camel_case() {
        let outcome = AnalysisOutcome::completed(BTreeMap::new());
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"finishedAtUtc\""));
        assert!(json.contains("\"state\":\"Completed\""));
        assert!(!json.contains("\"error\""));
    }
}
