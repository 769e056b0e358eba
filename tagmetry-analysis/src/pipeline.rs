//! Analysis pipeline orchestration
//!
//! Drives the seven stages in canonical order: validate, scan, normalize,
//! metrics, recommend, dedupe, finalize. Progress is reported after each
//! stage with monotonically non-decreasing percent; the cancellation token is
//! honoured between stages and inside every per-image loop.

use crate::models::{DuplicateOptions, MetricsOptions, RecommendationRule};
use crate::report::ReportWriter;
use crate::services::{
    extract_tag_bags, DatasetScanner, DuplicateDetector, MetricsEvaluator, RecommendationEngine,
    RulesetLoader, TagNormalizer,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tagmetry_common::api::{artifacts, AnalysisOutcome, AnalysisRequest};
use tagmetry_common::events::{AnalysisStage, ProgressSink, ProgressUpdate};
use tagmetry_common::{Error, Result};
use tokio_util::sync::CancellationToken;

// Percent milestone reached when each stage completes.
const PCT_VALIDATE: u8 = 2;
const PCT_SCAN: u8 = 20;
const PCT_NORMALIZE: u8 = 30;
const PCT_METRICS: u8 = 55;
const PCT_RECOMMEND: u8 = 65;
const PCT_DEDUPE: u8 = 90;
const PCT_FINALIZE: u8 = 100;

/// Run one analysis job to completion.
///
/// Never returns an error: failures and cancellation are folded into the
/// returned [`AnalysisOutcome`], with partially-written artifacts deleted
/// best-effort first. Cancellation always surfaces as `Cancelled`, never as
/// `Failed`.
pub async fn run_analysis(
    request: AnalysisRequest,
    progress_sink: Arc<dyn ProgressSink>,
    cancel_token: CancellationToken,
) -> AnalysisOutcome {
    let output_dir = request
        .output_dir
        .clone()
        .unwrap_or_else(|| request.input_dir.join("tagmetry-out"));

    let mut job = AnalysisJob {
        request,
        output_dir: output_dir.clone(),
        sink: progress_sink,
        cancel_token,
        writer: ReportWriter::new(output_dir),
        outputs: BTreeMap::new(),
    };

    match job.execute().await {
        Ok(()) => AnalysisOutcome::completed(job.outputs),
        Err(e) if e.is_cancelled() => {
            tracing::info!("Analysis cancelled; removing partial artifacts");
            job.remove_artifacts().await;
            AnalysisOutcome::cancelled()
        }
        Err(e) => {
            tracing::error!(error = %e, "Analysis failed; removing partial artifacts");
            job.remove_artifacts().await;
            job.report(PCT_FINALIZE, AnalysisStage::Failed, format!("{}", e));
            AnalysisOutcome::failed(format!("{}: {}", e.kind(), e))
        }
    }
}

struct AnalysisJob {
    request: AnalysisRequest,
    output_dir: PathBuf,
    sink: Arc<dyn ProgressSink>,
    cancel_token: CancellationToken,
    writer: ReportWriter,
    outputs: BTreeMap<String, String>,
}

impl AnalysisJob {
    async fn execute(&mut self) -> Result<()> {
        // Stage 1: validate
        self.check_cancelled()?;
        if !self.request.input_dir.is_dir() {
            return Err(Error::InputNotFound(self.request.input_dir.clone()));
        }
        let input_dir = self
            .request
            .input_dir
            .canonicalize()
            .map_err(|_| Error::InputNotFound(self.request.input_dir.clone()))?;
        tokio::fs::create_dir_all(&self.output_dir).await?;

        // The ruleset loads up front so a malformed file fails fast.
        let rules: Vec<RecommendationRule> = match &self.request.rules_path {
            Some(path) => RulesetLoader::new().load_from_path(path)?,
            None => Vec::new(),
        };
        self.report(
            PCT_VALIDATE,
            AnalysisStage::Validate,
            format!(
                "Validated dataset at '{}' ({} recommendation rules loaded)",
                input_dir.display(),
                rules.len()
            ),
        );

        // Stage 2: scan
        self.check_cancelled()?;
        let scan_output = {
            let root = input_dir.clone();
            let records_path = self.writer.artifact_path(artifacts::DATASET_JSONL);
            let summary_path = self.writer.artifact_path(artifacts::SUMMARY_JSON);
            let cancel = self.cancel_token.clone();
            tokio::task::spawn_blocking(move || {
                DatasetScanner::new().scan(&root, &records_path, &summary_path, &cancel)
            })
            .await
            .map_err(join_error)??
        };
        for warning in &scan_output.warnings {
            self.report(PCT_SCAN, AnalysisStage::Scan, format!("warning: {}", warning));
        }

        let records_path = self.writer.write_dataset_jsonl(&scan_output.records).await?;
        self.record_output(artifacts::DATASET_JSONL, records_path);
        let summary_path = self.writer.write_summary(&scan_output.summary).await?;
        self.record_output(artifacts::SUMMARY_JSON, summary_path);
        self.report(
            PCT_SCAN,
            AnalysisStage::Scan,
            format!("Scanned {} images", scan_output.records.len()),
        );

        // Stage 3: normalize
        self.check_cancelled()?;
        let normalized_bags = if self.request.enable_tag_metrics {
            let normalizer = TagNormalizer::default();
            let mut bags = Vec::with_capacity(scan_output.records.len());
            for bag in extract_tag_bags(&scan_output.records) {
                self.check_cancelled()?;
                bags.push(normalizer.normalize(&bag).normalized_tokens);
            }
            self.report(
                PCT_NORMALIZE,
                AnalysisStage::Normalize,
                format!("Normalized tags for {} samples", bags.len()),
            );
            Some(bags)
        } else {
            self.report(
                PCT_NORMALIZE,
                AnalysisStage::Normalize,
                "Tag normalization skipped",
            );
            None
        };

        // Stage 4: metrics
        self.check_cancelled()?;
        let metrics_report = match &normalized_bags {
            Some(bags) => {
                let options = MetricsOptions {
                    // Exact-content keys: samples sharing file bytes share a
                    // group, which is what the hook estimates.
                    duplicate_group_keys: Some(
                        scan_output
                            .records
                            .iter()
                            .map(|r| Some(r.sha256.clone()))
                            .collect(),
                    ),
                    ..MetricsOptions::default()
                };
                let report = MetricsEvaluator::new(options).evaluate(bags);
                let (json_path, md_path) = self.writer.write_metrics(&report).await?;
                self.record_output(artifacts::METRICS_JSON, json_path);
                self.record_output(artifacts::METRICS_MD, md_path);
                self.report(
                    PCT_METRICS,
                    AnalysisStage::Metrics,
                    format!(
                        "Computed tag health metrics over {} unique tags",
                        report.unique_tag_count
                    ),
                );
                Some(report)
            }
            None => {
                self.report(PCT_METRICS, AnalysisStage::Metrics, "Tag metrics skipped");
                None
            }
        };

        // Stage 5: recommend
        self.check_cancelled()?;
        match (&metrics_report, self.request.enable_recommendations) {
            (Some(report), true) => {
                let evaluation = RecommendationEngine::new().evaluate(&rules, report);
                let path = self.writer.write_recommendations(&evaluation).await?;
                self.record_output(artifacts::RECOMMENDATIONS_JSON, path);
                self.report(
                    PCT_RECOMMEND,
                    AnalysisStage::Recommend,
                    format!(
                        "Evaluated {} rules, {} matched",
                        evaluation.rules_evaluated,
                        evaluation.matches.len()
                    ),
                );
            }
            (None, true) => {
                self.report(
                    PCT_RECOMMEND,
                    AnalysisStage::Recommend,
                    "Recommendations skipped (tag metrics disabled)",
                );
            }
            _ => {
                self.report(
                    PCT_RECOMMEND,
                    AnalysisStage::Recommend,
                    "Recommendations skipped",
                );
            }
        }

        // Stage 6: dedupe
        self.check_cancelled()?;
        if self.request.enable_duplicate_detection {
            let detector = Arc::new(DuplicateDetector::new(DuplicateOptions::default()));
            let fingerprints = {
                let detector = detector.clone();
                let root = input_dir.clone();
                let records = scan_output.records.clone();
                let cancel = self.cancel_token.clone();
                tokio::task::spawn_blocking(move || {
                    detector.fingerprint_dataset(&root, &records, &cancel)
                })
                .await
                .map_err(join_error)??
            };
            let duplicate_report = detector.detect(&fingerprints);
            let path = self.writer.write_duplicates(&duplicate_report).await?;
            self.record_output(artifacts::DUPLICATES_JSON, path);
            self.report(
                PCT_DEDUPE,
                AnalysisStage::Dedupe,
                format!(
                    "Found {} exact and {} near duplicate groups",
                    duplicate_report.exact_groups.len(),
                    duplicate_report.near_groups.len()
                ),
            );
        } else {
            self.report(
                PCT_DEDUPE,
                AnalysisStage::Dedupe,
                "Duplicate detection skipped",
            );
        }

        // Stage 7: finalize
        self.check_cancelled()?;
        self.report(
            PCT_FINALIZE,
            AnalysisStage::Finalize,
            format!("Analysis complete; {} artifacts written", self.outputs.len()),
        );
        Ok(())
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel_token.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    fn report(&self, percent: u8, stage: AnalysisStage, message: impl Into<String>) {
        let update = ProgressUpdate::new(percent, stage, message);
        tracing::info!(stage = %update.stage, percent = update.percent, "{}", update.message);
        self.sink.report(update);
    }

    fn record_output(&mut self, name: &str, path: PathBuf) {
        self.outputs
            .insert(name.to_string(), path.to_string_lossy().into_owned());
    }

    /// Best-effort deletion of everything this job may have written.
    async fn remove_artifacts(&self) {
        for name in [
            artifacts::DATASET_JSONL,
            artifacts::SUMMARY_JSON,
            artifacts::METRICS_JSON,
            artifacts::METRICS_MD,
            artifacts::RECOMMENDATIONS_JSON,
            artifacts::DUPLICATES_JSON,
        ] {
            let path = self.writer.artifact_path(name);
            if let Err(e) = tokio::fs::remove_file(&path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %e, "Could not remove artifact");
                }
            }
        }
    }
}

fn join_error(e: tokio::task::JoinError) -> Error {
    Error::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("worker task failed: {}", e),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tagmetry_common::events::{FnSink, JobState};
    use tempfile::TempDir;

    fn collecting_sink() -> (Arc<dyn ProgressSink>, Arc<Mutex<Vec<ProgressUpdate>>>) {
        let updates: Arc<Mutex<Vec<ProgressUpdate>>> = Arc::new(Mutex::new(Vec::new()));
        let store = updates.clone();
        let sink = Arc::new(FnSink(move |update| {
            store.lock().unwrap().push(update);
        }));
        (sink, updates)
    }

    #[tokio::test]
    async fn test_missing_input_fails_with_failed_stage_update() {
        let (sink, updates) = collecting_sink();
        let request = AnalysisRequest::new("/nonexistent/tagmetry-dataset");
        let outcome = run_analysis(request, sink, CancellationToken::new()).await;

        assert_eq!(outcome.state, JobState::Failed);
        assert!(outcome.error.as_deref().unwrap().contains("InputNotFound"));

        let updates = updates.lock().unwrap();
        let last = updates.last().unwrap();
        assert_eq!(last.stage, AnalysisStage::Failed);
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_yields_cancelled() {
        let dir = TempDir::new().unwrap();
        let (sink, _) = collecting_sink();
        let token = CancellationToken::new();
        token.cancel();

        let outcome = run_analysis(AnalysisRequest::new(dir.path()), sink, token).await;
        assert_eq!(outcome.state, JobState::Cancelled);
        assert!(outcome.error.is_none());
        assert!(outcome.outputs.is_empty());
    }

    #[tokio::test]
    async fn test_empty_dataset_completes_with_monotone_progress() {
        let dir = TempDir::new().unwrap();
        let (sink, updates) = collecting_sink();

        let outcome =
            run_analysis(AnalysisRequest::new(dir.path()), sink, CancellationToken::new()).await;
        assert_eq!(outcome.state, JobState::Completed);
        assert_eq!(outcome.outputs.len(), 6);

        let updates = updates.lock().unwrap();
        let stages: Vec<AnalysisStage> = updates.iter().map(|u| u.stage).collect();
        assert_eq!(
            stages,
            vec![
                AnalysisStage::Validate,
                AnalysisStage::Scan,
                AnalysisStage::Normalize,
                AnalysisStage::Metrics,
                AnalysisStage::Recommend,
                AnalysisStage::Dedupe,
                AnalysisStage::Finalize,
            ]
        );
        for window in updates.windows(2) {
            assert!(window[0].percent <= window[1].percent);
        }
        assert_eq!(updates.last().unwrap().percent, 100);
    }

    #[tokio::test]
    async fn test_disabled_stages_still_report_in_order() {
        let dir = TempDir::new().unwrap();
        let (sink, updates) = collecting_sink();

        let request = AnalysisRequest {
            enable_duplicate_detection: false,
            enable_tag_metrics: false,
            enable_recommendations: false,
            ..AnalysisRequest::new(dir.path())
        };
        let outcome = run_analysis(request, sink, CancellationToken::new()).await;
        assert_eq!(outcome.state, JobState::Completed);
        // Only the scan artifacts get written.
        assert_eq!(outcome.outputs.len(), 2);
        assert!(outcome.outputs.contains_key(artifacts::DATASET_JSONL));
        assert!(outcome.outputs.contains_key(artifacts::SUMMARY_JSON));

        let updates = updates.lock().unwrap();
        assert_eq!(updates.len(), 7);
        assert!(updates[3].message.contains("skipped"));
    }
}
