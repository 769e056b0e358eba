//! Progress event types for analysis jobs
//!
//! The analysis engine reports progress through an injected [`ProgressSink`]
//! rather than owning any transport. The job runner that drives the engine
//! decides what to do with each update (log it, stream it, store it).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pipeline stage names, reported in canonical order.
///
/// `Failed` is only ever used for the terminal update of an aborted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStage {
    Validate,
    Scan,
    Normalize,
    Metrics,
    Recommend,
    Dedupe,
    Finalize,
    Failed,
}

impl AnalysisStage {
    /// Lowercase stage name as rendered in progress updates.
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStage::Validate => "validate",
            AnalysisStage::Scan => "scan",
            AnalysisStage::Normalize => "normalize",
            AnalysisStage::Metrics => "metrics",
            AnalysisStage::Recommend => "recommend",
            AnalysisStage::Dedupe => "dedupe",
            AnalysisStage::Finalize => "finalize",
            AnalysisStage::Failed => "failed",
        }
    }
}

impl std::fmt::Display for AnalysisStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single progress report from the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    /// Overall completion in [0, 100]; monotonically non-decreasing per job
    pub percent: u8,
    /// Stage the pipeline is in (or just finished)
    pub stage: AnalysisStage,
    /// Human-readable status line; warnings are delivered here too
    pub message: String,
    /// When the update was produced
    pub at_utc: DateTime<Utc>,
}

impl ProgressUpdate {
    pub fn new(percent: u8, stage: AnalysisStage, message: impl Into<String>) -> Self {
        Self {
            percent,
            stage,
            message: message.into(),
            at_utc: crate::time::now(),
        }
    }
}

/// Receiver for progress updates.
///
/// Implementations must tolerate being called from worker threads.
pub trait ProgressSink: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// Sink that forwards every update to a closure.
pub struct FnSink<F>(pub F);

impl<F> ProgressSink for FnSink<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.0)(update)
    }
}

/// Sink that discards every update.
pub struct NullSink;

impl ProgressSink for NullSink {
    fn report(&self, _update: ProgressUpdate) {}
}

/// Terminal state of an analysis job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Completed,
    Failed,
    Cancelled,
}
