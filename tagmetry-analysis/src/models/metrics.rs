//! Tag-health metrics report types (M1-M11)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A low-information tag surfaced by the smoothed-IDF pass (M7).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopTagCandidate {
    pub tag: String,
    /// Number of samples containing the tag
    pub document_frequency: usize,
    /// Smoothed IDF: ln((N+1)/(df+1)) + 1
    pub idf: f64,
}

/// A strongly associated tag pair (M8).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PmiAnomaly {
    pub left: String,
    pub right: String,
    pub cooccurrence: usize,
    pub pmi: f64,
}

/// Coarse co-occurrence community summary (M9).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityHint {
    pub community_count: usize,
    /// (components / nodes) * (edges / max(edges, 1)) -- a coarse scalar,
    /// not true modularity
    pub modularity_hint: f64,
    /// First tags of each community, ordinal order, component order by
    /// smallest member
    pub previews: Vec<Vec<String>>,
}

/// Duplicate-pressure hook (M10), fed from grouping keys when available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearDuplicateRateHook {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
    pub note: String,
}

/// The full M1-M11 report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsReport {
    pub sample_count: usize,
    pub token_count: usize,
    pub unique_tag_count: usize,
    /// M1: Shannon entropy (natural log) of the global tag distribution
    pub entropy: f64,
    /// M2: exp(entropy)
    pub effective_tag_count: f64,
    /// M3
    pub gini: f64,
    /// M4
    pub hhi: f64,
    /// M5: requested K -> cumulative mass of the K most frequent tags
    pub top_k_mass: BTreeMap<u32, f64>,
    /// M6: base-2 Jensen-Shannon divergence to the target prior
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jsd_to_target: Option<f64>,
    /// M7
    pub stop_tag_candidates: Vec<StopTagCandidate>,
    /// M8
    pub pmi_anomalies: Vec<PmiAnomaly>,
    /// M9
    pub community_hint: CommunityHint,
    /// M10
    pub near_duplicate_rate_hook: NearDuplicateRateHook,
    /// M11: fraction of tokens longer than the configured maximum
    pub token_length_overflow_rate: f64,
    pub generated_at_utc: DateTime<Utc>,
}

/// Evaluator configuration.
#[derive(Debug, Clone)]
pub struct MetricsOptions {
    /// K values for the top-K mass table
    pub top_k: Vec<u32>,
    /// Target prior for M6; renormalized before use, skipped when the mass
    /// sums to zero or less
    pub target_distribution: Option<BTreeMap<String, f64>>,
    /// Minimum document frequency for stop-candidate inclusion
    pub stop_candidate_min_df: usize,
    pub stop_candidate_limit: usize,
    /// Minimum pair co-occurrence for PMI mining
    pub pmi_min_cooccurrence: usize,
    pub pmi_limit: usize,
    /// Minimum edge weight kept in the community graph
    pub community_edge_threshold: usize,
    pub community_preview_size: usize,
    /// Per-sample grouping keys for the near-duplicate rate hook; must match
    /// the sample count to be used
    pub duplicate_group_keys: Option<Vec<Option<String>>>,
    pub max_token_length: usize,
    /// Fixed report timestamp; `None` means the wall clock. Lets callers pin
    /// outputs for reproducibility checks.
    pub generated_at: Option<DateTime<Utc>>,
}

impl Default for MetricsOptions {
    fn default() -> Self {
        Self {
            top_k: vec![1, 5, 10, 25],
            target_distribution: None,
            stop_candidate_min_df: 2,
            stop_candidate_limit: 25,
            pmi_min_cooccurrence: 2,
            pmi_limit: 25,
            community_edge_threshold: 2,
            community_preview_size: 5,
            duplicate_group_keys: None,
            max_token_length: 64,
            generated_at: None,
        }
    }
}
