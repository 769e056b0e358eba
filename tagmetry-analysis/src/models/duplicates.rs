//! Duplicate detection report types

use serde::{Deserialize, Serialize};

/// Near-duplicate confidence band. Only `Likely` edges merge groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NearDuplicateBand {
    Likely,
    Maybe,
}

/// Per-image fingerprint in canonical enumeration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFingerprint {
    pub relative_path: String,
    /// Lowercase hex, 64 chars
    pub sha256: String,
    /// 64-bit DCT perceptual hash; the DC bit (bit 0) is always zero
    pub perceptual_hash: u64,
}

impl ImageFingerprint {
    /// Bit count of the XOR between two perceptual hashes.
    pub fn hamming_distance(&self, other: &Self) -> u32 {
        (self.perceptual_hash ^ other.perceptual_hash).count_ones()
    }
}

/// Byte-identical files grouped by SHA-256.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactDuplicateGroup {
    /// "exact-1", "exact-2", ... in output order
    pub group_id: String,
    pub sha256: String,
    /// At least two paths, ordinal order
    pub paths: Vec<String>,
}

/// One perceptually close pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearDuplicateFinding {
    pub left: String,
    pub right: String,
    pub hamming_distance: u32,
    pub band: NearDuplicateBand,
    /// 1 - hammingDistance/64, always in [0, 1]
    pub similarity_score: f64,
}

/// Connected component under Likely edges, size >= 2.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearDuplicateGroup {
    /// "near-1", "near-2", ... in output order
    pub group_id: String,
    pub paths: Vec<String>,
    /// Mean similarity of the group's findings, or 1 - likelyThreshold/64
    /// when the group has none
    pub aggregate_score: f64,
    pub likely_pair_count: usize,
    pub maybe_pair_count: usize,
}

/// Full report written to `duplicates.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateReport {
    pub total_files: usize,
    pub exact_groups: Vec<ExactDuplicateGroup>,
    pub near_findings: Vec<NearDuplicateFinding>,
    pub near_groups: Vec<NearDuplicateGroup>,
}

/// Detector thresholds, expressed in Hamming-distance bits.
#[derive(Debug, Clone, Copy)]
pub struct DuplicateOptions {
    pub likely_threshold: u32,
    pub maybe_threshold: u32,
}

impl Default for DuplicateOptions {
    fn default() -> Self {
        Self {
            likely_threshold: 8,
            maybe_threshold: 16,
        }
    }
}
