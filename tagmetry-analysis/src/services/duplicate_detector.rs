//! Exact and near duplicate detection
//!
//! Exact duplicates group by SHA-256. Near duplicates come from pairwise
//! Hamming distances between perceptual hashes, banded into Likely/Maybe;
//! groups are connected components of the Likely edges only, built with a
//! union-find.

use crate::models::{
    DuplicateOptions, DuplicateReport, ExactDuplicateGroup, ImageFingerprint, ImageRecord,
    NearDuplicateBand, NearDuplicateFinding, NearDuplicateGroup,
};
use crate::services::fingerprinter::Fingerprinter;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tagmetry_common::{Error, Result};
use tokio_util::sync::CancellationToken;

/// Duplicate detector service
pub struct DuplicateDetector {
    options: DuplicateOptions,
    fingerprinter: Fingerprinter,
}

impl DuplicateDetector {
    pub fn new(options: DuplicateOptions) -> Self {
        Self {
            options,
            fingerprinter: Fingerprinter::new(),
        }
    }

    /// Fingerprint every record in canonical order.
    ///
    /// CPU-bound, so callers run this on a blocking thread. Fingerprinting is
    /// parallel within batches; results keep record order because each batch
    /// collects positionally. Any fingerprint failure aborts: grouping cannot
    /// honour its invariants with holes in the fingerprint list.
    pub fn fingerprint_dataset(
        &self,
        root: &Path,
        records: &[ImageRecord],
        cancel_token: &CancellationToken,
    ) -> Result<Vec<ImageFingerprint>> {
        let batch_size = num_cpus::get().max(1) * 8;
        let mut fingerprints = Vec::with_capacity(records.len());

        for batch in records.chunks(batch_size) {
            if cancel_token.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let batch_results: Vec<Result<ImageFingerprint>> = batch
                .par_iter()
                .map(|record| {
                    if cancel_token.is_cancelled() {
                        return Err(Error::Cancelled);
                    }
                    let absolute = root.join(&record.relative_path);
                    self.fingerprinter
                        .fingerprint_file(&absolute, &record.relative_path)
                })
                .collect();

            for result in batch_results {
                fingerprints.push(result?);
            }
        }

        tracing::info!(files = fingerprints.len(), "Fingerprinting completed");
        Ok(fingerprints)
    }

    /// Build the full duplicate report from fingerprints.
    pub fn detect(&self, fingerprints: &[ImageFingerprint]) -> DuplicateReport {
        let exact_groups = self.exact_groups(fingerprints);
        let near_findings = self.near_findings(fingerprints);
        let near_groups = self.near_groups(fingerprints, &near_findings);

        tracing::info!(
            total_files = fingerprints.len(),
            exact_groups = exact_groups.len(),
            near_findings = near_findings.len(),
            near_groups = near_groups.len(),
            "Duplicate detection completed"
        );

        DuplicateReport {
            total_files: fingerprints.len(),
            exact_groups,
            near_findings,
            near_groups,
        }
    }

    /// Exact groups: same SHA-256, size >= 2. Descending size, then ordinal
    /// SHA; paths ordinal within each group.
    fn exact_groups(&self, fingerprints: &[ImageFingerprint]) -> Vec<ExactDuplicateGroup> {
        let mut by_sha: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for fingerprint in fingerprints {
            by_sha
                .entry(fingerprint.sha256.as_str())
                .or_default()
                .push(fingerprint.relative_path.as_str());
        }

        let mut groups: Vec<(&str, Vec<&str>)> = by_sha
            .into_iter()
            .filter(|(_, paths)| paths.len() >= 2)
            .collect();
        groups.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(b.0)));

        groups
            .into_iter()
            .enumerate()
            .map(|(index, (sha256, mut paths))| {
                paths.sort_unstable();
                ExactDuplicateGroup {
                    group_id: format!("exact-{}", index + 1),
                    sha256: sha256.to_string(),
                    paths: paths.into_iter().map(String::from).collect(),
                }
            })
            .collect()
    }

    /// Banded pairwise findings over pairs not sharing an exact group.
    fn near_findings(&self, fingerprints: &[ImageFingerprint]) -> Vec<NearDuplicateFinding> {
        let mut findings = Vec::new();
        for i in 0..fingerprints.len() {
            for j in (i + 1)..fingerprints.len() {
                let (a, b) = (&fingerprints[i], &fingerprints[j]);
                // Same SHA means same exact group.
                if a.sha256 == b.sha256 {
                    continue;
                }
                let distance = a.hamming_distance(b);
                let band = if distance <= self.options.likely_threshold {
                    NearDuplicateBand::Likely
                } else if distance <= self.options.maybe_threshold {
                    NearDuplicateBand::Maybe
                } else {
                    continue;
                };

                let (left, right) = if a.relative_path <= b.relative_path {
                    (a.relative_path.clone(), b.relative_path.clone())
                } else {
                    (b.relative_path.clone(), a.relative_path.clone())
                };
                findings.push(NearDuplicateFinding {
                    left,
                    right,
                    hamming_distance: distance,
                    band,
                    similarity_score: 1.0 - distance as f64 / 64.0,
                });
            }
        }

        findings.sort_by(|a, b| {
            a.band
                .cmp(&b.band)
                .then_with(|| a.hamming_distance.cmp(&b.hamming_distance))
                .then_with(|| a.left.cmp(&b.left))
                .then_with(|| a.right.cmp(&b.right))
        });
        findings
    }

    /// Connected components under Likely edges only, size >= 2. Descending
    /// size, then ordinal minimum member.
    fn near_groups(
        &self,
        fingerprints: &[ImageFingerprint],
        findings: &[NearDuplicateFinding],
    ) -> Vec<NearDuplicateGroup> {
        let index_of: BTreeMap<&str, usize> = fingerprints
            .iter()
            .enumerate()
            .map(|(index, f)| (f.relative_path.as_str(), index))
            .collect();

        let mut union_find = UnionFind::new(fingerprints.len());
        for finding in findings {
            if finding.band == NearDuplicateBand::Likely {
                union_find.union(index_of[finding.left.as_str()], index_of[finding.right.as_str()]);
            }
        }

        let mut components: BTreeMap<usize, Vec<&str>> = BTreeMap::new();
        for (index, fingerprint) in fingerprints.iter().enumerate() {
            components
                .entry(union_find.find(index))
                .or_default()
                .push(fingerprint.relative_path.as_str());
        }

        let mut groups: Vec<Vec<&str>> = components
            .into_values()
            .filter(|members| members.len() >= 2)
            .map(|mut members| {
                members.sort_unstable();
                members
            })
            .collect();
        groups.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a[0].cmp(b[0])));

        groups
            .into_iter()
            .enumerate()
            .map(|(index, members)| {
                let member_set: BTreeSet<&str> = members.iter().copied().collect();
                let group_findings: Vec<&NearDuplicateFinding> = findings
                    .iter()
                    .filter(|f| {
                        member_set.contains(f.left.as_str())
                            && member_set.contains(f.right.as_str())
                    })
                    .collect();

                let likely_pair_count = group_findings
                    .iter()
                    .filter(|f| f.band == NearDuplicateBand::Likely)
                    .count();
                let maybe_pair_count = group_findings.len() - likely_pair_count;
                let aggregate_score = if group_findings.is_empty() {
                    1.0 - self.options.likely_threshold as f64 / 64.0
                } else {
                    group_findings
                        .iter()
                        .map(|f| f.similarity_score)
                        .sum::<f64>()
                        / group_findings.len() as f64
                };

                NearDuplicateGroup {
                    group_id: format!("near-{}", index + 1),
                    paths: members.into_iter().map(String::from).collect(),
                    aggregate_score,
                    likely_pair_count,
                    maybe_pair_count,
                }
            })
            .collect()
    }
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self::new(DuplicateOptions::default())
    }
}

/// Disjoint-set over fingerprint indices, path compression + union by rank.
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    fn find(&mut self, mut node: usize) -> usize {
        while self.parent[node] != node {
            self.parent[node] = self.parent[self.parent[node]];
            node = self.parent[node];
        }
        node
    }

    fn union(&mut self, a: usize, b: usize) {
        let (root_a, root_b) = (self.find(a), self.find(b));
        if root_a == root_b {
            return;
        }
        match self.rank[root_a].cmp(&self.rank[root_b]) {
            std::cmp::Ordering::Less => self.parent[root_a] = root_b,
            std::cmp::Ordering::Greater => self.parent[root_b] = root_a,
            std::cmp::Ordering::Equal => {
                self.parent[root_b] = root_a;
                self.rank[root_a] += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fingerprint(path: &str, sha: &str, hash: u64) -> ImageFingerprint {
        ImageFingerprint {
            relative_path: path.to_string(),
            sha256: sha.to_string(),
            perceptual_hash: hash,
        }
    }

    #[test]
    fn test_exact_groups_ordering_and_ids() {
        let fingerprints = vec![
            fingerprint("c.png", "bbbb", 0),
            fingerprint("a.png", "aaaa", 0),
            fingerprint("b.png", "aaaa", 0),
            fingerprint("d.png", "bbbb", 0),
            fingerprint("e.png", "bbbb", 0),
            fingerprint("f.png", "cccc", 0),
        ];
        let report = DuplicateDetector::default().detect(&fingerprints);

        assert_eq!(report.total_files, 6);
        assert_eq!(report.exact_groups.len(), 2);
        // Larger group first.
        assert_eq!(report.exact_groups[0].group_id, "exact-1");
        assert_eq!(report.exact_groups[0].sha256, "bbbb");
        assert_eq!(report.exact_groups[0].paths, vec!["c.png", "d.png", "e.png"]);
        assert_eq!(report.exact_groups[1].group_id, "exact-2");
        assert_eq!(report.exact_groups[1].paths, vec!["a.png", "b.png"]);
    }

    #[test]
    fn test_same_sha_pairs_never_near_findings() {
        let fingerprints = vec![
            fingerprint("a.png", "aaaa", 0),
            fingerprint("b.png", "aaaa", 0),
        ];
        let report = DuplicateDetector::default().detect(&fingerprints);
        assert_eq!(report.exact_groups.len(), 1);
        assert!(report.near_findings.is_empty());
        assert!(report.near_groups.is_empty());
    }

    #[test]
    fn test_band_classification_and_scores() {
        // distances: a-b = 4 (Likely), a-c = 12 (Maybe), b-c = 8 (Likely)
        let fingerprints = vec![
            fingerprint("a.png", "s1", 0b0000_0000_0000),
            fingerprint("b.png", "s2", 0b0000_0000_1111 << 1),
            fingerprint("c.png", "s3", 0b1111_1111_1111 << 1),
        ];
        let report = DuplicateDetector::default().detect(&fingerprints);

        assert_eq!(report.near_findings.len(), 3);
        // Likely findings first, ascending distance.
        assert_eq!(report.near_findings[0].left, "a.png");
        assert_eq!(report.near_findings[0].right, "b.png");
        assert_eq!(report.near_findings[0].hamming_distance, 4);
        assert_eq!(report.near_findings[0].band, NearDuplicateBand::Likely);
        assert_eq!(report.near_findings[1].hamming_distance, 8);
        assert_eq!(report.near_findings[2].band, NearDuplicateBand::Maybe);

        for finding in &report.near_findings {
            let expected = 1.0 - finding.hamming_distance as f64 / 64.0;
            assert_eq!(finding.similarity_score, expected);
            assert!((0.0..=1.0).contains(&finding.similarity_score));
        }
    }

    #[test]
    fn test_likely_edges_merge_maybe_edges_do_not() {
        // a-b Likely (4), b-c Likely (8), a-c Maybe (12): one component.
        let fingerprints = vec![
            fingerprint("a.png", "s1", 0),
            fingerprint("b.png", "s2", 0b1111 << 1),
            fingerprint("c.png", "s3", 0b1111_1111_1111 << 1),
            // d only reaches the others beyond maybeThreshold.
            fingerprint("d.png", "s4", u64::MAX << 1),
        ];
        let report = DuplicateDetector::default().detect(&fingerprints);

        assert_eq!(report.near_groups.len(), 1);
        let group = &report.near_groups[0];
        assert_eq!(group.group_id, "near-1");
        assert_eq!(group.paths, vec!["a.png", "b.png", "c.png"]);
        assert_eq!(group.likely_pair_count, 2);
        assert_eq!(group.maybe_pair_count, 1);

        let expected_mean = ((1.0 - 4.0 / 64.0) + (1.0 - 8.0 / 64.0) + (1.0 - 12.0 / 64.0)) / 3.0;
        assert!((group.aggregate_score - expected_mean).abs() < 1e-12);
    }

    #[test]
    fn test_maybe_only_pairs_form_no_group() {
        // distance 12: Maybe band, no Likely edge anywhere.
        let fingerprints = vec![
            fingerprint("a.png", "s1", 0),
            fingerprint("b.png", "s2", 0b1111_1111_1111 << 1),
        ];
        let report = DuplicateDetector::default().detect(&fingerprints);
        assert_eq!(report.near_findings.len(), 1);
        assert_eq!(report.near_findings[0].band, NearDuplicateBand::Maybe);
        assert!(report.near_groups.is_empty());
    }

    #[test]
    fn test_empty_and_single_inputs() {
        let detector = DuplicateDetector::default();
        let empty = detector.detect(&[]);
        assert_eq!(empty.total_files, 0);
        assert!(empty.exact_groups.is_empty());
        assert!(empty.near_groups.is_empty());

        let single = detector.detect(&[fingerprint("a.png", "s1", 0)]);
        assert_eq!(single.total_files, 1);
        assert!(single.exact_groups.is_empty());
        assert!(single.near_findings.is_empty());
    }

    #[test]
    fn test_union_find_components() {
        let mut uf = UnionFind::new(5);
        uf.union(0, 1);
        uf.union(3, 4);
        assert_eq!(uf.find(0), uf.find(1));
        assert_eq!(uf.find(3), uf.find(4));
        assert_ne!(uf.find(0), uf.find(3));
        assert_eq!(uf.find(2), 2);

        uf.union(1, 3);
        assert_eq!(uf.find(0), uf.find(4));
    }

    #[test]
    fn test_group_connectivity_invariant() {
        // Every member pair of a near group must be reachable through Likely
        // edges; verify on a chain a-b-c-d.
        let fingerprints = vec![
            fingerprint("a.png", "s1", 0),
            fingerprint("b.png", "s2", 0b11 << 1),
            fingerprint("c.png", "s3", 0b1111 << 1),
            fingerprint("d.png", "s4", 0b111111 << 1),
        ];
        let report = DuplicateDetector::default().detect(&fingerprints);
        assert_eq!(report.near_groups.len(), 1);
        assert_eq!(report.near_groups[0].paths.len(), 4);
    }
}
