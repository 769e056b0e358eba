//! Tag-health metrics evaluator
//!
//! Computes M1-M11 over a sequence of per-sample tag bags. Every ordering is
//! fully specified (value, then ordinal tag) so that two runs over the same
//! input produce identical reports.

use crate::models::{
    CommunityHint, MetricsOptions, MetricsReport, NearDuplicateRateHook, PmiAnomaly,
    StopTagCandidate,
};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Metrics evaluator service
pub struct MetricsEvaluator {
    options: MetricsOptions,
}

impl MetricsEvaluator {
    pub fn new(options: MetricsOptions) -> Self {
        Self { options }
    }

    /// Evaluate M1-M11 for the given tag bags.
    pub fn evaluate(&self, samples: &[Vec<String>]) -> MetricsReport {
        let sample_count = samples.len();

        // Global token frequencies, keyed ordinally.
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        let mut token_count = 0usize;
        for bag in samples {
            for token in bag {
                *counts.entry(token.as_str()).or_insert(0) += 1;
                token_count += 1;
            }
        }
        let unique_tag_count = counts.len();

        let probabilities: Vec<(&str, f64)> = counts
            .iter()
            .map(|(tag, count)| (*tag, *count as f64 / token_count.max(1) as f64))
            .collect();
        debug_assert!(
            probabilities.is_empty()
                || (probabilities.iter().map(|(_, p)| p).sum::<f64>() - 1.0).abs() < 1e-9
        );

        let entropy = entropy_nats(&probabilities);
        let effective_tag_count = entropy.exp();
        let gini = gini_coefficient(&probabilities);
        let hhi = probabilities.iter().map(|(_, p)| p * p).sum::<f64>();
        let top_k_mass = self.top_k_mass(&probabilities);
        let jsd_to_target = self.jsd_to_target(&probabilities);

        // Document frequencies drive M7 and M8.
        let document_frequency = document_frequencies(samples);
        let stop_tag_candidates = self.stop_tag_candidates(&document_frequency, sample_count);
        let cooccurrence = pair_cooccurrences(samples);
        let pmi_anomalies =
            self.pmi_anomalies(&cooccurrence, &document_frequency, sample_count);
        let community_hint = self.community_hint(&cooccurrence);
        let near_duplicate_rate_hook = self.near_duplicate_rate(sample_count);
        let token_length_overflow_rate = self.overflow_rate(samples, token_count);

        tracing::debug!(
            sample_count,
            token_count,
            unique_tag_count,
            entropy,
            "Metrics evaluation completed"
        );

        MetricsReport {
            sample_count,
            token_count,
            unique_tag_count,
            entropy,
            effective_tag_count,
            gini,
            hhi,
            top_k_mass,
            jsd_to_target,
            stop_tag_candidates,
            pmi_anomalies,
            community_hint,
            near_duplicate_rate_hook,
            token_length_overflow_rate,
            generated_at_utc: self
                .options
                .generated_at
                .unwrap_or_else(tagmetry_common::time::now),
        }
    }

    /// M5: cumulative mass of the K most frequent tags, ties broken by
    /// ordinal tag name.
    fn top_k_mass(&self, probabilities: &[(&str, f64)]) -> BTreeMap<u32, f64> {
        let mut by_mass: Vec<(&str, f64)> = probabilities.to_vec();
        by_mass.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });

        let mut mass = BTreeMap::new();
        for &k in &self.options.top_k {
            let sum: f64 = by_mass.iter().take(k as usize).map(|(_, p)| p).sum();
            mass.insert(k, sum.min(1.0));
        }
        mass
    }

    /// M6: base-2 Jensen-Shannon divergence to the renormalized target, or
    /// `None` when no usable target exists.
    fn jsd_to_target(&self, probabilities: &[(&str, f64)]) -> Option<f64> {
        let target = self.options.target_distribution.as_ref()?;
        let total: f64 = target.values().sum();
        if total <= 0.0 {
            return None;
        }

        let observed: BTreeMap<&str, f64> = probabilities.iter().copied().collect();
        let mut keys: BTreeSet<&str> = observed.keys().copied().collect();
        keys.extend(target.keys().map(String::as_str));

        let mut divergence = 0.0;
        for key in keys {
            let p = observed.get(key).copied().unwrap_or(0.0);
            let q = target.get(key).copied().unwrap_or(0.0) / total;
            let m = 0.5 * (p + q);
            if p > 0.0 {
                divergence += 0.5 * p * (p / m).log2();
            }
            if q > 0.0 {
                divergence += 0.5 * q * (q / m).log2();
            }
        }
        Some(divergence.max(0.0))
    }

    /// M7: frequent low-information tags by ascending smoothed IDF.
    fn stop_tag_candidates(
        &self,
        document_frequency: &BTreeMap<&str, usize>,
        sample_count: usize,
    ) -> Vec<StopTagCandidate> {
        let mut candidates: Vec<StopTagCandidate> = document_frequency
            .iter()
            .filter(|(_, df)| **df >= self.options.stop_candidate_min_df)
            .map(|(tag, df)| StopTagCandidate {
                tag: (*tag).to_string(),
                document_frequency: *df,
                idf: ((sample_count as f64 + 1.0) / (*df as f64 + 1.0)).ln() + 1.0,
            })
            .collect();

        candidates.sort_by(|a, b| {
            a.idf
                .partial_cmp(&b.idf)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.document_frequency.cmp(&a.document_frequency))
                .then_with(|| a.tag.cmp(&b.tag))
        });
        candidates.truncate(self.options.stop_candidate_limit);
        candidates
    }

    /// M8: pointwise mutual information over qualifying pairs, probabilities
    /// derived from document frequencies.
    fn pmi_anomalies(
        &self,
        cooccurrence: &BTreeMap<(String, String), usize>,
        document_frequency: &BTreeMap<&str, usize>,
        sample_count: usize,
    ) -> Vec<PmiAnomaly> {
        if sample_count == 0 {
            return Vec::new();
        }
        let n = sample_count as f64;

        let mut anomalies: Vec<PmiAnomaly> = cooccurrence
            .iter()
            .filter(|(_, count)| **count >= self.options.pmi_min_cooccurrence)
            .map(|((left, right), count)| {
                let p_pair = *count as f64 / n;
                let p_left = document_frequency
                    .get(left.as_str())
                    .copied()
                    .unwrap_or(0) as f64
                    / n;
                let p_right = document_frequency
                    .get(right.as_str())
                    .copied()
                    .unwrap_or(0) as f64
                    / n;
                PmiAnomaly {
                    left: left.clone(),
                    right: right.clone(),
                    cooccurrence: *count,
                    pmi: (p_pair / (p_left * p_right)).log2(),
                }
            })
            .collect();

        anomalies.sort_by(|a, b| {
            b.pmi
                .partial_cmp(&a.pmi)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.cooccurrence.cmp(&a.cooccurrence))
                .then_with(|| a.left.cmp(&b.left))
                .then_with(|| a.right.cmp(&b.right))
        });
        anomalies.truncate(self.options.pmi_limit);
        anomalies
    }

    /// M9: connected components of the thresholded co-occurrence graph,
    /// BFS with neighbours visited in ordinal order.
    fn community_hint(&self, cooccurrence: &BTreeMap<(String, String), usize>) -> CommunityHint {
        let mut adjacency: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        let mut edge_count = 0usize;
        for ((left, right), count) in cooccurrence {
            if *count >= self.options.community_edge_threshold {
                adjacency.entry(left).or_default().insert(right);
                adjacency.entry(right).or_default().insert(left);
                edge_count += 1;
            }
        }

        let node_count = adjacency.len();
        let mut visited: BTreeSet<&str> = BTreeSet::new();
        let mut components: Vec<BTreeSet<&str>> = Vec::new();

        for &start in adjacency.keys() {
            if visited.contains(start) {
                continue;
            }
            let mut component = BTreeSet::new();
            let mut queue = VecDeque::from([start]);
            visited.insert(start);
            while let Some(node) = queue.pop_front() {
                component.insert(node);
                for &neighbour in &adjacency[node] {
                    if visited.insert(neighbour) {
                        queue.push_back(neighbour);
                    }
                }
            }
            components.push(component);
        }

        let community_count = components.len();
        let modularity_hint = if node_count == 0 {
            0.0
        } else {
            (community_count as f64 / node_count as f64)
                * (edge_count as f64 / edge_count.max(1) as f64)
        };

        let previews = components
            .iter()
            .map(|component| {
                component
                    .iter()
                    .take(self.options.community_preview_size)
                    .map(|tag| (*tag).to_string())
                    .collect()
            })
            .collect();

        CommunityHint {
            community_count,
            modularity_hint,
            previews,
        }
    }

    /// M10: fraction of redundant samples under the provided grouping keys.
    fn near_duplicate_rate(&self, sample_count: usize) -> NearDuplicateRateHook {
        let keys = match &self.options.duplicate_group_keys {
            None => {
                return NearDuplicateRateHook {
                    rate: None,
                    note: "No grouping keys provided; rate not computed.".to_string(),
                }
            }
            Some(keys) => keys,
        };
        if keys.len() != sample_count {
            return NearDuplicateRateHook {
                rate: None,
                note: "Grouping key count does not match sample count; rate not computed."
                    .to_string(),
            };
        }

        let mut occurrences: BTreeMap<&str, usize> = BTreeMap::new();
        for key in keys.iter().flatten() {
            if !key.is_empty() {
                *occurrences.entry(key.as_str()).or_insert(0) += 1;
            }
        }
        let redundant: usize = occurrences
            .values()
            .filter(|count| **count >= 2)
            .map(|count| count - 1)
            .sum();
        let rate = if sample_count == 0 {
            0.0
        } else {
            redundant as f64 / sample_count as f64
        };

        NearDuplicateRateHook {
            rate: Some(rate),
            note: "Computed from provided grouping keys.".to_string(),
        }
    }

    /// M11: fraction of tokens longer than the configured maximum.
    fn overflow_rate(&self, samples: &[Vec<String>], token_count: usize) -> f64 {
        if token_count == 0 || self.options.max_token_length == 0 {
            return 0.0;
        }
        let overflowing = samples
            .iter()
            .flatten()
            .filter(|token| token.chars().count() > self.options.max_token_length)
            .count();
        overflowing as f64 / token_count as f64
    }
}

impl Default for MetricsEvaluator {
    fn default() -> Self {
        Self::new(MetricsOptions::default())
    }
}

/// M1: Shannon entropy in nats. Zero for an empty distribution.
fn entropy_nats(probabilities: &[(&str, f64)]) -> f64 {
    -probabilities
        .iter()
        .filter(|(_, p)| *p > 0.0)
        .map(|(_, p)| p * p.ln())
        .sum::<f64>()
}

/// M3: Gini over the ascending-sorted probability vector.
fn gini_coefficient(probabilities: &[(&str, f64)]) -> f64 {
    let n = probabilities.len();
    if n == 0 {
        return 0.0;
    }
    let mut sorted: Vec<f64> = probabilities.iter().map(|(_, p)| *p).collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let mut cumulative = 0.0;
    let mut cumulative_sum = 0.0;
    for p in sorted {
        cumulative += p;
        cumulative_sum += cumulative;
    }
    (n as f64 + 1.0 - 2.0 * cumulative_sum) / n as f64
}

/// Number of samples containing each tag.
fn document_frequencies(samples: &[Vec<String>]) -> BTreeMap<&str, usize> {
    let mut df: BTreeMap<&str, usize> = BTreeMap::new();
    for bag in samples {
        let unique: BTreeSet<&str> = bag.iter().map(String::as_str).collect();
        for tag in unique {
            *df.entry(tag).or_insert(0) += 1;
        }
    }
    df
}

/// Unordered-pair co-occurrence counts. Tokens are deduplicated per sample
/// and pairs stored ordinally (left < right).
fn pair_cooccurrences(samples: &[Vec<String>]) -> BTreeMap<(String, String), usize> {
    let mut cooccurrence: BTreeMap<(String, String), usize> = BTreeMap::new();
    for bag in samples {
        let unique: Vec<&str> = {
            let set: BTreeSet<&str> = bag.iter().map(String::as_str).collect();
            set.into_iter().collect()
        };
        for i in 0..unique.len() {
            for j in (i + 1)..unique.len() {
                *cooccurrence
                    .entry((unique[i].to_string(), unique[j].to_string()))
                    .or_insert(0) += 1;
            }
        }
    }
    cooccurrence
}
