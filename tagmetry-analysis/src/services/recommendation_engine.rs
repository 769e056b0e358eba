//! Rule-based recommendation engine
//!
//! A rule matches when every one of its `(signal, operator, value)`
//! conditions matches against the metrics report. Signals that cannot be
//! resolved make their condition (and therefore the rule) non-matching.

use crate::models::{
    ConditionEvaluation, MetricsReport, RecommendationEvaluation, RecommendationMatch,
    RecommendationRule, RuleCondition,
};

/// Recommendation engine service
pub struct RecommendationEngine;

impl RecommendationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate a ruleset against a metrics report. Rules run in ordinal id
    /// order so the output is deterministic.
    pub fn evaluate(
        &self,
        rules: &[RecommendationRule],
        report: &MetricsReport,
    ) -> RecommendationEvaluation {
        let mut ordered: Vec<&RecommendationRule> = rules.iter().collect();
        ordered.sort_by(|a, b| a.id.cmp(&b.id));

        let mut matches = Vec::new();
        for rule in &ordered {
            let conditions: Vec<ConditionEvaluation> = rule
                .conditions
                .iter()
                .map(|condition| self.evaluate_condition(condition, report))
                .collect();

            // Conjunction: every condition must match, and a rule with no
            // conditions asserts nothing worth recommending.
            if !conditions.is_empty() && conditions.iter().all(|c| c.matched) {
                tracing::debug!(rule_id = %rule.id, "Recommendation rule matched");
                matches.push(RecommendationMatch {
                    rule_id: rule.id.clone(),
                    severity: rule.severity,
                    conditions,
                    likely_failure_modes: rule.likely_failure_modes.clone(),
                    actions: rule.actions.clone(),
                    description: rule.description.clone(),
                });
            }
        }

        RecommendationEvaluation {
            rules_evaluated: ordered.len(),
            matches,
            generated_at_utc: report.generated_at_utc,
        }
    }

    /// Evaluate one condition, producing the full audit record.
    pub fn evaluate_condition(
        &self,
        condition: &RuleCondition,
        report: &MetricsReport,
    ) -> ConditionEvaluation {
        match resolve_signal(report, &condition.signal) {
            Some(actual) => {
                let matched = condition.operator.apply(actual, condition.value);
                ConditionEvaluation {
                    signal: condition.signal.clone(),
                    operator: condition.operator,
                    expected: condition.value,
                    actual: Some(actual),
                    matched,
                    explanation: format!(
                        "Signal '{}' = {}; condition {} {} is {}.",
                        condition.signal,
                        actual,
                        condition.operator.phrase(),
                        condition.value,
                        if matched { "met" } else { "not met" }
                    ),
                }
            }
            None => ConditionEvaluation {
                signal: condition.signal.clone(),
                operator: condition.operator,
                expected: condition.value,
                actual: None,
                matched: false,
                explanation: "Signal not found.".to_string(),
            },
        }
    }
}

impl Default for RecommendationEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve a signal name to a scalar from the metrics report.
///
/// `topKMass:<k>` looks up the requested-K table; absent K values, an
/// uncomputed JSD, or an uncomputed near-duplicate rate all resolve to
/// `None`.
pub fn resolve_signal(report: &MetricsReport, signal: &str) -> Option<f64> {
    if let Some(k_text) = signal.strip_prefix("topKMass:") {
        let k: u32 = k_text.parse().ok()?;
        return report.top_k_mass.get(&k).copied();
    }

    match signal {
        "sampleCount" => Some(report.sample_count as f64),
        "tokenCount" => Some(report.token_count as f64),
        "uniqueTagCount" => Some(report.unique_tag_count as f64),
        "entropy" => Some(report.entropy),
        "effectiveTagCount" => Some(report.effective_tag_count),
        "gini" => Some(report.gini),
        "hhi" => Some(report.hhi),
        "jsdToTarget" => report.jsd_to_target,
        "stopTagCandidatesCount" => Some(report.stop_tag_candidates.len() as f64),
        "pmiAnomaliesCount" => Some(report.pmi_anomalies.len() as f64),
        "communityCount" => Some(report.community_hint.community_count as f64),
        "modularityHint" => Some(report.community_hint.modularity_hint),
        "nearDuplicateRate" => report.near_duplicate_rate_hook.rate,
        "tokenLengthOverflowRate" => Some(report.token_length_overflow_rate),
        _ => None,
    }
}
