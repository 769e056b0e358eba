//! Recommendation ruleset and evaluation types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rule severity, rendered as its exact variant name in JSON.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Critical,
}

/// Comparison operators for rule conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOperator {
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Equal,
    NotEqual,
}

impl ComparisonOperator {
    /// Apply the operator. Equality uses absolute tolerance 1e-12.
    pub fn apply(&self, actual: f64, expected: f64) -> bool {
        const EPSILON: f64 = 1e-12;
        match self {
            ComparisonOperator::GreaterThan => actual > expected,
            ComparisonOperator::GreaterThanOrEqual => actual >= expected,
            ComparisonOperator::LessThan => actual < expected,
            ComparisonOperator::LessThanOrEqual => actual <= expected,
            ComparisonOperator::Equal => (actual - expected).abs() <= EPSILON,
            ComparisonOperator::NotEqual => (actual - expected).abs() > EPSILON,
        }
    }

    /// Phrase used in condition explanations.
    pub fn phrase(&self) -> &'static str {
        match self {
            ComparisonOperator::GreaterThan => ">",
            ComparisonOperator::GreaterThanOrEqual => ">=",
            ComparisonOperator::LessThan => "<",
            ComparisonOperator::LessThanOrEqual => "<=",
            ComparisonOperator::Equal => "==",
            ComparisonOperator::NotEqual => "!=",
        }
    }
}

/// One `(signal, operator, value)` conjunct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    pub signal: String,
    pub operator: ComparisonOperator,
    pub value: f64,
}

/// One loaded recommendation rule.
///
/// Parsed leniently: unknown properties are ignored and missing list fields
/// default to empty. Rules without an id are dropped by the loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationRule {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub conditions: Vec<RuleCondition>,
    #[serde(default)]
    pub likely_failure_modes: Vec<String>,
    #[serde(default)]
    pub actions: Vec<String>,
}

/// How one condition evaluated against the metrics report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionEvaluation {
    pub signal: String,
    pub operator: ComparisonOperator,
    pub expected: f64,
    /// Resolved signal value; absent when the signal was not found
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<f64>,
    pub matched: bool,
    pub explanation: String,
}

/// A rule whose conditions all matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationMatch {
    pub rule_id: String,
    pub severity: Severity,
    pub conditions: Vec<ConditionEvaluation>,
    pub likely_failure_modes: Vec<String>,
    pub actions: Vec<String>,
    pub description: String,
}

/// Full evaluation written to `recommendations.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationEvaluation {
    pub rules_evaluated: usize,
    pub matches: Vec<RecommendationMatch>,
    pub generated_at_utc: DateTime<Utc>,
}
