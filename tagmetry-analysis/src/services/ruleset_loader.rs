//! Recommendation ruleset loader
//!
//! Parses `{"rules": [...]}` envelopes from JSON or YAML. Parsing is lenient
//! per rule: unknown properties are ignored, rules that fail to deserialize
//! (unknown operator, wrong value type) are skipped silently, and rules with
//! a missing or blank id are dropped. Only an unreadable envelope is an
//! error.

use crate::models::RecommendationRule;
use std::path::Path;
use tagmetry_common::{Error, Result};

/// Ruleset loader service
pub struct RulesetLoader;

impl RulesetLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a ruleset file, choosing the format by extension (`.yaml`/`.yml`
    /// parse as YAML, anything else as JSON first with a YAML fallback).
    pub fn load_from_path(&self, path: &Path) -> Result<Vec<RecommendationRule>> {
        let text = std::fs::read_to_string(path)?;
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "yaml" | "yml" => self.parse_yaml(&text),
            "json" => self.parse_json(&text),
            _ => self.parse_json(&text).or_else(|_| self.parse_yaml(&text)),
        }
    }

    /// Parse a JSON ruleset document.
    pub fn parse_json(&self, text: &str) -> Result<Vec<RecommendationRule>> {
        let envelope: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| Error::InvalidRuleset(format!("JSON parse failure: {}", e)))?;
        self.extract_rules(envelope)
    }

    /// Parse a YAML ruleset document with the same envelope shape.
    pub fn parse_yaml(&self, text: &str) -> Result<Vec<RecommendationRule>> {
        let envelope: serde_json::Value = serde_yaml::from_str(text)
            .map_err(|e| Error::InvalidRuleset(format!("YAML parse failure: {}", e)))?;
        self.extract_rules(envelope)
    }

    fn extract_rules(&self, envelope: serde_json::Value) -> Result<Vec<RecommendationRule>> {
        let raw_rules = envelope
            .get("rules")
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                Error::InvalidRuleset("expected an object with a 'rules' array".to_string())
            })?;

        let mut rules = Vec::with_capacity(raw_rules.len());
        for raw in raw_rules {
            match serde_json::from_value::<RecommendationRule>(raw.clone()) {
                Ok(rule) if rule.id.trim().is_empty() => {
                    tracing::debug!("Dropping rule with blank id");
                }
                Ok(rule) => rules.push(rule),
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping unparseable rule");
                }
            }
        }
        Ok(rules)
    }
}

impl Default for RulesetLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ComparisonOperator, Severity};
    use std::io::Write;

    const JSON_RULESET: &str = r#"{
        "rules": [
            {
                "id": "dup-pressure",
                "description": "Too many near duplicates",
                "severity": "Critical",
                "conditions": [
                    {"signal": "nearDuplicateRate", "operator": "GreaterThan", "value": 0.2},
                    {"signal": "topKMass:1", "operator": "GreaterThanOrEqual", "value": 0.3}
                ],
                "likelyFailureModes": ["memorization"],
                "actions": ["remove duplicate images"]
            },
            {
                "id": "",
                "conditions": [{"signal": "gini", "operator": "LessThan", "value": 1.0}]
            },
            {
                "id": "broken",
                "conditions": [{"signal": "gini", "operator": "Bogus", "value": 1.0}]
            }
        ]
    }"#;

    const YAML_RULESET: &str = "rules:\n  - id: dup-pressure\n    description: Too many near duplicates\n    severity: Critical\n    conditions:\n      - signal: nearDuplicateRate\n        operator: GreaterThan\n        value: 0.2\n      - signal: topKMass:1\n        operator: GreaterThanOrEqual\n        value: 0.3\n    likelyFailureModes:\n      - memorization\n    actions:\n      - remove duplicate images\n";

    #[test]
    fn test_json_parse_with_lenient_skips() {
        let rules = RulesetLoader::new().parse_json(JSON_RULESET).unwrap();
        // Blank id dropped, broken operator skipped.
        assert_eq!(rules.len(), 1);
        let rule = &rules[0];
        assert_eq!(rule.id, "dup-pressure");
        assert_eq!(rule.severity, Severity::Critical);
        assert_eq!(rule.conditions.len(), 2);
        assert_eq!(rule.conditions[0].operator, ComparisonOperator::GreaterThan);
        assert_eq!(rule.likely_failure_modes, vec!["memorization"]);
    }

    #[test]
    fn test_yaml_parses_identically_to_json() {
        let loader = RulesetLoader::new();
        let from_yaml = loader.parse_yaml(YAML_RULESET).unwrap();
        let from_json = loader.parse_json(JSON_RULESET).unwrap();
        assert_eq!(from_yaml, from_json);
    }

    #[test]
    fn test_envelope_failure_is_invalid_ruleset() {
        let loader = RulesetLoader::new();
        let err = loader.parse_json("[1, 2, 3]").unwrap_err();
        assert_eq!(err.kind(), "InvalidRuleset");
        let err = loader.parse_json("{\"notRules\": []}").unwrap_err();
        assert_eq!(err.kind(), "InvalidRuleset");
    }

    #[test]
    fn test_load_from_path_by_extension() {
        let mut json_file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        json_file.write_all(JSON_RULESET.as_bytes()).unwrap();
        json_file.flush().unwrap();

        let mut yaml_file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        yaml_file.write_all(YAML_RULESET.as_bytes()).unwrap();
        yaml_file.flush().unwrap();

        let loader = RulesetLoader::new();
        let from_json = loader.load_from_path(json_file.path()).unwrap();
        let from_yaml = loader.load_from_path(yaml_file.path()).unwrap();
        assert_eq!(from_json, from_yaml);
    }

    #[test]
    fn test_empty_rules_array_is_valid() {
        let rules = RulesetLoader::new().parse_json("{\"rules\": []}").unwrap();
        assert!(rules.is_empty());
    }

    #[test]
    fn test_unknown_envelope_properties_ignored() {
        let rules = RulesetLoader::new()
            .parse_json("{\"rules\": [], \"version\": 3, \"owner\": \"someone\"}")
            .unwrap();
        assert!(rules.is_empty());
    }
}
