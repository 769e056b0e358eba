//! Tag normalization rules and audit-trail types

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tagmetry_common::{Error, Result};

/// The four normalization steps, always applied in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormalizationStep {
    CaseFold,
    DelimiterNormalization,
    AliasMapping,
    StopTagFiltering,
}

/// One audit entry: what a step saw and what it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub step: NormalizationStep,
    pub before: String,
    pub after: String,
    pub message: String,
}

impl AuditEvent {
    /// Event with the standard transform/no-change message.
    pub fn transform(step: NormalizationStep, before: String, after: String) -> Self {
        let message = if before == after {
            "No change.".to_string()
        } else {
            format!("Transformed '{}' to '{}'.", before, after)
        };
        Self {
            step,
            before,
            after,
            message,
        }
    }

    /// Stop-tag filtering event.
    pub fn filtered(value: String) -> Self {
        Self {
            step: NormalizationStep::StopTagFiltering,
            before: value.clone(),
            after: value,
            message: "Filtered by stop-tag rule.".to_string(),
        }
    }
}

/// Outcome for one input token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResult {
    pub original: String,
    /// Absent exactly when the token was filtered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized: Option<String>,
    pub filtered: bool,
    /// Always four events: CaseFold, DelimiterNormalization, AliasMapping,
    /// StopTagFiltering
    pub audit_trail: Vec<AuditEvent>,
}

/// Outcome for one token sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizationResult {
    pub tokens: Vec<TokenResult>,
    /// Non-filtered normalized tokens, in input order
    pub normalized_tokens: Vec<String>,
}

/// Declarative normalization configuration.
///
/// Alias keys/values and stop tags are themselves pushed through the
/// case-fold and delimiter steps at load time, so lookups during
/// normalization are exact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagNormalizationRules {
    pub canonical_delimiter: String,
    pub delimiters: Vec<String>,
    pub aliases: BTreeMap<String, String>,
    pub stop_tags: BTreeSet<String>,
}

impl Default for TagNormalizationRules {
    fn default() -> Self {
        Self {
            canonical_delimiter: " ".to_string(),
            delimiters: Vec::new(),
            aliases: BTreeMap::new(),
            stop_tags: BTreeSet::new(),
        }
    }
}

/// On-disk shape of the rules file; every field optional.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RulesFile {
    canonical_delimiter: Option<String>,
    delimiters: Option<Vec<String>>,
    aliases: Option<BTreeMap<String, String>>,
    stop_tags: Option<Vec<String>>,
}

impl TagNormalizationRules {
    /// Build rules from raw parts, pre-normalizing aliases and stop tags.
    pub fn new(
        canonical_delimiter: String,
        delimiters: Vec<String>,
        aliases: BTreeMap<String, String>,
        stop_tags: impl IntoIterator<Item = String>,
    ) -> Self {
        let base = Self {
            canonical_delimiter,
            delimiters,
            aliases: BTreeMap::new(),
            stop_tags: BTreeSet::new(),
        };
        let aliases = aliases
            .into_iter()
            .map(|(k, v)| (base.pre_normalize(&k), base.pre_normalize(&v)))
            .collect();
        let stop_tags = stop_tags
            .into_iter()
            .map(|t| base.pre_normalize(&t))
            .collect();
        Self {
            aliases,
            stop_tags,
            ..base
        }
    }

    /// Parse a JSON rules document. Missing fields take their defaults.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let file: RulesFile = serde_json::from_str(text)
            .map_err(|e| Error::InvalidConfig(format!("normalization rules: {}", e)))?;
        Ok(Self::new(
            file.canonical_delimiter.unwrap_or_else(|| " ".to_string()),
            file.delimiters.unwrap_or_default(),
            file.aliases.unwrap_or_default(),
            file.stop_tags.unwrap_or_default(),
        ))
    }

    /// Read and parse a JSON rules file.
    pub fn from_path(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Source delimiters ordered for replacement: descending length, then
    /// ordinal. Overlapping delimiters resolve the same way every run.
    pub fn ordered_delimiters(&self) -> Vec<&str> {
        let mut ordered: Vec<&str> = self.delimiters.iter().map(String::as_str).collect();
        ordered.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        ordered
    }

    /// Case-fold + delimiter-normalize, used for alias/stop pre-normalization
    /// and by the normalizer itself.
    pub fn pre_normalize(&self, token: &str) -> String {
        self.normalize_delimiters(&token.to_lowercase())
    }

    /// Replace source delimiters with the canonical one, run to fixed point,
    /// collapse canonical runs, trim.
    pub fn normalize_delimiters(&self, value: &str) -> String {
        let canonical = self.canonical_delimiter.as_str();
        let ordered = self.ordered_delimiters();

        let mut current = value.to_string();
        loop {
            let mut next = current.clone();
            for delimiter in &ordered {
                // A delimiter the canonical form contains would re-expand
                // forever; such configs are treated as already normalized.
                if delimiter.is_empty()
                    || *delimiter == canonical
                    || canonical.contains(*delimiter)
                {
                    continue;
                }
                next = next.replace(delimiter, canonical);
            }
            if next == current {
                break;
            }
            current = next;
        }

        if canonical.is_empty() {
            return current.trim().to_string();
        }

        // Collapse runs of the canonical delimiter to a single occurrence.
        let doubled = format!("{}{}", canonical, canonical);
        while current.contains(&doubled) {
            current = current.replace(&doubled, canonical);
        }

        // Trim canonical delimiters and whitespace from both ends.
        let mut trimmed = current.trim();
        loop {
            let mut changed = false;
            if let Some(rest) = trimmed.strip_prefix(canonical) {
                trimmed = rest;
                changed = true;
            }
            if let Some(rest) = trimmed.strip_suffix(canonical) {
                trimmed = rest;
                changed = true;
            }
            let whitespace_trimmed = trimmed.trim();
            if whitespace_trimmed.len() != trimmed.len() {
                trimmed = whitespace_trimmed;
                changed = true;
            }
            if !changed {
                break;
            }
        }
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules() {
        let rules = TagNormalizationRules::default();
        assert_eq!(rules.canonical_delimiter, " ");
        assert!(rules.delimiters.is_empty());
        assert!(rules.aliases.is_empty());
        assert!(rules.stop_tags.is_empty());
    }

    #[test]
    fn test_ordered_delimiters_longest_first_then_ordinal() {
        let rules = TagNormalizationRules::new(
            " ".to_string(),
            vec!["_".into(), "--".into(), "-".into(), "/".into()],
            BTreeMap::new(),
            Vec::new(),
        );
        assert_eq!(rules.ordered_delimiters(), vec!["--", "-", "/", "_"]);
    }

    #[test]
    fn test_delimiter_fixed_point_and_collapse() {
        let rules = TagNormalizationRules::new(
            "-".to_string(),
            vec!["--".into(), "_".into()],
            BTreeMap::new(),
            Vec::new(),
        );
        assert_eq!(rules.normalize_delimiters("a----b"), "a-b");
        assert_eq!(rules.normalize_delimiters("a__b"), "a-b");
        assert_eq!(rules.normalize_delimiters("-a-b-"), "a-b");
    }

    #[test]
    fn test_aliases_and_stop_tags_are_pre_normalized() {
        let rules = TagNormalizationRules::new(
            " ".to_string(),
            vec!["_".into()],
            BTreeMap::from([("SCI_FI".to_string(), "Science_Fiction".to_string())]),
            vec!["Discard_Me".to_string()],
        );
        assert_eq!(
            rules.aliases.get("sci fi").map(String::as_str),
            Some("science fiction")
        );
        assert!(rules.stop_tags.contains("discard me"));
    }

    #[test]
    fn test_from_json_str_defaults() {
        let rules = TagNormalizationRules::from_json_str("{}").unwrap();
        assert_eq!(rules, TagNormalizationRules::default());

        let rules = TagNormalizationRules::from_json_str(
            r#"{"canonicalDelimiter":"-","delimiters":["_"],"stopTags":["meta"]}"#,
        )
        .unwrap();
        assert_eq!(rules.canonical_delimiter, "-");
        assert!(rules.stop_tags.contains("meta"));
    }

    #[test]
    fn test_from_json_str_rejects_malformed() {
        let err = TagNormalizationRules::from_json_str("not json").unwrap_err();
        assert_eq!(err.kind(), "InvalidConfig");
    }

    #[test]
    fn test_audit_event_messages() {
        let unchanged =
            AuditEvent::transform(NormalizationStep::CaseFold, "cat".into(), "cat".into());
        assert_eq!(unchanged.message, "No change.");

        let changed =
            AuditEvent::transform(NormalizationStep::CaseFold, "CAT".into(), "cat".into());
        assert_eq!(changed.message, "Transformed 'CAT' to 'cat'.");

        let filtered = AuditEvent::filtered("meta".into());
        assert_eq!(filtered.message, "Filtered by stop-tag rule.");
        assert_eq!(filtered.step, NormalizationStep::StopTagFiltering);
    }
}
