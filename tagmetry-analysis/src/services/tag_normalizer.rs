//! Deterministic tag normalization
//!
//! Every token passes through the same four steps in order: case fold,
//! delimiter normalization, alias mapping, stop-tag filtering. Each step
//! appends one audit event, so every token result carries exactly four.

use crate::models::{
    AuditEvent, NormalizationResult, NormalizationStep, TagNormalizationRules, TokenResult,
};

/// Tag normalizer service
pub struct TagNormalizer {
    rules: TagNormalizationRules,
}

impl TagNormalizer {
    /// Create a normalizer over pre-loaded rules.
    pub fn new(rules: TagNormalizationRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &TagNormalizationRules {
        &self.rules
    }

    /// Normalize a token sequence. Empty tokens are tolerated; they flow
    /// through the steps like any other value.
    pub fn normalize<S: AsRef<str>>(&self, tokens: &[S]) -> NormalizationResult {
        let results: Vec<TokenResult> = tokens
            .iter()
            .map(|token| self.normalize_token(token.as_ref()))
            .collect();

        let normalized_tokens = results
            .iter()
            .filter_map(|r| r.normalized.clone())
            .collect();

        NormalizationResult {
            tokens: results,
            normalized_tokens,
        }
    }

    /// Run one token through the full step sequence.
    pub fn normalize_token(&self, original: &str) -> TokenResult {
        let mut trail = Vec::with_capacity(4);

        // Step 1: CaseFold (invariant lowercase mapping)
        let folded = original.to_lowercase();
        trail.push(AuditEvent::transform(
            NormalizationStep::CaseFold,
            original.to_string(),
            folded.clone(),
        ));

        // Step 2: DelimiterNormalization (longest-first, fixed point,
        // collapse, trim)
        let delimited = self.rules.normalize_delimiters(&folded);
        trail.push(AuditEvent::transform(
            NormalizationStep::DelimiterNormalization,
            folded,
            delimited.clone(),
        ));

        // Step 3: AliasMapping (exact lookup against pre-normalized keys)
        let aliased = self
            .rules
            .aliases
            .get(&delimited)
            .cloned()
            .unwrap_or_else(|| delimited.clone());
        trail.push(AuditEvent::transform(
            NormalizationStep::AliasMapping,
            delimited,
            aliased.clone(),
        ));

        // Step 4: StopTagFiltering
        if self.rules.stop_tags.contains(&aliased) {
            trail.push(AuditEvent::filtered(aliased));
            TokenResult {
                original: original.to_string(),
                normalized: None,
                filtered: true,
                audit_trail: trail,
            }
        } else {
            trail.push(AuditEvent::transform(
                NormalizationStep::StopTagFiltering,
                aliased.clone(),
                aliased.clone(),
            ));
            TokenResult {
                original: original.to_string(),
                normalized: Some(aliased),
                filtered: false,
                audit_trail: trail,
            }
        }
    }
}

impl Default for TagNormalizer {
    fn default() -> Self {
        Self::new(TagNormalizationRules::default())
    }
}
