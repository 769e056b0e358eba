//! Value types for the analysis pipeline
//!
//! Everything here is a plain value: identity is by field content, ordering
//! rules are spelled out at the point each collection is built.

pub mod duplicates;
pub mod metrics;
pub mod normalization;
pub mod record;
pub mod recommendation;

pub use duplicates::{
    DuplicateOptions, DuplicateReport, ExactDuplicateGroup, ImageFingerprint, NearDuplicateBand,
    NearDuplicateFinding, NearDuplicateGroup,
};
pub use metrics::{
    CommunityHint, MetricsOptions, MetricsReport, NearDuplicateRateHook, PmiAnomaly,
    StopTagCandidate,
};
pub use normalization::{
    AuditEvent, NormalizationResult, NormalizationStep, TagNormalizationRules, TokenResult,
};
pub use record::{CaptionPresence, CaptionSources, ImageRecord, SummaryIndex};
pub use recommendation::{
    ComparisonOperator, ConditionEvaluation, RecommendationEvaluation, RecommendationMatch,
    RecommendationRule, RuleCondition, Severity,
};
