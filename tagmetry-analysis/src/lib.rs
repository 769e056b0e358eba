//! tagmetry-analysis - dataset analysis engine
//!
//! Scans an image-plus-caption dataset, normalizes tags, computes tag-health
//! metrics, evaluates a recommendation ruleset, and detects exact/near
//! duplicate images. The whole job runs through [`run_analysis`]; everything
//! else is exposed for integration testing and embedding.

pub mod models;
pub mod pipeline;
pub mod report;
pub mod services;

pub use pipeline::run_analysis;
