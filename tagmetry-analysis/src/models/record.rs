//! Per-image record and dataset summary types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Caption text gathered from sidecar files, one slot per source.
///
/// A slot is `None` when no sidecar resolved or the file was empty after
/// whitespace normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionSources {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booru_tags: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style_tags: Option<String>,
}

/// Presence flags for each caption source, kept alongside the text so
/// downstream consumers can filter without string checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionPresence {
    pub booru_tags: bool,
    pub short_caption: bool,
    pub style_tags: bool,
}

/// One scanned image. Immutable after the scan stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    /// Path relative to the dataset root, always slash-separated
    pub relative_path: String,
    /// Pixel width; absent when the dimension probe failed transiently
    pub width: Option<u32>,
    /// Pixel height; absent when the dimension probe failed transiently
    pub height: Option<u32>,
    /// Lowercase hex, 32 chars
    pub md5: String,
    /// Lowercase hex, 64 chars
    pub sha256: String,
    pub caption_sources: CaptionSources,
    pub caption_presence: CaptionPresence,
}

impl ImageRecord {
    /// Pixel count, zero when dimensions are unknown.
    pub fn pixel_count(&self) -> u64 {
        match (self.width, self.height) {
            (Some(w), Some(h)) => w as u64 * h as u64,
            _ => 0,
        }
    }
}

/// Dataset-level totals written to `summary.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryIndex {
    /// Absolute dataset root
    pub dataset_path: String,
    /// Absolute path of the JSONL record stream
    pub records_path: String,
    /// Absolute path of this summary file
    pub summary_path: String,
    pub total_images: usize,
    pub with_booru_tags: usize,
    pub with_short_caption: usize,
    pub with_style_tags: usize,
    pub total_pixels: u64,
    /// Lowercase file extension -> image count
    pub extension_counts: BTreeMap<String, usize>,
}
