//! Dataset scanner
//!
//! Walks the dataset tree, selects image files by extension, probes pixel
//! dimensions from headers, streams each file once for MD5 + SHA-256, and
//! resolves sidecar captions. The enumeration order (ordinal byte comparison
//! of absolute paths) is the canonical order reused by every later stage.

use crate::models::{CaptionPresence, CaptionSources, ImageRecord, SummaryIndex};
use md5::Md5;
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tagmetry_common::{Error, Result};
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

/// Image extensions the scanner selects (case-insensitive).
const IMAGE_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "webp", "bmp", "gif", "tif", "tiff"];

/// Result of a dataset scan.
#[derive(Debug, Clone)]
pub struct ScanOutput {
    /// Records in canonical enumeration order
    pub records: Vec<ImageRecord>,
    pub summary: SummaryIndex,
    /// Per-image transient problems; the job keeps going past these
    pub warnings: Vec<String>,
}

/// Dataset scanner service
pub struct DatasetScanner;

impl DatasetScanner {
    pub fn new() -> Self {
        Self
    }

    /// Scan the dataset rooted at `root`.
    ///
    /// `records_path` / `summary_path` are the artifact destinations recorded
    /// inside the summary index; writing them is the report writer's job.
    ///
    /// CPU and I/O heavy, so callers run this on a blocking thread. The
    /// cancellation token is checked at the start of every per-image
    /// iteration.
    pub fn scan(
        &self,
        root: &Path,
        records_path: &Path,
        summary_path: &Path,
        cancel_token: &CancellationToken,
    ) -> Result<ScanOutput> {
        if !root.is_dir() {
            return Err(Error::InputNotFound(root.to_path_buf()));
        }
        let root = root
            .canonicalize()
            .map_err(|_| Error::InputNotFound(root.to_path_buf()))?;

        let paths = self.enumerate(&root);
        tracing::info!(files = paths.len(), root = %root.display(), "Dataset enumeration completed");

        // Per-image work in parallel batches; results re-keyed by position so
        // the output keeps the canonical order.
        let batch_size = num_cpus::get().max(1) * 8;
        let mut records = Vec::with_capacity(paths.len());
        let mut warnings = Vec::new();

        for batch in paths.chunks(batch_size) {
            if cancel_token.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let batch_results: Vec<Result<(ImageRecord, Vec<String>)>> = batch
                .par_iter()
                .map(|path| {
                    if cancel_token.is_cancelled() {
                        return Err(Error::Cancelled);
                    }
                    self.process_image(&root, path)
                })
                .collect();

            for result in batch_results {
                let (record, mut image_warnings) = result?;
                warnings.append(&mut image_warnings);
                records.push(record);
            }
        }

        let summary = self.build_summary(&root, records_path, summary_path, &records);
        tracing::info!(
            total_images = summary.total_images,
            total_pixels = summary.total_pixels,
            warnings = warnings.len(),
            "Dataset scan completed"
        );

        Ok(ScanOutput {
            records,
            summary,
            warnings,
        })
    }

    /// Enumerate image files beneath `root` in canonical order: ordinal byte
    /// comparison of absolute paths.
    fn enumerate(&self, root: &Path) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    let path = entry.into_path();
                    if self.is_image_extension(&path) {
                        Some(path)
                    } else {
                        None
                    }
                }
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!(error = %e, "Error accessing entry, skipping");
                    None
                }
            })
            .collect();

        paths.sort_by(|a, b| {
            a.as_os_str()
                .as_encoded_bytes()
                .cmp(b.as_os_str().as_encoded_bytes())
        });
        paths
    }

    fn is_image_extension(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| {
                let lower = ext.to_string_lossy().to_lowercase();
                IMAGE_EXTENSIONS.contains(&lower.as_str())
            })
            .unwrap_or(false)
    }

    /// Full per-image pipeline: header check, dimension probe, hashes,
    /// sidecars.
    fn process_image(&self, root: &Path, path: &Path) -> Result<(ImageRecord, Vec<String>)> {
        let relative_path = relative_slash_path(root, path);
        let mut warnings = Vec::new();

        // The extension matched; the header must identify as an image too.
        let mut header = [0u8; 32];
        let header_len = {
            let mut file = File::open(path)?;
            file.read(&mut header)?
        };
        if image::guess_format(&header[..header_len]).is_err() {
            return Err(Error::UnsupportedImageFormat(relative_path));
        }

        // Dimensions come from metadata only; a failure here is transient.
        let (width, height) = match image::ImageReader::open(path)
            .map_err(image::ImageError::IoError)
            .and_then(|reader| reader.with_guessed_format().map_err(image::ImageError::IoError))
            .and_then(|reader| reader.into_dimensions())
        {
            Ok((w, h)) => (Some(w), Some(h)),
            Err(e) => {
                warnings.push(format!(
                    "Could not read dimensions of '{}': {}",
                    relative_path, e
                ));
                (None, None)
            }
        };

        // One streaming pass feeds both digests. A hash failure aborts the
        // job; duplicate detection cannot run with missing fingerprints.
        let (md5_hex, sha256_hex) = hash_file(path)?;

        let caption_sources = self.read_caption_sources(path, &mut warnings);
        let caption_presence = CaptionPresence {
            booru_tags: caption_sources.booru_tags.is_some(),
            short_caption: caption_sources.short_caption.is_some(),
            style_tags: caption_sources.style_tags.is_some(),
        };

        Ok((
            ImageRecord {
                relative_path,
                width,
                height,
                md5: md5_hex,
                sha256: sha256_hex,
                caption_sources,
                caption_presence,
            },
            warnings,
        ))
    }

    /// Resolve sidecars by base name in the image's directory.
    fn read_caption_sources(&self, image_path: &Path, warnings: &mut Vec<String>) -> CaptionSources {
        let dir = image_path.parent().unwrap_or_else(|| Path::new(""));
        let base = image_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut read = |suffixes: &[&str]| -> Option<String> {
            for suffix in suffixes {
                let candidate = dir.join(format!("{}.{}", base, suffix));
                match std::fs::read_to_string(&candidate) {
                    Ok(text) => {
                        let collapsed = collapse_whitespace(&text);
                        return if collapsed.is_empty() {
                            None
                        } else {
                            Some(collapsed)
                        };
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(e) => {
                        warnings.push(format!(
                            "Could not read sidecar '{}': {}",
                            candidate.display(),
                            e
                        ));
                        return None;
                    }
                }
            }
            None
        };

        CaptionSources {
            booru_tags: read(&["booru.txt", "tags.txt"]),
            short_caption: read(&["caption.txt", "txt"]),
            style_tags: read(&["style.txt"]),
        }
    }

    fn build_summary(
        &self,
        root: &Path,
        records_path: &Path,
        summary_path: &Path,
        records: &[ImageRecord],
    ) -> SummaryIndex {
        let mut extension_counts = std::collections::BTreeMap::new();
        for record in records {
            let ext = Path::new(&record.relative_path)
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            *extension_counts.entry(ext).or_insert(0usize) += 1;
        }

        SummaryIndex {
            dataset_path: root.to_string_lossy().into_owned(),
            records_path: records_path.to_string_lossy().into_owned(),
            summary_path: summary_path.to_string_lossy().into_owned(),
            total_images: records.len(),
            with_booru_tags: records.iter().filter(|r| r.caption_presence.booru_tags).count(),
            with_short_caption: records
                .iter()
                .filter(|r| r.caption_presence.short_caption)
                .count(),
            with_style_tags: records.iter().filter(|r| r.caption_presence.style_tags).count(),
            total_pixels: records.iter().map(|r| r.pixel_count()).sum(),
            extension_counts,
        }
    }
}

impl Default for DatasetScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-sample tag bags: booru tags then style tags, comma-split and trimmed.
/// Short captions are prose and stay out of the tag stream.
pub fn extract_tag_bags(records: &[ImageRecord]) -> Vec<Vec<String>> {
    records
        .iter()
        .map(|record| {
            let mut bag = Vec::new();
            for source in [
                &record.caption_sources.booru_tags,
                &record.caption_sources.style_tags,
            ] {
                if let Some(text) = source {
                    bag.extend(
                        text.split(',')
                            .map(str::trim)
                            .filter(|t| !t.is_empty())
                            .map(String::from),
                    );
                }
            }
            bag
        })
        .collect()
}

/// Stream a file once, feeding MD5 and SHA-256 together. 1 MiB chunks.
fn hash_file(path: &Path) -> Result<(String, String)> {
    let mut file = File::open(path)?;
    let mut md5 = Md5::new();
    let mut sha256 = Sha256::new();
    let mut buffer = vec![0u8; 1024 * 1024];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        md5.update(&buffer[..bytes_read]);
        sha256.update(&buffer[..bytes_read]);
    }

    Ok((
        format!("{:x}", md5.finalize()),
        format!("{:x}", sha256.finalize()),
    ))
}

/// Relative path with forward slashes on every platform.
fn relative_slash_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Collapse internal whitespace runs to single spaces and trim.
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_png(path: &Path, width: u32, height: u32, seed: u8) {
        let mut img = image::RgbImage::new(width, height);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            *pixel = image::Rgb([
                seed.wrapping_add(x as u8),
                seed.wrapping_add(y as u8),
                seed,
            ]);
        }
        img.save(path).unwrap();
    }

    fn scan(dir: &Path) -> ScanOutput {
        DatasetScanner::new()
            .scan(
                dir,
                &dir.join("out/dataset.jsonl"),
                &dir.join("out/summary.json"),
                &CancellationToken::new(),
            )
            .unwrap()
    }

    #[test]
    fn test_missing_root_is_input_not_found() {
        let result = DatasetScanner::new().scan(
            Path::new("/nonexistent/tagmetry"),
            Path::new("r.jsonl"),
            Path::new("s.json"),
            &CancellationToken::new(),
        );
        assert_eq!(result.unwrap_err().kind(), "InputNotFound");
    }

    #[test]
    fn test_empty_dataset() {
        let dir = TempDir::new().unwrap();
        let output = scan(dir.path());
        assert!(output.records.is_empty());
        assert_eq!(output.summary.total_images, 0);
        assert_eq!(output.summary.total_pixels, 0);
    }

    #[test]
    fn test_sidecar_resolution_and_ordering() {
        let dir = TempDir::new().unwrap();
        write_png(&dir.path().join("a.png"), 1, 1, 10);
        write_png(&dir.path().join("b.png"), 2, 3, 20);

        fs::write(dir.path().join("a.booru.txt"), "tag_one, tag two").unwrap();
        fs::write(dir.path().join("a.caption.txt"), "  short\ncaption ").unwrap();
        fs::write(dir.path().join("a.style.txt"), " painterly ").unwrap();
        fs::write(dir.path().join("b.tags.txt"), "legacy_tag_source").unwrap();
        fs::write(dir.path().join("b.txt"), "fallback caption").unwrap();

        let output = scan(dir.path());
        assert_eq!(output.records.len(), 2);
        assert_eq!(output.records[0].relative_path, "a.png");
        assert_eq!(output.records[1].relative_path, "b.png");

        let a = &output.records[0].caption_sources;
        assert_eq!(a.booru_tags.as_deref(), Some("tag_one, tag two"));
        assert_eq!(a.short_caption.as_deref(), Some("short caption"));
        assert_eq!(a.style_tags.as_deref(), Some("painterly"));

        let b = &output.records[1].caption_sources;
        assert_eq!(b.booru_tags.as_deref(), Some("legacy_tag_source"));
        assert_eq!(b.short_caption.as_deref(), Some("fallback caption"));
        assert_eq!(b.style_tags, None);

        assert_eq!(output.records[0].width, Some(1));
        assert_eq!(output.records[1].height, Some(3));

        let summary = &output.summary;
        assert_eq!(summary.total_images, 2);
        assert_eq!(summary.with_booru_tags, 2);
        assert_eq!(summary.with_short_caption, 2);
        assert_eq!(summary.with_style_tags, 1);
        assert_eq!(summary.total_pixels, 1 + 6);
        assert_eq!(summary.extension_counts.get("png"), Some(&2));
    }

    #[test]
    fn test_hashes_are_lowercase_hex() {
        let dir = TempDir::new().unwrap();
        write_png(&dir.path().join("a.png"), 4, 4, 1);

        let output = scan(dir.path());
        let record = &output.records[0];
        assert_eq!(record.md5.len(), 32);
        assert_eq!(record.sha256.len(), 64);
        assert!(record
            .md5
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert!(record
            .sha256
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_recognized_extension_bad_header_aborts() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("fake.png"), b"this is not an image at all").unwrap();

        let result = DatasetScanner::new().scan(
            dir.path(),
            Path::new("r.jsonl"),
            Path::new("s.json"),
            &CancellationToken::new(),
        );
        assert_eq!(result.unwrap_err().kind(), "UnsupportedImageFormat");
    }

    #[test]
    fn test_non_image_files_ignored() {
        let dir = TempDir::new().unwrap();
        write_png(&dir.path().join("a.png"), 1, 1, 1);
        fs::write(dir.path().join("notes.md"), "hello").unwrap();
        fs::write(dir.path().join("a.booru.txt"), "tag").unwrap();

        let output = scan(dir.path());
        assert_eq!(output.records.len(), 1);
    }

    #[test]
    fn test_cancellation_surfaces_cancelled() {
        let dir = TempDir::new().unwrap();
        write_png(&dir.path().join("a.png"), 1, 1, 1);

        let token = CancellationToken::new();
        token.cancel();
        let result = DatasetScanner::new().scan(
            dir.path(),
            Path::new("r.jsonl"),
            Path::new("s.json"),
            &token,
        );
        assert!(result.unwrap_err().is_cancelled());
    }

    #[test]
    fn test_extract_tag_bags_splits_booru_and_style() {
        let dir = TempDir::new().unwrap();
        write_png(&dir.path().join("a.png"), 1, 1, 1);
        fs::write(dir.path().join("a.booru.txt"), "cat, cute,, blue").unwrap();
        fs::write(dir.path().join("a.style.txt"), "painterly").unwrap();

        let output = scan(dir.path());
        let bags = extract_tag_bags(&output.records);
        assert_eq!(bags, vec![vec!["cat", "cute", "blue", "painterly"]]);
    }

    #[test]
    fn test_nested_paths_are_slash_normalized() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("set1/sub")).unwrap();
        write_png(&dir.path().join("set1/sub/deep.png"), 1, 1, 1);

        let output = scan(dir.path());
        assert_eq!(output.records[0].relative_path, "set1/sub/deep.png");
    }
}
