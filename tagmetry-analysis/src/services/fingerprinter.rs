//! Image fingerprinting
//!
//! Produces the two fingerprints duplicate detection needs: a SHA-256 of the
//! file bytes and a 64-bit perceptual hash built from the 2D type-II DCT of
//! a 32x32 grayscale thumbnail. Perceptually similar images land within a
//! small Hamming distance of each other.

use crate::models::ImageFingerprint;
use image::imageops::FilterType;
use image::DynamicImage;
use sha2::{Digest, Sha256};
use std::path::Path;
use tagmetry_common::{Error, Result};

const DCT_SIZE: usize = 32;
const BLOCK_SIZE: usize = 8;

/// Image fingerprinter service
pub struct Fingerprinter;

impl Fingerprinter {
    pub fn new() -> Self {
        Self
    }

    /// Fingerprint one image file.
    ///
    /// The file is read once; both the SHA-256 and the decoded pixels come
    /// from the same byte buffer.
    pub fn fingerprint_file(&self, path: &Path, relative_path: &str) -> Result<ImageFingerprint> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::ImageFileMissing(path.to_path_buf()))
            }
            Err(e) => return Err(Error::Io(e)),
        };

        let sha256 = format!("{:x}", Sha256::digest(&bytes));

        let decoded = image::load_from_memory(&bytes)
            .map_err(|e| Error::UnsupportedImageFormat(format!("{}: {}", relative_path, e)))?;
        let perceptual_hash = self.perceptual_hash(&decoded);

        Ok(ImageFingerprint {
            relative_path: relative_path.to_string(),
            sha256,
            perceptual_hash,
        })
    }

    /// 64-bit DCT perceptual hash.
    ///
    /// Pipeline: bicubic 32x32 resize with stretching, grayscale, orthonormal
    /// 2D type-II DCT, 8x8 low-frequency block. Bits follow a row-major scan
    /// of the block; the DC bit stays zero and every other bit is set when
    /// its coefficient exceeds the median of the 63 AC values.
    pub fn perceptual_hash(&self, image: &DynamicImage) -> u64 {
        let thumbnail = image
            .resize_exact(DCT_SIZE as u32, DCT_SIZE as u32, FilterType::CatmullRom)
            .to_luma8();

        let mut matrix = [[0.0f64; DCT_SIZE]; DCT_SIZE];
        for (x, y, pixel) in thumbnail.enumerate_pixels() {
            matrix[y as usize][x as usize] = pixel[0] as f64;
        }

        let coefficients = dct_2d(&matrix);

        // Median of the 63 AC values of the 8x8 block.
        let mut ac_values = Vec::with_capacity(BLOCK_SIZE * BLOCK_SIZE - 1);
        for row in 0..BLOCK_SIZE {
            for col in 0..BLOCK_SIZE {
                if row == 0 && col == 0 {
                    continue;
                }
                ac_values.push(coefficients[row][col]);
            }
        }
        ac_values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let median = ac_values[ac_values.len() / 2];

        let mut hash = 0u64;
        for bit in 1..64 {
            let row = bit / BLOCK_SIZE;
            let col = bit % BLOCK_SIZE;
            if coefficients[row][col] > median {
                hash |= 1u64 << bit;
            }
        }
        hash
    }
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self::new()
    }
}

/// Separable 2D type-II DCT with orthonormal scaling:
/// alpha(0) = sqrt(1/N), alpha(u>0) = sqrt(2/N).
fn dct_2d(input: &[[f64; DCT_SIZE]; DCT_SIZE]) -> [[f64; DCT_SIZE]; DCT_SIZE] {
    let n = DCT_SIZE;
    let mut cosines = [[0.0f64; DCT_SIZE]; DCT_SIZE];
    for (u, row) in cosines.iter_mut().enumerate() {
        for (x, value) in row.iter_mut().enumerate() {
            *value =
                (std::f64::consts::PI * (2 * x + 1) as f64 * u as f64 / (2 * n) as f64).cos();
        }
    }
    let alpha = |u: usize| {
        if u == 0 {
            (1.0 / n as f64).sqrt()
        } else {
            (2.0 / n as f64).sqrt()
        }
    };

    // Rows, then columns.
    let mut rows = [[0.0f64; DCT_SIZE]; DCT_SIZE];
    for y in 0..n {
        for v in 0..n {
            let mut sum = 0.0;
            for x in 0..n {
                sum += input[y][x] * cosines[v][x];
            }
            rows[y][v] = alpha(v) * sum;
        }
    }

    let mut output = [[0.0f64; DCT_SIZE]; DCT_SIZE];
    for u in 0..n {
        for v in 0..n {
            let mut sum = 0.0;
            for y in 0..n {
                sum += rows[y][v] * cosines[u][y];
            }
            output[u][v] = alpha(u) * sum;
        }
    }
    output
}
