//! Content and perceptual fingerprints for image files.

use anyhow::anyhow;
use md5::{Digest, Md5};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{IndexError, Result};

/// Bit width of the perceptual hash (8x8 DCT hash, 16 hex chars).
pub const PHASH_BITS: u32 = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprints {
    /// MD5 of the raw file bytes, 32 hex chars.
    pub content_hash: String,
    /// 64-bit DCT perceptual hash, 16 hex chars.
    pub perceptual_hash: String,
}

/// Compute both fingerprints for an image file.
///
/// The file is digested in fixed-size chunks so peak memory stays bounded
/// for large files; the decoded pixel buffer lives only inside
/// `perceptual_hash` and is dropped on return.
pub fn extract_fingerprints(path: &Path) -> Result<Fingerprints> {
    let content_hash = content_hash(path).map_err(|e| IndexError::FeatureExtraction {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let perceptual_hash = perceptual_hash(path).map_err(|e| IndexError::FeatureExtraction {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    Ok(Fingerprints {
        content_hash,
        perceptual_hash,
    })
}

fn content_hash(path: &Path) -> anyhow::Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let mut hasher = Md5::new();
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

fn perceptual_hash(path: &Path) -> anyhow::Result<String> {
    use img_hash::{HashAlg, HasherConfig};

    let img = image::open(path)?;

    // Small thumbnail first; the hasher only needs coarse structure and
    // this keeps decode output of large photos out of the hash step.
    let thumbnail = img.thumbnail(64, 64);

    // 8x8 mean hash over a DCT low-pass, i.e. the standard phash.
    let hasher = HasherConfig::new()
        .hash_alg(HashAlg::Mean)
        .preproc_dct()
        .hash_size(8, 8)
        .to_hasher();

    let rgba = thumbnail.to_rgba8();
    let (width, height) = rgba.dimensions();

    let img_hash_image = img_hash::image::RgbaImage::from_raw(width, height, rgba.into_raw())
        .ok_or_else(|| anyhow!("Failed to create image for hashing"))?;

    let hash = hasher.hash_image(&img_hash::image::DynamicImage::ImageRgba8(img_hash_image));

    Ok(hash
        .as_bytes()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect())
}

/// Bit-level hamming distance between two hex-rendered fingerprints.
///
/// Fingerprints of unequal length are maximally dissimilar: the distance
/// equals the query's total bit length. Never fails; a malformed hex char
/// counts as a full nibble mismatch unless both sides agree exactly.
pub fn hamming_distance(query: &str, stored: &str) -> u32 {
    let bits = bit_length(query);
    if query.len() != stored.len() {
        return bits;
    }

    query
        .chars()
        .zip(stored.chars())
        .map(|(a, b)| match (a.to_digit(16), b.to_digit(16)) {
            (Some(x), Some(y)) => (x ^ y).count_ones(),
            _ => {
                if a == b {
                    0
                } else {
                    4
                }
            }
        })
        .sum()
}

/// Total bit width of a hex-rendered fingerprint.
pub fn bit_length(fingerprint: &str) -> u32 {
    fingerprint.len() as u32 * 4
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn write_test_png(dir: &TempDir, name: &str, seed: u8) -> std::path::PathBuf {
        let mut img = RgbImage::new(32, 32);
        for (x, y, px) in img.enumerate_pixels_mut() {
            *px = Rgb([
                (x as u8).wrapping_mul(seed),
                (y as u8).wrapping_add(seed),
                seed,
            ]);
        }
        let path = dir.path().join(name);
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn fingerprints_have_expected_width() {
        let dir = TempDir::new().unwrap();
        let path = write_test_png(&dir, "a.png", 3);
        let fp = extract_fingerprints(&path).unwrap();
        assert_eq!(fp.content_hash.len(), 32);
        assert_eq!(fp.perceptual_hash.len(), 16);
        assert_eq!(bit_length(&fp.perceptual_hash), PHASH_BITS);
    }

    #[test]
    fn extraction_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let path = write_test_png(&dir, "a.png", 7);
        let first = extract_fingerprints(&path).unwrap();
        let second = extract_fingerprints(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn missing_file_is_an_extraction_error() {
        let err = extract_fingerprints(Path::new("/nonexistent/img.png")).unwrap_err();
        assert!(matches!(
            err,
            crate::error::IndexError::FeatureExtraction { .. }
        ));
    }

    #[test]
    fn non_image_file_is_an_extraction_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("not_an_image.png");
        std::fs::write(&path, b"plain text").unwrap();
        assert!(extract_fingerprints(&path).is_err());
    }

    #[test]
    fn hamming_is_zero_iff_equal() {
        assert_eq!(hamming_distance("abcd1234abcd1234", "abcd1234abcd1234"), 0);
        assert!(hamming_distance("abcd1234abcd1234", "abcd1234abcd1235") > 0);
    }

    #[test]
    fn hamming_is_symmetric() {
        let a = "00ff00ff00ff00ff";
        let b = "0f0f0f0f0f0f0f0f";
        assert_eq!(hamming_distance(a, b), hamming_distance(b, a));
    }

    #[test]
    fn hamming_counts_bits() {
        // 0x0 vs 0xf differs in 4 bits per nibble.
        assert_eq!(hamming_distance("0000", "ffff"), 16);
        assert_eq!(hamming_distance("0", "1"), 1);
        assert_eq!(hamming_distance("0", "3"), 2);
    }

    #[test]
    fn unequal_lengths_are_maximally_dissimilar() {
        assert_eq!(
            hamming_distance("abcd1234abcd1234", "abcd"),
            PHASH_BITS
        );
        assert_eq!(hamming_distance("abcd", "abcd1234abcd1234"), 16);
    }
}
