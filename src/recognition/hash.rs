//! 64-bit average hash.
//!
//! The region is converted to grayscale, resized to 8x8 and thresholded
//! against its own mean. Because of the fixed 8x8 grid the hash ignores
//! uniform scaling, but colour shifts and occlusion flip individual bits.

use image::imageops::{self, FilterType};
use image::RgbaImage;
use std::fmt;
use std::str::FromStr;

use crate::capture::Rect;

/// Side length of the downsampled grid.
const HASH_SIDE: u32 = 8;

/// Number of bits in a hash.
pub const HASH_BITS: u32 = HASH_SIDE * HASH_SIDE;

/// Average hash packed into a `u64`. The first (top-left) sample is the most
/// significant bit, so the `Display` form reads in row-major order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ImageHash(pub u64);

impl ImageHash {
    /// Number of differing bits.
    pub fn distance(&self, other: &ImageHash) -> u32 {
        (self.0 ^ other.0).count_ones()
    }
}

impl fmt::Display for ImageHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:064b}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseHashError(pub String);

impl fmt::Display for ParseHashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid hash string: {}", self.0)
    }
}

impl std::error::Error for ParseHashError {}

impl FromStr for ImageHash {
    type Err = ParseHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != HASH_BITS as usize || !s.bytes().all(|b| b == b'0' || b == b'1') {
            return Err(ParseHashError(format!(
                "expected {} characters of 0/1, got {:?}",
                HASH_BITS, s
            )));
        }
        u64::from_str_radix(s, 2)
            .map(ImageHash)
            .map_err(|e| ParseHashError(e.to_string()))
    }
}

/// Crops `roi` out of `img`, or returns `None` if it is empty or not fully inside.
pub fn crop_roi(img: &RgbaImage, roi: Rect) -> Option<RgbaImage> {
    if !roi.fits_within(img.width(), img.height()) {
        return None;
    }
    Some(imageops::crop_imm(img, roi.x, roi.y, roi.width, roi.height).to_image())
}

/// Computes the average hash of `img`, restricted to `roi` when given.
///
/// Returns `None` for an empty image or an ROI that does not fit; callers
/// treat that as "no match possible".
pub fn average_hash(img: &RgbaImage, roi: Option<Rect>) -> Option<ImageHash> {
    let region = match roi {
        Some(roi) => crop_roi(img, roi)?,
        None => {
            if img.width() == 0 || img.height() == 0 {
                return None;
            }
            img.clone()
        }
    };

    let gray = imageops::grayscale(&region);
    let small = imageops::resize(&gray, HASH_SIDE, HASH_SIDE, FilterType::Triangle);

    let samples: Vec<u32> = small.pixels().map(|p| p[0] as u32).collect();
    let sum: u32 = samples.iter().sum();

    // sample >= mean  <=>  sample * 64 >= sum
    let bits = samples.iter().fold(0u64, |acc, &v| {
        let bit = (v * HASH_BITS >= sum) as u64;
        (acc << 1) | bit
    });

    Some(ImageHash(bits))
}
