use std::fmt;

use serde::{Deserialize, Serialize};

use crate::frame::{PixelFrame, Region, Rgb};

const HASH_SEED: i64 = 17;
const HASH_MULTIPLIER: i64 = 31;

/// Parameters for signature extraction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Edge length of a square tile in pixels (16 gives a 10x9 grid, 8 gives 20x18).
    pub tile_size: usize,
    /// Sampling stride inside a tile.
    pub tile_sample_stride: usize,
    /// Sampling stride over the whole frame for frame signatures.
    pub frame_sample_stride: usize,
    /// Each channel is divided by this before hashing to absorb rendering noise.
    pub quantize_divisor: u8,
    /// Brightness below which a pixel counts as dark.
    pub dark_threshold: u8,
    /// Dark ratio at or above which a tile is flagged black.
    pub black_tile_ratio: f32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            tile_size: 16,
            tile_sample_stride: 4,
            frame_sample_stride: 8,
            quantize_divisor: 8,
            dark_threshold: 48,
            black_tile_ratio: 0.95,
        }
    }
}

/// Noise-tolerant hash of a tile's visual content.
///
/// Used as the key of the walkability store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileSignature(pub i64);

/// Coarse hash of a whole frame, used only to detect whether the screen changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameSignature(pub i64);

impl fmt::Display for TileSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for FrameSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl std::str::FromStr for TileSignature {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

fn fold(hash: i64, value: i64) -> i64 {
    hash.wrapping_mul(HASH_MULTIPLIER).wrapping_add(value)
}

fn fold_pixel(hash: i64, pixel: Rgb, divisor: u8) -> i64 {
    let divisor = divisor.max(1);
    let hash = fold(hash, i64::from(pixel.r / divisor));
    let hash = fold(hash, i64::from(pixel.g / divisor));
    fold(hash, i64::from(pixel.b / divisor))
}

/// Computes the signature of the pixels inside `region`.
///
/// Samples start half a stride into the region so that the sampled pixels
/// sit away from tile borders.
#[must_use]
pub fn region_signature(frame: &PixelFrame, region: Region, config: &ExtractionConfig) -> i64 {
    let stride = config.tile_sample_stride.max(1);
    let offset = stride / 2;
    let inner = Region::new(
        region.x + offset,
        region.y + offset,
        region.width.saturating_sub(offset),
        region.height.saturating_sub(offset),
    );
    frame
        .sample_region(inner, stride)
        .fold(HASH_SEED, |hash, p| fold_pixel(hash, p, config.quantize_divisor))
}

/// Computes the coarse frame signature.
#[must_use]
pub fn frame_signature(frame: &PixelFrame, config: &ExtractionConfig) -> FrameSignature {
    let stride = config.frame_sample_stride.max(1);
    let offset = stride / 2;
    let inner = Region::new(offset, offset, frame.width(), frame.height());
    let hash = frame
        .sample_region(inner, stride)
        .fold(HASH_SEED, |hash, p| fold_pixel(hash, p, config.quantize_divisor));
    FrameSignature(hash)
}

/// 64-bit average hash for tolerant near-duplicate matching.
///
/// Built by box-averaging the region down to 8x8, converting to grayscale and
/// setting one bit per cell that is brighter than the mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PerceptualHash(pub u64);

impl fmt::Display for PerceptualHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl PerceptualHash {
    const GRID: usize = 8;

    #[must_use]
    pub fn of_frame(frame: &PixelFrame) -> Self {
        Self::of_region(frame, frame.bounds())
    }

    #[must_use]
    pub fn of_region(frame: &PixelFrame, region: Region) -> Self {
        let region = region.clamp_to(frame.width(), frame.height());
        let mut cells = [0u32; Self::GRID * Self::GRID];
        for (i, cell) in cells.iter_mut().enumerate() {
            let (cx, cy) = (i % Self::GRID, i / Self::GRID);
            let x0 = cx * region.width / Self::GRID;
            let x1 = ((cx + 1) * region.width / Self::GRID).max(x0 + 1);
            let y0 = cy * region.height / Self::GRID;
            let y1 = ((cy + 1) * region.height / Self::GRID).max(y0 + 1);
            let cell_region = Region::new(region.x + x0, region.y + y0, x1 - x0, y1 - y0);
            let (sum, count) = frame
                .sample_region(cell_region, 1)
                .fold((0u32, 0u32), |(sum, count), p| (sum + u32::from(p.luma()), count + 1));
            *cell = if count == 0 { 0 } else { sum / count };
        }
        let mean = cells.iter().sum::<u32>() / 64;
        let bits = cells
            .iter()
            .enumerate()
            .filter(|&(_, v)| *v > mean)
            .fold(0u64, |bits, (i, _)| bits | (1 << i));
        Self(bits)
    }

    #[must_use]
    pub const fn hamming_distance(self, other: Self) -> u32 {
        (self.0 ^ other.0).count_ones()
    }

    #[must_use]
    pub const fn is_near_duplicate(self, other: Self, max_distance: u32) -> bool {
        self.hamming_distance(other) <= max_distance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(offset: usize) -> PixelFrame {
        PixelFrame::from_fn(160, 144, |x, y| {
            if ((x + offset) / 8 + y / 8) % 2 == 0 {
                Rgb::gray(200)
            } else {
                Rgb::gray(40)
            }
        })
    }

    #[test]
    fn test_identical_regions_share_signature() {
        let config = ExtractionConfig::default();
        let frame = checker(0);
        let a = region_signature(&frame, Region::new(0, 0, 16, 16), &config);
        let b = region_signature(&frame, Region::new(16, 16, 16, 16), &config);
        assert_eq!(a, b);
    }

    #[test]
    fn test_quantization_absorbs_small_noise() {
        let config = ExtractionConfig::default();
        let clean = PixelFrame::filled(16, 16, Rgb::new(80, 120, 160));
        let noisy = PixelFrame::filled(16, 16, Rgb::new(83, 121, 166));
        let region = Region::new(0, 0, 16, 16);
        assert_eq!(
            region_signature(&clean, region, &config),
            region_signature(&noisy, region, &config)
        );
    }

    #[test]
    fn test_distinct_content_differs() {
        let config = ExtractionConfig::default();
        let region = Region::new(0, 0, 16, 16);
        let light = PixelFrame::filled(16, 16, Rgb::gray(220));
        let dark = PixelFrame::filled(16, 16, Rgb::gray(20));
        assert_ne!(
            region_signature(&light, region, &config),
            region_signature(&dark, region, &config)
        );
    }

    #[test]
    fn test_frame_signature_detects_scroll() {
        let config = ExtractionConfig::default();
        assert_eq!(
            frame_signature(&checker(0), &config),
            frame_signature(&checker(0), &config)
        );
        assert_ne!(
            frame_signature(&checker(0), &config),
            frame_signature(&checker(8), &config)
        );
    }

    #[test]
    fn test_perceptual_hash_tolerates_noise() {
        let base = checker(0);
        let noisy = PixelFrame::from_fn(160, 144, |x, y| {
            let p = base.pixel(x, y);
            if x == 3 && y == 3 { Rgb::WHITE } else { p }
        });
        let a = PerceptualHash::of_frame(&base);
        let b = PerceptualHash::of_frame(&noisy);
        assert!(a.is_near_duplicate(b, 2));
        assert_ne!(a, PerceptualHash::of_frame(&checker(8)));
    }

    #[test]
    fn test_hamming_distance() {
        assert_eq!(PerceptualHash(0b1011).hamming_distance(PerceptualHash(0b0001)), 2);
    }

    #[test]
    fn test_tile_signature_parses_display_form() {
        let negative = TileSignature(-2);
        assert_eq!(negative.to_string().parse::<TileSignature>().unwrap(), negative);
        assert!("zz".parse::<TileSignature>().is_err());
    }
}
