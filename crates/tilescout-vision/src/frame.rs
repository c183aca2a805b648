use std::path::Path;

use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Logical screen width of a captured frame, in pixels.
pub const SCREEN_WIDTH: usize = 160;
/// Logical screen height of a captured frame, in pixels.
pub const SCREEN_HEIGHT: usize = 144;

/// A single RGB pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Self = Self::new(0, 0, 0);
    pub const WHITE: Self = Self::new(255, 255, 255);

    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    #[must_use]
    pub const fn gray(v: u8) -> Self {
        Self::new(v, v, v)
    }

    /// Unweighted channel average in `0..=255`.
    #[must_use]
    pub fn brightness(self) -> u8 {
        let sum = u16::from(self.r) + u16::from(self.g) + u16::from(self.b);
        u8::try_from(sum / 3).unwrap_or(u8::MAX)
    }

    /// ITU-R BT.601 luma in `0..=255`.
    #[must_use]
    pub fn luma(self) -> u8 {
        let y = 299 * u32::from(self.r) + 587 * u32::from(self.g) + 114 * u32::from(self.b);
        u8::try_from(y / 1000).unwrap_or(u8::MAX)
    }

    #[must_use]
    pub fn is_dark(self, threshold: u8) -> bool {
        self.brightness() < threshold
    }

    #[must_use]
    pub fn is_bright(self, threshold: u8) -> bool {
        self.brightness() >= threshold
    }

    /// Returns `true` if every channel differs from `other` by at most `tolerance`.
    #[must_use]
    pub fn within_tolerance(self, other: Self, tolerance: u8) -> bool {
        self.r.abs_diff(other.r) <= tolerance
            && self.g.abs_diff(other.g) <= tolerance
            && self.b.abs_diff(other.b) <= tolerance
    }
}

/// Axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Region {
    #[must_use]
    pub const fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[must_use]
    pub const fn right(&self) -> usize {
        self.x + self.width
    }

    #[must_use]
    pub const fn bottom(&self) -> usize {
        self.y + self.height
    }

    /// Clips the region to a `width` x `height` frame.
    #[must_use]
    pub fn clamp_to(&self, width: usize, height: usize) -> Self {
        let x = self.x.min(width);
        let y = self.y.min(height);
        Self {
            x,
            y,
            width: self.right().min(width) - x,
            height: self.bottom().min(height) - y,
        }
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("pixel buffer has {actual} pixels, expected {width}x{height}")]
pub struct FrameSizeError {
    pub width: usize,
    pub height: usize,
    pub actual: usize,
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("failed to load image {path}: {source}")]
pub struct ImageLoadError {
    pub path: String,
    pub source: image::ImageError,
}

/// One captured screen: a row-major grid of RGB pixels.
///
/// Frames are immutable once built; every analysis step borrows them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelFrame {
    width: usize,
    height: usize,
    pixels: Vec<Rgb>,
}

impl PixelFrame {
    pub fn new(width: usize, height: usize, pixels: Vec<Rgb>) -> Result<Self, FrameSizeError> {
        if pixels.len() != width * height {
            return Err(FrameSizeError {
                width,
                height,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    #[must_use]
    pub fn filled(width: usize, height: usize, color: Rgb) -> Self {
        Self {
            width,
            height,
            pixels: vec![color; width * height],
        }
    }

    #[must_use]
    pub fn from_fn<F>(width: usize, height: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> Rgb,
    {
        let mut pixels = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    #[must_use]
    pub fn from_rgb_image(img: &RgbImage) -> Self {
        let width = img.width() as usize;
        let height = img.height() as usize;
        let pixels = img
            .pixels()
            .map(|p| Rgb::new(p.0[0], p.0[1], p.0[2]))
            .collect();
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn load_png<P>(path: P) -> Result<Self, ImageLoadError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let img = image::open(path).map_err(|source| ImageLoadError {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::from_rgb_image(&img.to_rgb8()))
    }

    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    #[must_use]
    pub fn bounds(&self) -> Region {
        Region::new(0, 0, self.width, self.height)
    }

    /// Returns the pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinate lies outside the frame.
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> Rgb {
        assert!(x < self.width && y < self.height, "pixel ({x}, {y}) out of bounds");
        self.pixels[y * self.width + x]
    }

    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> Option<Rgb> {
        (x < self.width && y < self.height).then(|| self.pixels[y * self.width + x])
    }

    /// Iterates over the pixels of `region` sampled every `stride` pixels on both axes.
    pub fn sample_region(&self, region: Region, stride: usize) -> impl Iterator<Item = Rgb> + '_ {
        let region = region.clamp_to(self.width, self.height);
        let stride = stride.max(1);
        (region.y..region.bottom())
            .step_by(stride)
            .flat_map(move |y| {
                (region.x..region.right())
                    .step_by(stride)
                    .map(move |x| self.pixels[y * self.width + x])
            })
    }

    /// Fraction of sampled pixels in `region` darker than `threshold`.
    ///
    /// An empty region yields `0.0`.
    #[must_use]
    pub fn dark_ratio(&self, region: Region, stride: usize, threshold: u8) -> f32 {
        ratio(self.sample_region(region, stride), |p| p.is_dark(threshold))
    }

    /// Fraction of sampled pixels in `region` at least as bright as `threshold`.
    #[must_use]
    pub fn bright_ratio(&self, region: Region, stride: usize, threshold: u8) -> f32 {
        ratio(self.sample_region(region, stride), |p| p.is_bright(threshold))
    }

    /// Number of pixels in `region` (full resolution) darker than `threshold`.
    #[must_use]
    pub fn count_dark(&self, region: Region, threshold: u8) -> usize {
        self.sample_region(region, 1)
            .filter(|p| p.is_dark(threshold))
            .count()
    }
}

#[expect(clippy::cast_precision_loss)]
fn ratio<I, F>(pixels: I, pred: F) -> f32
where
    I: Iterator<Item = Rgb>,
    F: Fn(Rgb) -> bool,
{
    let (hits, total) = pixels.fold((0usize, 0usize), |(hits, total), p| {
        (hits + usize::from(pred(p)), total + 1)
    });
    if total == 0 {
        return 0.0;
    }
    hits as f32 / total as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_wrong_buffer_size() {
        let err = PixelFrame::new(4, 4, vec![Rgb::BLACK; 15]).unwrap_err();
        assert_eq!(err.actual, 15);
        assert!(PixelFrame::new(4, 4, vec![Rgb::BLACK; 16]).is_ok());
    }

    #[test]
    fn test_from_fn_is_row_major() {
        let frame = PixelFrame::from_fn(3, 2, |x, y| Rgb::gray(u8::try_from(x + 10 * y).unwrap()));
        assert_eq!(frame.pixel(2, 0), Rgb::gray(2));
        assert_eq!(frame.pixel(1, 1), Rgb::gray(11));
        assert_eq!(frame.get(3, 0), None);
    }

    #[test]
    fn test_region_clamp() {
        let region = Region::new(150, 140, 20, 20).clamp_to(SCREEN_WIDTH, SCREEN_HEIGHT);
        assert_eq!(region, Region::new(150, 140, 10, 4));
        let outside = Region::new(200, 200, 5, 5).clamp_to(SCREEN_WIDTH, SCREEN_HEIGHT);
        assert_eq!(outside.width, 0);
        assert_eq!(outside.height, 0);
    }

    #[test]
    fn test_dark_and_bright_ratio() {
        // Left half black, right half white
        let frame = PixelFrame::from_fn(8, 8, |x, _| if x < 4 { Rgb::BLACK } else { Rgb::WHITE });
        let all = frame.bounds();
        assert!((frame.dark_ratio(all, 1, 64) - 0.5).abs() < f32::EPSILON);
        assert!((frame.bright_ratio(all, 1, 200) - 0.5).abs() < f32::EPSILON);
        assert_eq!(frame.count_dark(Region::new(0, 0, 2, 2), 64), 4);
        assert!(frame.dark_ratio(Region::new(0, 0, 0, 0), 1, 64).abs() < f32::EPSILON);
    }

    #[test]
    fn test_brightness_and_tolerance() {
        assert_eq!(Rgb::new(30, 60, 90).brightness(), 60);
        assert!(Rgb::new(100, 100, 100).within_tolerance(Rgb::new(110, 95, 100), 10));
        assert!(!Rgb::new(100, 100, 100).within_tolerance(Rgb::new(111, 100, 100), 10));
    }

    #[test]
    fn test_load_png_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let mut img = RgbImage::new(4, 2);
        img.put_pixel(3, 1, image::Rgb([10, 20, 30]));
        img.save(&path).unwrap();

        let frame = PixelFrame::load_png(&path).unwrap();
        assert_eq!((frame.width(), frame.height()), (4, 2));
        assert_eq!(frame.pixel(3, 1), Rgb::new(10, 20, 30));
        assert!(PixelFrame::load_png(dir.path().join("missing.png")).is_err());
    }
}
