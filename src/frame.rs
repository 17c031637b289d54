//! Composited output frames.

use std::path::Path;

use glam::Vec4;
use image::{ImageResult, Rgba, RgbaImage};

use crate::error::AllocationError;

/// An RGBA float framebuffer, stored top row first.
///
/// Normal output is grey `(l, l, l, 1)` where `l` is brightness times edge
/// coverage. The debug view stores raw cell state in the four channels, so
/// values may fall outside `[0, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<Vec4>,
}

impl Frame {
    /// Allocate a black frame.
    pub fn new(width: u32, height: u32) -> Result<Self, AllocationError> {
        let len = (width as usize)
            .checked_mul(height as usize)
            .ok_or(AllocationError::Overflow { what: "framebuffer" })?;
        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(len)
            .map_err(|source| AllocationError::Reserve { what: "framebuffer", source })?;
        pixels.resize(len, Vec4::new(0.0, 0.0, 0.0, 1.0));
        Ok(Self { width, height, pixels })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn pixels(&self) -> &[Vec4] {
        &self.pixels
    }

    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [Vec4] {
        &mut self.pixels
    }

    /// Pixel at column `x`, row `y` counted from the top.
    pub fn get(&self, x: u32, y: u32) -> Option<Vec4> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(y as usize * self.width as usize + x as usize).copied()
    }

    /// Mean of the red channel as displayed (clamped to `[0, 1]`).
    pub fn mean_luminance(&self) -> f32 {
        if self.pixels.is_empty() {
            return 0.0;
        }
        self.pixels.iter().map(|p| p.x.clamp(0.0, 1.0)).sum::<f32>() / self.pixels.len() as f32
    }

    /// Quantize to 8-bit RGBA, clamping every channel to `[0, 1]`.
    pub fn to_rgba8(&self) -> RgbaImage {
        let mut image = RgbaImage::new(self.width, self.height);
        for (pixel, value) in image.pixels_mut().zip(&self.pixels) {
            let v = value.clamp(Vec4::ZERO, Vec4::ONE) * 255.0;
            *pixel = Rgba([v.x.round() as u8, v.y.round() as u8, v.z.round() as u8, v.w.round() as u8]);
        }
        image
    }

    /// Write the frame as a PNG.
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        self.to_rgba8().save_with_format(path, image::ImageFormat::Png)
    }
}
