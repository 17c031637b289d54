//! Multi-channel signed-distance glyph atlas.
//!
//! The atlas is a single image holding `columns × columns` glyph cells. Each
//! texel stores a distance to the glyph outline in its RGB channels, with
//! 0.5 on the edge, larger values inside. The median of the three channels
//! recovers a signed distance that stays sharp at any magnification.
//!
//! # Layout
//!
//! Atlas cell indices count rows from the bottom of the image, so index 0 is
//! the bottom-left cell. The glyph sequence runs from the top-left cell,
//! which is why [`crate::simulate::atlas_index`] reverses the row.
//!
//! # Example
//!
//! ```ignore
//! use glyphrain::atlas::GlyphAtlas;
//!
//! // Load an msdf atlas produced offline
//! let atlas = GlyphAtlas::from_file("assets/matrixcode_msdf.png", 8)?;
//!
//! // Or generate stroke glyphs procedurally
//! let atlas = GlyphAtlas::procedural(8, 64)?;
//! ```
//!
//! # Supported Formats
//!
//! - PNG (recommended, lossless)
//! - JPEG

use std::path::Path;

use glam::{Vec2, Vec3};
use image::{DynamicImage, Rgba, RgbaImage};

use crate::error::AtlasError;
use crate::hash::glsl_mod;

/// A validated glyph atlas.
#[derive(Debug, Clone)]
pub struct GlyphAtlas {
    image: RgbaImage,
    columns: u32,
}

impl GlyphAtlas {
    /// Wrap an RGBA image holding `columns × columns` glyph cells.
    ///
    /// # Errors
    ///
    /// Returns [`AtlasError::Empty`] for a zero-sized image or zero columns,
    /// [`AtlasError::IndivisibleLayout`] when either image dimension is not a
    /// multiple of `columns`, and [`AtlasError::NotSquare`] otherwise when
    /// width and height differ.
    pub fn new(image: RgbaImage, columns: u32) -> Result<Self, AtlasError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 || columns == 0 {
            return Err(AtlasError::Empty);
        }
        if width % columns != 0 || height % columns != 0 {
            return Err(AtlasError::IndivisibleLayout { width, height, columns });
        }
        if width != height {
            return Err(AtlasError::NotSquare { width, height });
        }
        Ok(Self { image, columns })
    }

    /// Build from any decoded image.
    pub fn from_image(image: DynamicImage, columns: u32) -> Result<Self, AtlasError> {
        Self::new(image.into_rgba8(), columns)
    }

    /// Load an atlas from an image file.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let atlas = GlyphAtlas::from_file("assets/glyphs.png", 8)?;
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P, columns: u32) -> Result<Self, AtlasError> {
        let bytes = std::fs::read(path.as_ref())?;
        let image = image::load_from_memory(&bytes)?;
        tracing::debug!(path = %path.as_ref().display(), "loaded glyph atlas");
        Self::from_image(image, columns)
    }

    /// Generate an atlas of stroke glyphs.
    ///
    /// Each glyph is a union of capsule strokes picked from a fixed set of
    /// ten segments by hashing the glyph's sequence position, so every
    /// session gets the same glyph set.
    ///
    /// # Arguments
    ///
    /// * `columns` - Glyph cells per side
    /// * `cell_size` - Pixels per glyph cell side
    pub fn procedural(columns: u32, cell_size: u32) -> Result<Self, AtlasError> {
        let size = columns
            .checked_mul(cell_size)
            .filter(|size| *size > 0)
            .ok_or(AtlasError::Empty)?;
        let mut image = RgbaImage::new(size, size);
        let cell = cell_size as f32;

        for (px, py, pixel) in image.enumerate_pixels_mut() {
            let (cx, cy) = (px / cell_size, py / cell_size);
            let sequence = cy * columns + cx;
            let local = Vec2::new(
                (px - cx * cell_size) as f32 + 0.5,
                (py - cy * cell_size) as f32 + 0.5,
            ) / cell;
            let distance = glyph_distance(sequence, local);
            let value = (0.5 - distance / DISTANCE_SPREAD).clamp(0.0, 1.0);
            let byte = (value * 255.0).round() as u8;
            *pixel = Rgba([byte, byte, byte, 255]);
        }

        Self::new(image, columns)
    }

    /// Glyph cells per side.
    #[inline]
    pub fn columns(&self) -> u32 {
        self.columns
    }

    /// Image width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Image height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Pixels packed as little-endian `u32` (red in the low byte), for
    /// `unpack4x8unorm` in shaders.
    pub fn to_packed_rgba(&self) -> Vec<u32> {
        self.image
            .as_raw()
            .chunks_exact(4)
            .map(|p| u32::from_le_bytes([p[0], p[1], p[2], p[3]]))
            .collect()
    }

    /// Texture coordinate of `glyph_uv` within atlas cell `index`.
    ///
    /// `glyph_uv` is the position inside the cell in `[0, 1]²`.
    pub fn cell_uv(&self, index: f32, glyph_uv: Vec2) -> Vec2 {
        let columns = self.columns as f32;
        let symbol_uv = Vec2::new(glsl_mod(index, columns), (index / columns).floor());
        (glyph_uv + symbol_uv) / columns
    }

    /// Bilinearly sample RGB at `uv`, with `v` measured from the bottom of
    /// the image. Coordinates clamp to the edge.
    pub fn sample(&self, uv: Vec2) -> Vec3 {
        let (width, height) = self.image.dimensions();
        let x = uv.x * width as f32 - 0.5;
        let y = (1.0 - uv.y) * height as f32 - 0.5;
        let (x0, y0) = (x.floor(), y.floor());
        let (tx, ty) = (x - x0, y - y0);

        let texel = |ix: f32, iy: f32| -> Vec3 {
            let ix = (ix.max(0.0) as u32).min(width - 1);
            let iy = (iy.max(0.0) as u32).min(height - 1);
            let p = self.image.get_pixel(ix, iy).0;
            Vec3::new(p[0] as f32, p[1] as f32, p[2] as f32) / 255.0
        };

        let top = texel(x0, y0).lerp(texel(x0 + 1.0, y0), tx);
        let bottom = texel(x0, y0 + 1.0).lerp(texel(x0 + 1.0, y0 + 1.0), tx);
        top.lerp(bottom, ty)
    }

    /// Signed distance at `uv`: positive inside the glyph, zero on its edge.
    pub fn signed_distance(&self, uv: Vec2) -> f32 {
        median3(self.sample(uv)) - 0.5
    }
}

/// Median of three channels.
#[inline]
pub fn median3(v: Vec3) -> f32 {
    v.x.min(v.y).max(v.x.max(v.y).min(v.z))
}

/// Distance range, in cell units, mapped onto `[0, 1]`.
const DISTANCE_SPREAD: f32 = 0.125;

/// Stroke half-width, in cell units.
const STROKE_RADIUS: f32 = 0.06;

/// Stroke segments on a 3×3 lattice inside the cell, y pointing down.
const SEGMENTS: [(Vec2, Vec2); 10] = [
    (Vec2::new(0.25, 0.2), Vec2::new(0.75, 0.2)),
    (Vec2::new(0.25, 0.5), Vec2::new(0.75, 0.5)),
    (Vec2::new(0.25, 0.8), Vec2::new(0.75, 0.8)),
    (Vec2::new(0.25, 0.2), Vec2::new(0.25, 0.5)),
    (Vec2::new(0.25, 0.5), Vec2::new(0.25, 0.8)),
    (Vec2::new(0.75, 0.2), Vec2::new(0.75, 0.5)),
    (Vec2::new(0.75, 0.5), Vec2::new(0.75, 0.8)),
    (Vec2::new(0.25, 0.2), Vec2::new(0.75, 0.8)),
    (Vec2::new(0.5, 0.2), Vec2::new(0.5, 0.8)),
    (Vec2::new(0.75, 0.2), Vec2::new(0.25, 0.5)),
];

fn glyph_hash(sequence: u32) -> u32 {
    let mut n = sequence.wrapping_mul(374_761_393).wrapping_add(668_265_263);
    n = (n ^ (n >> 13)).wrapping_mul(1_274_126_177);
    n ^ (n >> 16)
}

/// Segment mask for a glyph. Never empty.
fn glyph_segments(sequence: u32) -> u32 {
    let mask = glyph_hash(sequence) & 0x3FF;
    mask | (1 << (sequence % 10)) | (1 << ((sequence / 10 + 3) % 10))
}

/// Signed distance from `p` to glyph `sequence`, negative inside.
fn glyph_distance(sequence: u32, p: Vec2) -> f32 {
    let mask = glyph_segments(sequence);
    SEGMENTS
        .iter()
        .enumerate()
        .filter(|(i, _)| mask & (1 << i) != 0)
        .map(|(_, (a, b))| segment_distance(p, *a, *b))
        .fold(f32::INFINITY, f32::min)
        - STROKE_RADIUS
}

fn segment_distance(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    let pa = p - a;
    let ba = b - a;
    let h = (pa.dot(ba) / ba.length_squared()).clamp(0.0, 1.0);
    (pa - ba * h).length()
}
