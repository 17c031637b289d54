//! Viewport coverage and the grid projections.
//!
//! Compositing maps every output pixel to a point in grid space. First the
//! viewport is covered by a square quad spanning its longest side, so the
//! grid is never stretched. Then exactly one projection bends that square:
//! a slant rotates it, scaled so no corner is left uncovered, or a polar
//! warp bends rows into arcs radiating from a point above the viewport.
//! Finally the vertical axis is divided by the glyph aspect ratio.

use std::f32::consts::PI;

use glam::Vec2;

use crate::config::Projection;

/// Maps pixels of a viewport onto the unit square, cropping the shorter axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportCover {
    width: u32,
    height: u32,
    /// Scale of the covering quad in normalized device coordinates.
    quad_scale: Vec2,
}

impl ViewportCover {
    /// Coverage for a `width × height` viewport. Zero sizes are treated as 1.
    pub fn new(width: u32, height: u32) -> Self {
        let (w, h) = (width.max(1) as f32, height.max(1) as f32);
        let quad_scale = if h > w { Vec2::new(h / w, 1.0) } else { Vec2::new(1.0, w / h) };
        Self { width, height, quad_scale }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Scale of the covering quad, for uploading to shaders.
    #[inline]
    pub fn quad_scale(&self) -> Vec2 {
        self.quad_scale
    }

    /// Unit-square coordinate of a pixel position.
    ///
    /// `pixel` is in pixels with y pointing up; pixel centers sit at `+0.5`.
    pub fn pixel_uv(&self, pixel: Vec2) -> Vec2 {
        let size = Vec2::new(self.width.max(1) as f32, self.height.max(1) as f32);
        let ndc = pixel / size * 2.0 - Vec2::ONE;
        ndc / self.quad_scale * 0.5 + Vec2::splat(0.5)
    }

    /// Grid-space coordinate for a pixel position.
    pub fn project(&self, pixel: Vec2, projection: &GridProjection, glyph_height_to_width: f32) -> Vec2 {
        let mut uv = projection.apply(self.pixel_uv(pixel));
        uv.y /= glyph_height_to_width;
        uv
    }
}

/// A projection with its per-session constants resolved.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GridProjection {
    Slant {
        /// `(cos θ, sin θ)`.
        direction: Vec2,
        /// Coverage-preserving scale.
        scale: f32,
    },
    Polar,
}

impl GridProjection {
    pub fn from_config(projection: &Projection) -> Self {
        match *projection {
            Projection::Slant { angle } => GridProjection::Slant {
                direction: Vec2::new(angle.cos(), angle.sin()),
                scale: slant_scale(angle),
            },
            Projection::Polar => GridProjection::Polar,
        }
    }

    /// Remap a unit-square coordinate.
    pub fn apply(&self, uv: Vec2) -> Vec2 {
        match *self {
            GridProjection::Slant { direction, scale } => slant_uv(uv, direction, scale),
            GridProjection::Polar => polar_uv(uv),
        }
    }
}

/// Largest scale at which a square rotated by `angle` still covers the unit square.
///
/// A unit square rotated by θ has an axis-aligned extent of `|cos θ| + |sin θ|`.
pub fn slant_scale(angle: f32) -> f32 {
    1.0 / (angle.cos().abs() + angle.sin().abs())
}

/// Rotate `uv` about the center by the angle whose cosine and sine are `direction`.
pub fn slant_uv(uv: Vec2, direction: Vec2, scale: f32) -> Vec2 {
    let c = uv - Vec2::splat(0.5);
    Vec2::new(
        c.x * direction.x + c.y * direction.y,
        c.y * direction.x - c.x * direction.y,
    ) * scale
        + Vec2::splat(0.5)
}

/// Bend rows into arcs around a point above the viewport.
pub fn polar_uv(uv: Vec2) -> Vec2 {
    let mut p = (uv - Vec2::splat(0.5)) * 0.5;
    p.y -= 0.5;
    let radius = p.length();
    let angle = p.y.atan2(p.x) / (2.0 * PI) + 0.5;
    Vec2::new(angle * 4.0 - 0.5, 1.5 - radius.sqrt() * 1.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_viewport_maps_to_unit_square() {
        let cover = ViewportCover::new(100, 100);
        assert_eq!(cover.quad_scale(), Vec2::ONE);
        let uv = cover.pixel_uv(Vec2::new(0.0, 0.0));
        assert!(uv.abs_diff_eq(Vec2::ZERO, 1e-6));
        let uv = cover.pixel_uv(Vec2::new(100.0, 100.0));
        assert!(uv.abs_diff_eq(Vec2::ONE, 1e-6));
    }

    #[test]
    fn test_wide_viewport_crops_vertically() {
        let cover = ViewportCover::new(200, 100);
        assert_eq!(cover.quad_scale(), Vec2::new(1.0, 2.0));
        let bottom = cover.pixel_uv(Vec2::new(0.0, 0.0));
        let top = cover.pixel_uv(Vec2::new(200.0, 100.0));
        assert!((bottom.x - 0.0).abs() < 1e-6 && (top.x - 1.0).abs() < 1e-6);
        assert!((bottom.y - 0.25).abs() < 1e-6 && (top.y - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_tall_viewport_crops_horizontally() {
        let cover = ViewportCover::new(50, 100);
        assert_eq!(cover.quad_scale(), Vec2::new(2.0, 1.0));
        let uv = cover.pixel_uv(Vec2::new(0.0, 100.0));
        assert!(uv.abs_diff_eq(Vec2::new(0.25, 1.0), 1e-6));
    }

    #[test]
    fn test_zero_viewport_does_not_divide_by_zero() {
        let cover = ViewportCover::new(0, 0);
        assert!(cover.pixel_uv(Vec2::splat(0.5)).is_finite());
    }

    #[test]
    fn test_slant_zero_is_identity() {
        let projection = GridProjection::from_config(&Projection::Slant { angle: 0.0 });
        let uv = Vec2::new(0.3, 0.8);
        assert!(projection.apply(uv).abs_diff_eq(uv, 1e-6));
    }

    #[test]
    fn test_slant_covers_viewport_corners() {
        for step in 0..=32 {
            let angle = step as f32 / 32.0 * PI;
            let projection = GridProjection::from_config(&Projection::Slant { angle });
            for corner in [Vec2::ZERO, Vec2::X, Vec2::Y, Vec2::ONE] {
                let p = projection.apply(corner);
                assert!(
                    p.x >= -1e-5 && p.x <= 1.0 + 1e-5 && p.y >= -1e-5 && p.y <= 1.0 + 1e-5,
                    "angle {} corner {:?} -> {:?}",
                    angle,
                    corner,
                    p
                );
            }
        }
    }

    #[test]
    fn test_polar_center_column() {
        // Directly below the pole the angle is -π/2, i.e. 0.25 of a turn.
        let uv = polar_uv(Vec2::new(0.5, 0.5));
        assert!((uv.x - 0.5).abs() < 1e-6);
        assert!((uv.y - (1.5 - 0.5f32.sqrt() * 1.5)).abs() < 1e-6);
    }

    #[test]
    fn test_project_divides_by_aspect() {
        let cover = ViewportCover::new(10, 10);
        let projection = GridProjection::from_config(&Projection::default());
        let a = cover.project(Vec2::new(5.0, 8.0), &projection, 1.0);
        let b = cover.project(Vec2::new(5.0, 8.0), &projection, 2.0);
        assert!((a.y / 2.0 - b.y).abs() < 1e-6);
    }
}
