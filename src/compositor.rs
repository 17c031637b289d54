//! Per-pixel glyph compositing.
//!
//! For each output pixel: project into grid space, pick the nearest cell,
//! resolve its atlas cell, and sample the distance field with screen-space
//! anti-aliasing. The screen-space derivative of the signed distance is
//! estimated from the neighbouring pixel's projected coordinate, the same
//! quantity a fragment shader's `fwidth` reports.
//!
//! Glyphs drawn only a few pixels tall lose their outline to aliasing. Once a
//! pixel spans more than [`SMALL_GLYPH_FOOTPRINT`] of grid space the edge
//! coverage is blended toward the raw distance, and pixels below an alpha
//! cutoff that grows with the footprint are left black.

use glam::{Vec2, Vec4};
use rayon::prelude::*;

use crate::atlas::GlyphAtlas;
use crate::config::RainConfig;
use crate::frame::Frame;
use crate::hash::fract;
use crate::projection::{GridProjection, ViewportCover};
use crate::state::CellState;

/// Smallest derivative used when resolving edges, so flat regions don't divide by zero.
pub const FWIDTH_FLOOR: f32 = 1e-4;

/// Grid-space distance per pixel above which glyphs count as small.
pub const SMALL_GLYPH_FOOTPRINT: f32 = 0.001;

/// Converts sharpness into a pixel footprint scale.
pub const SHARPNESS_SCALE: f32 = 0.353505;

/// Alpha cutoff per multiple of [`SMALL_GLYPH_FOOTPRINT`].
pub const ALPHA_TEST_RATE: f32 = 0.02;

/// Everything compositing needs besides the state grid.
#[derive(Clone, Copy, Debug)]
pub struct CompositeContext<'a> {
    pub atlas: &'a GlyphAtlas,
    pub cover: ViewportCover,
    pub projection: GridProjection,
    pub num_columns: u32,
    pub glyph_height_to_width: f32,
    /// Glyph-space scale after edge crop, `clamp(1 - crop, 0, 1)`.
    pub crop_scale: f32,
    pub sharpness: f32,
    pub show_computation_texture: bool,
}

impl<'a> CompositeContext<'a> {
    pub fn new(config: &RainConfig, atlas: &'a GlyphAtlas, cover: ViewportCover) -> Self {
        Self {
            atlas,
            cover,
            projection: GridProjection::from_config(&config.projection),
            num_columns: config.num_columns,
            glyph_height_to_width: config.glyph_height_to_width,
            crop_scale: (1.0 - config.glyph_edge_crop).clamp(0.0, 1.0),
            sharpness: config.glyph_sharpness,
            show_computation_texture: config.show_computation_texture,
        }
    }

    fn grid_uv(&self, pixel: Vec2) -> Vec2 {
        self.cover.project(pixel, &self.projection, self.glyph_height_to_width)
    }

    fn glyph_uv(&self, uv: Vec2) -> Vec2 {
        let n = self.num_columns as f32;
        let g = Vec2::new(fract(uv.x * n), fract(uv.y * n));
        (g - Vec2::splat(0.5)) * self.crop_scale + Vec2::splat(0.5)
    }
}

/// Nearest cell to grid coordinate `uv`, clamped to the grid.
pub fn sample_cell(state: &[CellState], dimension: u32, uv: Vec2) -> CellState {
    if dimension == 0 {
        return CellState::UNINITIALIZED;
    }
    let n = dimension as f32;
    let max = dimension - 1;
    let column = ((uv.x * n).floor().max(0.0) as u32).min(max);
    let row = ((uv.y * n).floor().max(0.0) as u32).min(max);
    state
        .get(row as usize * dimension as usize + column as usize)
        .copied()
        .unwrap_or_default()
}

/// Edge coverage in `[0, 1]` for signed distance `sd` with screen derivative `fwidth`.
#[inline]
pub fn edge_alpha(sd: f32, fwidth: f32) -> f32 {
    (sd / fwidth.max(FWIDTH_FLOOR) + 0.5).clamp(0.0, 1.0)
}

/// Grid-space distance covered by one pixel, given the grid coordinate
/// deltas to the right and upper neighbours.
#[inline]
pub fn glyph_footprint(dx: Vec2, dy: Vec2, sharpness: f32) -> f32 {
    let duv = (dx + dy) * (SHARPNESS_SCALE / sharpness.max(f32::EPSILON));
    duv.x.abs().max(duv.y.abs())
}

/// Final glyph coverage, fading small glyphs toward their raw distance.
///
/// Returns 0 for pixels that fail the alpha test.
pub fn glyph_alpha(sd: f32, fwidth: f32, footprint: f32) -> f32 {
    let mut alpha = edge_alpha(sd, fwidth);
    if footprint > SMALL_GLYPH_FOOTPRINT {
        let ratio = SMALL_GLYPH_FOOTPRINT / footprint;
        alpha = ratio * alpha + (1.0 - ratio) * (sd + 0.5);
    } else if alpha < 0.5 {
        return 0.0;
    }
    let cutoff = 0.5 * ALPHA_TEST_RATE * footprint / SMALL_GLYPH_FOOTPRINT;
    if alpha < cutoff || !alpha.is_finite() {
        0.0
    } else {
        alpha
    }
}

/// Colour of the pixel centered at `pixel` (pixels, y up).
pub fn composite_pixel(state: &[CellState], dimension: u32, pixel: Vec2, ctx: &CompositeContext<'_>) -> Vec4 {
    let uv = ctx.grid_uv(pixel);
    let cell = sample_cell(state, dimension, uv);

    if ctx.show_computation_texture {
        return Vec4::new(cell.brightness, cell.cycle_phase, cell.symbol, cell.effect);
    }

    let brightness = cell.effect.max(cell.brightness);
    let msdf_uv = ctx.atlas.cell_uv(cell.symbol, ctx.glyph_uv(uv));
    let sd = ctx.atlas.signed_distance(msdf_uv);

    // Neighbouring pixels move through glyph space continuously, without the
    // wrap `fract` introduces at cell borders.
    let to_atlas = ctx.num_columns as f32 * ctx.crop_scale / ctx.atlas.columns() as f32;
    let dx = ctx.grid_uv(pixel + Vec2::X) - uv;
    let dy = ctx.grid_uv(pixel + Vec2::Y) - uv;
    let sd_dx = ctx.atlas.signed_distance(msdf_uv + dx * to_atlas);
    let sd_dy = ctx.atlas.signed_distance(msdf_uv + dy * to_atlas);
    let fwidth = (sd_dx - sd).abs() + (sd_dy - sd).abs();

    let value = brightness * glyph_alpha(sd, fwidth, glyph_footprint(dx, dy, ctx.sharpness));
    Vec4::new(value, value, value, 1.0)
}

/// Composite the whole viewport into `frame`.
///
/// `frame` rows are stored top first, so row `i` is pixel row `height - 1 - i`.
pub fn composite_frame(state: &[CellState], dimension: u32, frame: &mut Frame, ctx: &CompositeContext<'_>) {
    let (width, height) = (frame.width() as usize, frame.height() as usize);
    if width == 0 || height == 0 {
        return;
    }
    frame
        .pixels_mut()
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(image_row, out)| {
            let y = (height - 1 - image_row) as f32 + 0.5;
            for (x, pixel) in out.iter_mut().enumerate() {
                *pixel = composite_pixel(state, dimension, Vec2::new(x as f32 + 0.5, y), ctx);
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn solid_atlas(value: u8) -> GlyphAtlas {
        let mut image = RgbaImage::new(16, 16);
        for p in image.pixels_mut() {
            *p = Rgba([value, value, value, 255]);
        }
        GlyphAtlas::new(image, 2).unwrap()
    }

    fn filled(dimension: u32, cell: CellState) -> Vec<CellState> {
        vec![cell; (dimension * dimension) as usize]
    }

    #[test]
    fn test_sample_cell_clamps() {
        let mut state = filled(2, CellState::UNINITIALIZED);
        state[0].brightness = 1.0;
        state[3].brightness = 4.0;
        assert_eq!(sample_cell(&state, 2, Vec2::new(-3.0, -3.0)).brightness, 1.0);
        assert_eq!(sample_cell(&state, 2, Vec2::new(7.0, 9.0)).brightness, 4.0);
        assert_eq!(sample_cell(&state, 2, Vec2::new(0.75, 0.75)).brightness, 4.0);
    }

    #[test]
    fn test_edge_alpha() {
        assert_eq!(edge_alpha(0.0, 0.1), 0.5);
        assert_eq!(edge_alpha(1.0, 0.1), 1.0);
        assert_eq!(edge_alpha(-1.0, 0.1), 0.0);
        assert_eq!(edge_alpha(0.0, 0.0), 0.5);
    }

    #[test]
    fn test_glyph_alpha_large_glyphs_alpha_test() {
        // Sharp edges for large glyphs: coverage under one half is cut.
        assert_eq!(glyph_alpha(0.1, 0.1, 0.0005), 1.0);
        assert_eq!(glyph_alpha(-0.01, 0.1, 0.0005), 0.0);
        assert!((glyph_alpha(0.01, 0.1, 0.0005) - 0.6).abs() < 1e-5);
    }

    #[test]
    fn test_glyph_alpha_fades_small_glyphs() {
        // Ten times the threshold: 10% edge coverage, 90% raw distance.
        let alpha = glyph_alpha(0.2, 1.0, 0.01);
        assert!((alpha - 0.7).abs() < 1e-5, "alpha {alpha}");
        // The cutoff grows with the footprint: 0.5 here, 1.0 at a hundred times.
        assert!(glyph_alpha(0.4, 1.0, 0.05) > 0.5);
        assert_eq!(glyph_alpha(0.4, 1.0, 0.1), 0.0);
    }

    #[test]
    fn test_glyph_footprint_scales_with_sharpness() {
        let dx = Vec2::new(0.01, 0.0);
        let dy = Vec2::new(0.0, 0.02);
        assert!((glyph_footprint(dx, dy, 1.0) - 0.02 * 0.353505).abs() < 1e-7);
        assert!((glyph_footprint(dx, dy, 0.5) - 0.04 * 0.353505).abs() < 1e-7);
    }

    #[test]
    fn test_small_glyphs_drop_partial_coverage() {
        let config = RainConfig::default().with_columns(2).with_glyphs(4, 2);
        let atlas = solid_atlas(153);
        let state = filled(2, CellState { brightness: 0.8, cycle_phase: 0.1, symbol: 0.0, effect: 0.0 });

        // Large on screen: full coverage.
        let ctx = CompositeContext::new(&config, &atlas, ViewportCover::new(4096, 4096));
        let color = composite_pixel(&state, 2, Vec2::new(2048.5, 2048.5), &ctx);
        assert!((color.x - 0.8).abs() < 1e-5, "large glyph got {}", color.x);

        // Four pixels per glyph: 60% ink falls under the cutoff.
        let ctx = CompositeContext::new(&config, &atlas, ViewportCover::new(8, 8));
        let color = composite_pixel(&state, 2, Vec2::new(3.5, 3.5), &ctx);
        assert_eq!(color.x, 0.0);
    }

    #[test]
    fn test_inside_glyph_outputs_brightness() {
        let config = RainConfig::default().with_columns(2).with_glyphs(4, 2);
        let atlas = solid_atlas(255);
        let ctx = CompositeContext::new(&config, &atlas, ViewportCover::new(8, 8));
        let state = filled(2, CellState { brightness: 0.6, cycle_phase: 0.1, symbol: 0.0, effect: 0.0 });
        let color = composite_pixel(&state, 2, Vec2::new(3.5, 3.5), &ctx);
        assert!((color.x - 0.6).abs() < 1e-5);
        assert_eq!(color.w, 1.0);
    }

    #[test]
    fn test_outside_glyph_is_dark() {
        let config = RainConfig::default().with_columns(2).with_glyphs(4, 2);
        let atlas = solid_atlas(0);
        let ctx = CompositeContext::new(&config, &atlas, ViewportCover::new(8, 8));
        let state = filled(2, CellState { brightness: 0.9, cycle_phase: 0.1, symbol: 1.0, effect: 0.0 });
        let color = composite_pixel(&state, 2, Vec2::new(1.5, 6.5), &ctx);
        assert_eq!(color.x, 0.0);
    }

    #[test]
    fn test_effect_channel_raises_brightness() {
        let config = RainConfig::default().with_columns(2).with_glyphs(4, 2);
        let atlas = solid_atlas(255);
        let ctx = CompositeContext::new(&config, &atlas, ViewportCover::new(8, 8));
        let state = filled(2, CellState { brightness: -2.0, cycle_phase: 0.1, symbol: 0.0, effect: 0.75 });
        let color = composite_pixel(&state, 2, Vec2::new(4.5, 4.5), &ctx);
        assert!((color.x - 0.75).abs() < 1e-5);
    }

    #[test]
    fn test_debug_view_passes_state_through() {
        let config = RainConfig::default().with_columns(2).with_computation_texture(true);
        let atlas = solid_atlas(0);
        let ctx = CompositeContext::new(&config, &atlas, ViewportCover::new(4, 4));
        let cell = CellState { brightness: -3.0, cycle_phase: 0.5, symbol: 0.25, effect: 1.0 };
        let state = filled(2, cell);
        let color = composite_pixel(&state, 2, Vec2::new(0.5, 0.5), &ctx);
        assert_eq!(color, Vec4::new(-3.0, 0.5, 0.25, 1.0));
    }

    #[test]
    fn test_frame_rows_are_top_down() {
        let config = RainConfig::default().with_columns(2).with_computation_texture(true);
        let atlas = solid_atlas(0);
        let mut state = filled(2, CellState::UNINITIALIZED);
        // Bottom row of the grid bright, top row dark.
        state[0].brightness = 1.0;
        state[1].brightness = 1.0;
        let ctx = CompositeContext::new(&config, &atlas, ViewportCover::new(4, 4));
        let mut frame = Frame::new(4, 4).unwrap();
        composite_frame(&state, 2, &mut frame, &ctx);
        assert_eq!(frame.get(0, 3).map(|p| p.x), Some(1.0));
        assert_eq!(frame.get(0, 0).map(|p| p.x), Some(0.0));
    }
}
