//! One simulation step over the grid.
//!
//! [`step_cell`] is a pure function of a cell's coordinate, its prior
//! state and the shared [`StepContext`]. [`simulate_grid`] maps it over
//! every cell in parallel, reading the front slot and writing the back slot
//! of a [`crate::state::StateBuffer`].
//!
//! Per-cell order of operations:
//!
//! 1. raw brightness from rain time
//! 2. brightness-stage effects (sun, thunder)
//! 3. cycle speed and phase advance
//! 4. effect channel (ripple, cursor)
//! 5. rescale above the brightness floor
//! 6. temporal blend with the prior brightness, unless this is the cell's first step

use glam::Vec2;
use rayon::prelude::*;

use crate::config::RainConfig;
use crate::effects::{EffectContext, EffectStack};
use crate::hash::{fract, rand};
use crate::rain::{cycle_speed, rain_brightness, rain_time};
use crate::state::CellState;

/// Brightness substituted for NaN or infinite intermediates. Far below any
/// visible level, so a corrupted cell is simply dark for a frame.
pub const NUMERIC_FLOOR: f32 = -10.0;

/// Phase advance per frame at unit speeds.
pub const CYCLE_RATE: f32 = 0.005;

/// Seed phase used by the debug view so every cell starts identically.
pub const DEBUG_SEED_PHASE: f32 = 0.5;

/// Inputs shared by every cell in one step.
#[derive(Clone, Copy, Debug)]
pub struct StepContext<'a> {
    pub config: &'a RainConfig,
    pub effects: &'a EffectStack,
    /// Elapsed seconds multiplied by `animation_speed`.
    pub sim_time: f32,
    /// Elapsed time since the previous step, in 60 Hz frames.
    pub delta_frames: f32,
}

impl<'a> StepContext<'a> {
    pub fn new(config: &'a RainConfig, effects: &'a EffectStack, time_secs: f32, delta_frames: f32) -> Self {
        Self {
            config,
            effects,
            sim_time: time_secs * config.animation_speed,
            delta_frames,
        }
    }
}

/// Replace NaN and infinities with [`NUMERIC_FLOOR`].
#[inline]
pub fn sanitize(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        tracing::trace!(value = ?value, "non-finite brightness replaced");
        NUMERIC_FLOOR
    }
}

/// Wrap into `[0, 1)`. Non-finite input wraps to 0.
#[inline]
pub fn wrap_phase(value: f32) -> f32 {
    if !value.is_finite() {
        return 0.0;
    }
    let wrapped = fract(value);
    // fract of a tiny negative number rounds up to exactly 1.0
    if wrapped >= 1.0 {
        0.0
    } else {
        wrapped
    }
}

/// Weight given to the new brightness after `delta_frames` frames.
///
/// A mix of `m` per 60 Hz frame compounds to `1 - (1 - m)^frames`, so the
/// blend converges at the same rate regardless of frame rate. Zero elapsed
/// frames keeps the prior value.
#[inline]
pub fn blend_weight(mix: f32, delta_frames: f32) -> f32 {
    if delta_frames <= 0.0 || !delta_frames.is_finite() {
        0.0
    } else if mix >= 1.0 {
        1.0
    } else {
        1.0 - (1.0 - mix.max(0.0)).powf(delta_frames)
    }
}

/// GLSL `mix`.
#[inline]
fn mix(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

/// Glyph sequence position for a cycle phase, in `[0, sequence_length)`.
#[inline]
pub fn symbol_index(cycle_phase: f32, sequence_length: u32) -> u32 {
    let symbol = (sequence_length as f32 * cycle_phase).floor();
    if symbol <= 0.0 {
        0
    } else {
        (symbol as u32).min(sequence_length.saturating_sub(1))
    }
}

/// Atlas cell index for a sequence position.
///
/// The sequence runs left to right from the top row of the atlas image,
/// while atlas rows are counted from the bottom, so the row is reversed.
#[inline]
pub fn atlas_index(symbol: u32, texture_columns: u32) -> u32 {
    let columns = texture_columns.max(1);
    let x = symbol % columns;
    let y = (columns - 1).saturating_sub(symbol / columns);
    y * columns + x
}

/// Column and bottom-up row of an atlas cell index.
#[inline]
pub fn atlas_cell(index: u32, texture_columns: u32) -> (u32, u32) {
    let columns = texture_columns.max(1);
    (index % columns, index / columns)
}

/// Advance one cell by one step.
pub fn step_cell(column: u32, row: u32, prior: &CellState, ctx: &StepContext<'_>) -> CellState {
    let config = ctx.config;
    let glyph_pos = Vec2::new(column as f32 + 0.5, row as f32 + 0.5);
    let screen_pos = glyph_pos / config.num_columns as f32;

    let initializing = prior.is_uninitialized();
    let old_cycle = if !initializing {
        wrap_phase(prior.cycle_phase)
    } else if config.show_computation_texture {
        DEBUG_SEED_PHASE
    } else {
        wrap_phase(rand(screen_pos))
    };

    let rain_time = rain_time(glyph_pos, ctx.sim_time, config);
    let effect_ctx = EffectContext { sim_time: ctx.sim_time, screen_pos };
    let raw = sanitize(rain_brightness(rain_time));
    let mut brightness = sanitize(ctx.effects.apply_brightness(raw, &effect_ctx));

    let speed = cycle_speed(config.cycle_style, rain_time, brightness);
    let advance = CYCLE_RATE * config.animation_speed * config.cycle_speed * speed * ctx.delta_frames;
    let cycle_phase = wrap_phase(old_cycle + advance);

    let effect = ctx.effects.apply_effect_channel(brightness, &effect_ctx);

    if brightness > config.brightness_minimum {
        brightness = sanitize(brightness * config.brightness_multiplier + config.brightness_offset);
    }

    if !initializing {
        let weight = blend_weight(config.brightness_mix, ctx.delta_frames);
        brightness = mix(sanitize(prior.brightness), brightness, weight);
    }
    let brightness = sanitize(brightness);

    if config.show_computation_texture {
        CellState {
            brightness,
            cycle_phase,
            symbol: speed.min(1.0),
            effect: 1.0,
        }
    } else {
        let symbol = symbol_index(cycle_phase, config.glyph_sequence_length);
        CellState {
            brightness,
            cycle_phase,
            symbol: atlas_index(symbol, config.glyph_texture_columns) as f32,
            effect,
        }
    }
}

/// Step every cell of a `dimension × dimension` grid from `front` into `back`.
pub fn simulate_grid(front: &[CellState], back: &mut [CellState], dimension: u32, ctx: &StepContext<'_>) {
    let width = dimension as usize;
    debug_assert_eq!(front.len(), width * width);
    debug_assert_eq!(back.len(), width * width);
    if width == 0 {
        return;
    }

    back.par_chunks_mut(width).enumerate().for_each(|(row, out)| {
        let prior_row = &front[row * width..(row + 1) * width];
        for (column, (cell, prior)) in out.iter_mut().zip(prior_row).enumerate() {
            *cell = step_cell(column as u32, row as u32, prior, ctx);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CycleStyle, RippleType};
    use crate::state::StateBuffer;

    fn run(config: &RainConfig, buffer: &mut StateBuffer, time_secs: f32, delta_frames: f32) {
        let effects = EffectStack::from_config(config);
        let ctx = StepContext::new(config, &effects, time_secs, delta_frames);
        let dimension = buffer.dimension();
        let (front, back) = buffer.split_mut();
        simulate_grid(front, back, dimension, &ctx);
        buffer.swap();
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize(f32::NAN), NUMERIC_FLOOR);
        assert_eq!(sanitize(f32::NEG_INFINITY), NUMERIC_FLOOR);
        assert_eq!(sanitize(f32::INFINITY), NUMERIC_FLOOR);
        assert_eq!(sanitize(0.25), 0.25);
    }

    #[test]
    fn test_wrap_phase() {
        assert_eq!(wrap_phase(1.25), 0.25);
        assert_eq!(wrap_phase(-1e-9), 0.0);
        assert_eq!(wrap_phase(f32::NAN), 0.0);
        assert!((wrap_phase(-0.25) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_blend_weight() {
        assert_eq!(blend_weight(0.5, 0.0), 0.0);
        assert_eq!(blend_weight(1.0, 0.0), 0.0);
        assert_eq!(blend_weight(1.0, 0.5), 1.0);
        assert!((blend_weight(0.5, 1.0) - 0.5).abs() < 1e-6);
        assert!((blend_weight(0.5, 2.0) - 0.75).abs() < 1e-6);
        assert_eq!(blend_weight(0.0, 3.0), 0.0);
    }

    #[test]
    fn test_symbol_index_bounds() {
        assert_eq!(symbol_index(0.0, 57), 0);
        assert_eq!(symbol_index(0.999_999_9, 57), 56);
        assert_eq!(symbol_index(0.5, 10), 5);
    }

    #[test]
    fn test_atlas_index_reverses_rows() {
        // 8 columns: symbol 0 lands on the top row (row 7 from the bottom).
        assert_eq!(atlas_index(0, 8), 56);
        assert_eq!(atlas_index(7, 8), 63);
        assert_eq!(atlas_index(8, 8), 48);
        assert_eq!(atlas_cell(atlas_index(9, 8), 8), (1, 6));
    }

    #[test]
    fn test_zero_atlas_columns_treated_as_one() {
        assert_eq!(atlas_index(5, 0), 5);
        assert_eq!(atlas_cell(5, 0), (0, 5));

        let mut config = RainConfig::default().with_columns(2);
        config.glyph_texture_columns = 0;
        config.glyph_sequence_length = 0;
        let mut buffer = StateBuffer::new(2).unwrap();
        run(&config, &mut buffer, 1.0, 1.0);
        assert!(buffer.front().iter().all(|c| c.symbol == 0.0));
    }

    #[test]
    fn test_non_finite_prior_recovers() {
        let config = RainConfig::default().with_columns(4);
        let effects = EffectStack::from_config(&config);
        let ctx = StepContext::new(&config, &effects, 2.0, 1.0);
        let priors = [
            CellState { brightness: f32::NAN, cycle_phase: f32::NAN, symbol: f32::NAN, effect: f32::NAN },
            CellState { brightness: f32::INFINITY, cycle_phase: f32::NEG_INFINITY, symbol: 0.0, effect: 0.0 },
            CellState { brightness: f32::NEG_INFINITY, cycle_phase: f32::INFINITY, symbol: 1.0, effect: 0.0 },
        ];
        for prior in &priors {
            let cell = step_cell(1, 2, prior, &ctx);
            assert!(cell.brightness.is_finite(), "{prior:?} stepped to {cell:?}");
            assert!((0.0..1.0).contains(&cell.cycle_phase), "{prior:?} stepped to {cell:?}");
            assert!(cell.symbol.is_finite() && cell.effect.is_finite());
        }
    }

    #[test]
    fn test_non_finite_grid_recovers() {
        let config = RainConfig::default().with_columns(4);
        let mut buffer = StateBuffer::new(4).unwrap();
        buffer.back_mut().fill(CellState {
            brightness: f32::NAN,
            cycle_phase: f32::INFINITY,
            symbol: f32::NAN,
            effect: f32::NEG_INFINITY,
        });
        buffer.swap();
        run(&config, &mut buffer, 1.0, 1.0);
        for cell in buffer.front() {
            assert!(cell.brightness.is_finite());
            assert!((0.0..1.0).contains(&cell.cycle_phase));
        }
    }

    #[test]
    fn test_overflowing_config_stays_finite() {
        let config = RainConfig::default()
            .with_columns(4)
            .with_brightness(-100.0, f32::MAX, f32::MAX)
            .with_cycle_speed(f32::MAX);
        let mut buffer = StateBuffer::new(4).unwrap();
        for frame in 0..3 {
            run(&config, &mut buffer, frame as f32, 1.0);
            for cell in buffer.front() {
                assert!(cell.brightness.is_finite());
                assert!((0.0..1.0).contains(&cell.cycle_phase));
            }
        }
    }

    #[test]
    fn test_first_step_seeds_phase() {
        let config = RainConfig::default().with_columns(4);
        let mut buffer = StateBuffer::new(4).unwrap();
        run(&config, &mut buffer, 0.0, 0.0);
        for row in 0..4u32 {
            for column in 0..4u32 {
                let cell = buffer.cell(column, row).unwrap();
                let screen = Vec2::new(column as f32 + 0.5, row as f32 + 0.5) / 4.0;
                assert_eq!(cell.cycle_phase, wrap_phase(rand(screen)));
            }
        }
    }

    #[test]
    fn test_debug_view_layout() {
        let config = RainConfig::default().with_columns(3).with_computation_texture(true);
        let mut buffer = StateBuffer::new(3).unwrap();
        run(&config, &mut buffer, 1.0, 0.0);
        for cell in buffer.front() {
            assert_eq!(cell.cycle_phase, DEBUG_SEED_PHASE);
            assert_eq!(cell.effect, 1.0);
            assert!(cell.symbol <= 1.0);
        }
    }

    #[test]
    fn test_brightness_rescale_above_floor() {
        let plain = RainConfig::default().with_columns(4);
        let scaled = RainConfig::default().with_columns(4).with_brightness(-100.0, 2.0, 0.5);
        let mut a = StateBuffer::new(4).unwrap();
        let mut b = StateBuffer::new(4).unwrap();
        run(&plain, &mut a, 2.0, 1.0);
        run(&scaled, &mut b, 2.0, 1.0);
        for (x, y) in a.front().iter().zip(b.front()) {
            assert!((y.brightness - (x.brightness * 2.0 + 0.5)).abs() < 1e-4);
        }
    }

    #[test]
    fn test_mix_zero_freezes_brightness() {
        let config = RainConfig::default().with_columns(4).with_brightness_mix(0.0);
        let mut buffer = StateBuffer::new(4).unwrap();
        run(&config, &mut buffer, 0.0, 0.0);
        let first: Vec<f32> = buffer.front().iter().map(|c| c.brightness).collect();
        for frame in 1..20 {
            run(&config, &mut buffer, frame as f32 / 60.0, 1.0);
        }
        let last: Vec<f32> = buffer.front().iter().map(|c| c.brightness).collect();
        assert_eq!(first, last);
    }

    #[test]
    fn test_uniform_drift_advances_phase() {
        let config = RainConfig::default()
            .with_columns(4)
            .with_cycle_style(CycleStyle::UniformDrift)
            .with_cycle_speed(10.0);
        let mut buffer = StateBuffer::new(4).unwrap();
        run(&config, &mut buffer, 0.0, 0.0);
        let before: Vec<f32> = buffer.front().iter().map(|c| c.cycle_phase).collect();
        run(&config, &mut buffer, 1.0 / 60.0, 1.0);
        let moved = buffer
            .front()
            .iter()
            .zip(&before)
            .filter(|(c, b)| c.cycle_phase != **b)
            .count();
        assert!(moved > 0);
    }

    #[test]
    fn test_cursor_sets_effect_channel() {
        let config = RainConfig::default().with_columns(4).with_cursor_threshold(-100.0);
        let mut buffer = StateBuffer::new(4).unwrap();
        run(&config, &mut buffer, 0.5, 0.0);
        assert!(buffer.front().iter().all(|c| c.effect == 1.0));
    }

    #[test]
    fn test_ripple_effect_not_persisted_in_brightness() {
        let base = RainConfig::default().with_columns(6);
        let rippled = base.clone().with_ripple(RippleType::Circle).with_ripple_params(30.0, 0.2, 5.0);
        let mut a = StateBuffer::new(6).unwrap();
        let mut b = StateBuffer::new(6).unwrap();
        run(&base, &mut a, 3.0, 0.0);
        run(&rippled, &mut b, 3.0, 0.0);
        for (x, y) in a.front().iter().zip(b.front()) {
            assert_eq!(x.brightness, y.brightness);
            assert_eq!(x.cycle_phase, y.cycle_phase);
        }
    }
}
