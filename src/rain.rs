//! The falling-rain time function.
//!
//! Every column gets a fixed pseudo-random time offset and speed multiplier
//! derived from its x coordinate. Rain time for a cell is the column's
//! running time plus a small row offset, divided by the raindrop length.
//! Brightness is a decaying sawtooth over rain time, built from the
//! fractional part of rain time plus two sine harmonics at incommensurate
//! ratios (√2, √5) so the pattern never visibly repeats.

use glam::Vec2;

use crate::config::{CycleStyle, RainConfig};
use crate::hash::{fract, rand};

/// √2, first harmonic ratio.
pub const SQRT_2: f32 = std::f32::consts::SQRT_2;
/// √5, second harmonic ratio.
pub const SQRT_5: f32 = 2.236_068;

/// Fixed per-column timing parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColumnTiming {
    /// Phase offset in `[0, 1)`, scaled by 1000 when applied.
    pub time_offset: f32,
    /// Speed multiplier seed in `[0, 1)`.
    pub speed_offset: f32,
}

impl ColumnTiming {
    /// Timing for the column whose center is at `x`.
    pub fn for_column(x: f32) -> Self {
        Self {
            time_offset: rand(Vec2::new(x, 0.0)),
            speed_offset: rand(Vec2::new(x + 0.1, 0.0)),
        }
    }

    /// The column's running time at `sim_time`, including the speed wobble.
    pub fn column_time(&self, sim_time: f32, fall_speed: f32) -> f32 {
        (self.time_offset * 1000.0 + sim_time * 0.5 * fall_speed) * (0.5 + self.speed_offset * 0.5)
            + (sim_time * fall_speed * self.speed_offset).sin() * 0.2
    }
}

/// `fract(t + a·sin(√2·t) + b·sin(√5·t))`.
#[inline]
pub fn harmonic_pulse(t: f32, a: f32, b: f32) -> f32 {
    fract(t + a * (SQRT_2 * t).sin() + b * (SQRT_5 * t).sin())
}

/// Rain time for the cell centered at `glyph_pos` (grid units, row 0 at the bottom).
pub fn rain_time(glyph_pos: Vec2, sim_time: f32, config: &RainConfig) -> f32 {
    let column = ColumnTiming::for_column(glyph_pos.x);
    let column_time = column.column_time(sim_time, config.fall_speed);
    (glyph_pos.y * 0.01 + column_time) / config.raindrop_length
}

/// Raw brightness: a sharp peak with a long negative logarithmic tail.
///
/// Returns `-inf` when the pulse hits exactly zero; callers sanitize.
pub fn rain_brightness(rain_time: f32) -> f32 {
    let value = 1.0 - harmonic_pulse(rain_time, 0.3, 0.2);
    (value * 1.25).ln() * 3.0
}

/// Cycle advance speed for a cell.
pub fn cycle_speed(style: CycleStyle, rain_time: f32, brightness: f32) -> f32 {
    match style {
        CycleStyle::UniformDrift => harmonic_pulse(rain_time, 0.7, 1.1) * 0.75,
        CycleStyle::DecayCoupled if brightness > 0.0 => (1.0 - brightness).powi(4),
        CycleStyle::DecayCoupled => 0.0,
    }
}
