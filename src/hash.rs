//! Deterministic shader-style hash functions.
//!
//! These reproduce the usual GLSL idioms in `f32` so the CPU and GPU
//! backends agree (within float tolerance) on per-column offsets and ripple
//! centers. The same formulas are emitted into the generated WGSL by
//! [`crate::shader`].

use glam::Vec2;
use std::f32::consts::PI;

/// Fractional part, `x - floor(x)`.
#[inline]
pub fn fract(x: f32) -> f32 {
    x - x.floor()
}

/// GLSL `mod`: result has the sign of `y`.
#[inline]
pub fn glsl_mod(x: f32, y: f32) -> f32 {
    x - y * (x / y).floor()
}

/// Pseudo-random scalar in `[0, 1)` from a 2D seed.
///
/// The dot product is folded into `[0, π)` before `sin` so large seeds keep
/// their precision.
#[inline]
pub fn rand(uv: Vec2) -> f32 {
    let dt = uv.dot(Vec2::new(12.9898, 78.233));
    let sn = glsl_mod(dt, PI);
    fract(sn.sin() * 43758.5453)
}

/// Pseudo-random vector in `[0, 1)²` from a 2D seed.
#[inline]
pub fn rand2(p: Vec2) -> Vec2 {
    Vec2::new(
        fract((p.x * 591.32 + p.y * 154.077).sin()),
        fract((p.x * 391.32 + p.y * 49.077).cos()),
    )
}

/// WGSL source for [`fract`]-based helpers, shared by all generated kernels.
pub(crate) const HASH_WGSL: &str = r#"
const PI: f32 = 3.14159265359;

fn glsl_mod(x: f32, y: f32) -> f32 {
    return x - y * floor(x / y);
}

fn rand(uv: vec2<f32>) -> f32 {
    let dt = dot(uv, vec2<f32>(12.9898, 78.233));
    let sn = glsl_mod(dt, PI);
    return fract(sin(sn) * 43758.5453);
}

fn rand2(p: vec2<f32>) -> vec2<f32> {
    return fract(vec2<f32>(
        sin(p.x * 591.32 + p.y * 154.077),
        cos(p.x * 391.32 + p.y * 49.077)
    ));
}
"#;
