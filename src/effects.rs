//! Optional visual modifiers layered over the raw rain signal.
//!
//! An [`EffectStack`] is built once per session from the configuration and
//! holds the enabled effects in their fixed application order:
//!
//! | Order | Effect        | Gate                     | Writes         |
//! |-------|---------------|--------------------------|----------------|
//! | 1     | Sun shower    | `has_sun`                | brightness     |
//! | 2     | Thunder       | `has_thunder`            | brightness     |
//! | 3     | Ripple        | `ripple_type != None`    | effect channel |
//! | 4     | Cursor        | always                   | effect channel |
//!
//! Brightness-stage effects run before the cycle speed is computed. Channel
//! effects start from zero every step and are combined with brightness only
//! when compositing, so they never feed back into the persisted signal.
//!
//! Each effect also knows how to emit itself as a WGSL statement block with
//! its parameters baked in as constants (see [`crate::shader`]).

use glam::Vec2;

use crate::config::{RainConfig, RippleType};
use crate::hash::{fract, rand2};
use crate::rain::harmonic_pulse;
use crate::shader::wgsl_f32;

/// Brightness below which the sun shower leaves a cell untouched.
pub const SUN_CUTOFF: f32 = -4.0;

/// Amount added to the effect channel inside a ripple annulus.
pub const RIPPLE_BOOST: f32 = 0.75;

/// Which part of the signal an effect writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EffectStage {
    /// Mutates brightness before cycle speed and rescaling.
    Brightness,
    /// Mutates the transient effect channel.
    Channel,
}

/// Per-cell inputs every effect sees.
#[derive(Clone, Copy, Debug)]
pub struct EffectContext {
    /// Elapsed time multiplied by animation speed.
    pub sim_time: f32,
    /// Cell center in normalized grid space, `(0,0)` bottom-left, `(1,1)` top-right.
    pub screen_pos: Vec2,
}

/// The two signals effects operate on.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Signal {
    /// Persisted brightness.
    pub brightness: f32,
    /// Transient highlight intensity.
    pub effect: f32,
}

/// Ring shape for ripples.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RippleShape {
    /// Max-axis distance, vertical axis scaled by glyph aspect.
    Box,
    /// Euclidean distance.
    Circle,
}

/// An expanding ring that re-centers once per tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ripple {
    pub shape: RippleShape,
    pub scale: f32,
    pub speed: f32,
    pub thickness: f32,
    pub height_to_width: f32,
}

impl Ripple {
    /// Ripple time at `sim_time`. The integer part is the tick; the
    /// fractional part is progress of the ring through that tick.
    pub fn time(&self, sim_time: f32) -> f32 {
        ripple_time(sim_time, self.speed)
    }

    /// Distance from `screen_pos` to the ring center at `ripple_time`.
    pub fn distance(&self, screen_pos: Vec2, ripple_time: f32) -> f32 {
        let p = screen_pos * 2.0 - Vec2::ONE + ripple_center_offset(ripple_time);
        match self.shape {
            RippleShape::Box => p.x.abs().max(p.y.abs() * self.height_to_width),
            RippleShape::Circle => p.length(),
        }
    }

    /// Current ring radius at `ripple_time`.
    pub fn radius(&self, ripple_time: f32) -> f32 {
        fract(ripple_time) * self.scale
    }

    /// Whether `screen_pos` lies strictly inside the annulus at `ripple_time`.
    pub fn contains(&self, screen_pos: Vec2, ripple_time: f32) -> bool {
        let value = self.radius(ripple_time) - self.distance(screen_pos, ripple_time);
        value > 0.0 && value < self.thickness
    }
}

/// `(t·0.5 + 0.2·sin t)·speed + 1`.
pub fn ripple_time(sim_time: f32, speed: f32) -> f32 {
    (sim_time * 0.5 + 0.2 * sim_time.sin()) * speed + 1.0
}

/// Pseudo-random center offset in `[-0.5, 0.5)²` for the tick containing `ripple_time`.
pub fn ripple_center_offset(ripple_time: f32) -> Vec2 {
    rand2(Vec2::new(ripple_time.floor(), 0.0)) - Vec2::splat(0.5)
}

/// Global lightning intensity in `[0, 1]` at `sim_time`.
pub fn thunder_intensity(sim_time: f32) -> f32 {
    let t = sim_time * 0.5;
    let pulse = 1.0 - harmonic_pulse(t, 0.3, 0.2);
    let flash = (pulse * 1.5).ln() * 4.0;
    if flash.is_nan() {
        0.0
    } else {
        flash.clamp(0.0, 1.0)
    }
}

/// A single modifier.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Effect {
    /// Replaces brightness with a cubic glow biased toward the top.
    SunShower,
    /// Adds a screen-wide flash, brighter near the top.
    Thunder,
    /// Boosts the effect channel inside an expanding ring.
    Ripple(Ripple),
    /// Forces the effect channel to 1 at or above `threshold`.
    Cursor { threshold: f32 },
}

impl Effect {
    /// Which signal this effect writes.
    pub fn stage(&self) -> EffectStage {
        match self {
            Effect::SunShower | Effect::Thunder => EffectStage::Brightness,
            Effect::Ripple(_) | Effect::Cursor { .. } => EffectStage::Channel,
        }
    }

    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Effect::SunShower => "sun_shower",
            Effect::Thunder => "thunder",
            Effect::Ripple(_) => "ripple",
            Effect::Cursor { .. } => "cursor",
        }
    }

    /// Apply this effect to `signal`.
    pub fn apply(&self, signal: &mut Signal, ctx: &EffectContext) {
        match self {
            Effect::SunShower => {
                if signal.brightness >= SUN_CUTOFF {
                    signal.brightness = fract(signal.brightness * 0.5).powi(3) * ctx.screen_pos.y * 1.5;
                }
            }
            Effect::Thunder => {
                let y = ctx.screen_pos.y;
                signal.brightness += thunder_intensity(ctx.sim_time) * y * y * 3.0;
            }
            Effect::Ripple(ripple) => {
                if ripple.contains(ctx.screen_pos, ripple.time(ctx.sim_time)) {
                    signal.effect += RIPPLE_BOOST;
                }
            }
            Effect::Cursor { threshold } => {
                if signal.brightness >= *threshold {
                    signal.effect = 1.0;
                }
            }
        }
    }

    /// WGSL statements implementing this effect.
    ///
    /// Expects `brightness` and `effect` as mutable `var`s and `sim_time`,
    /// `screen_pos` in scope, plus the `rand2` and `harmonic_pulse` helpers.
    pub fn to_wgsl(&self) -> String {
        match self {
            Effect::SunShower => format!(
                r#"    // Sun shower
    if (brightness >= {cutoff}) {{
        let glow = fract(brightness * 0.5);
        brightness = glow * glow * glow * screen_pos.y * 1.5;
    }}
"#,
                cutoff = wgsl_f32(SUN_CUTOFF),
            ),
            Effect::Thunder => r#"    // Thunder
    {
        let thunder_pulse = 1.0 - harmonic_pulse(sim_time * 0.5, 0.3, 0.2);
        let thunder = clamp(sanitize(log(thunder_pulse * 1.5) * 4.0), 0.0, 1.0);
        brightness = brightness + thunder * screen_pos.y * screen_pos.y * 3.0;
    }
"#
            .to_string(),
            Effect::Ripple(ripple) => {
                let distance = match ripple.shape {
                    RippleShape::Box => format!(
                        "max(abs(ripple_pos.x), abs(ripple_pos.y) * {})",
                        wgsl_f32(ripple.height_to_width)
                    ),
                    RippleShape::Circle => "length(ripple_pos)".to_string(),
                };
                format!(
                    r#"    // Ripple
    {{
        let ripple_time = (sim_time * 0.5 + 0.2 * sin(sim_time)) * {speed} + 1.0;
        let ripple_offset = rand2(vec2<f32>(floor(ripple_time), 0.0)) - vec2<f32>(0.5, 0.5);
        let ripple_pos = screen_pos * 2.0 - vec2<f32>(1.0, 1.0) + ripple_offset;
        let ripple_value = fract(ripple_time) * {scale} - {distance};
        if (ripple_value > 0.0 && ripple_value < {thickness}) {{
            effect = effect + {boost};
        }}
    }}
"#,
                    speed = wgsl_f32(ripple.speed),
                    scale = wgsl_f32(ripple.scale),
                    thickness = wgsl_f32(ripple.thickness),
                    boost = wgsl_f32(RIPPLE_BOOST),
                    distance = distance,
                )
            }
            Effect::Cursor { threshold } => format!(
                r#"    // Cursor
    if (brightness >= {threshold}) {{
        effect = 1.0;
    }}
"#,
                threshold = wgsl_f32(*threshold),
            ),
        }
    }
}

/// The enabled effects, in application order.
#[derive(Clone, Debug, PartialEq)]
pub struct EffectStack {
    effects: Vec<Effect>,
}

impl EffectStack {
    /// Select and order effects from configuration.
    pub fn from_config(config: &RainConfig) -> Self {
        let mut effects = Vec::with_capacity(4);
        if config.has_sun {
            effects.push(Effect::SunShower);
        }
        if config.has_thunder {
            effects.push(Effect::Thunder);
        }
        let shape = match config.ripple_type {
            RippleType::None => None,
            RippleType::Box => Some(RippleShape::Box),
            RippleType::Circle => Some(RippleShape::Circle),
        };
        if let Some(shape) = shape {
            effects.push(Effect::Ripple(Ripple {
                shape,
                scale: config.ripple_scale,
                speed: config.ripple_speed,
                thickness: config.ripple_thickness,
                height_to_width: config.glyph_height_to_width,
            }));
        }
        effects.push(Effect::Cursor { threshold: config.cursor_effect_threshold });
        Self { effects }
    }

    /// All effects in order.
    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    /// Effects of one stage, in order.
    pub fn stage(&self, stage: EffectStage) -> impl Iterator<Item = &Effect> {
        self.effects.iter().filter(move |e| e.stage() == stage)
    }

    /// True when no effect touches brightness.
    pub fn is_identity(&self) -> bool {
        self.stage(EffectStage::Brightness).next().is_none()
    }

    /// Run brightness-stage effects over `brightness`.
    pub fn apply_brightness(&self, brightness: f32, ctx: &EffectContext) -> f32 {
        let mut signal = Signal { brightness, effect: 0.0 };
        for effect in self.stage(EffectStage::Brightness) {
            effect.apply(&mut signal, ctx);
        }
        signal.brightness
    }

    /// Compute the effect channel from zero, given post-effect brightness.
    pub fn apply_effect_channel(&self, brightness: f32, ctx: &EffectContext) -> f32 {
        let mut signal = Signal { brightness, effect: 0.0 };
        for effect in self.stage(EffectStage::Channel) {
            effect.apply(&mut signal, ctx);
        }
        signal.effect
    }

    /// WGSL statements for one stage.
    pub fn stage_wgsl(&self, stage: EffectStage) -> String {
        self.stage(stage).map(Effect::to_wgsl).collect()
    }
}
