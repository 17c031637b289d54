//! Session configuration for the glyph rain.
//!
//! A [`RainConfig`] is a flat record of named numeric, boolean and enum
//! fields. It is immutable for the lifetime of a pipeline; only a change to
//! `num_columns` forces the state grid to be reallocated.
//!
//! # Example
//!
//! ```ignore
//! use glyphrain::prelude::*;
//!
//! let config = RainConfig::default()
//!     .with_columns(108)
//!     .with_fall_speed(0.65)
//!     .with_ripple(RippleType::Box)
//!     .with_slant(22.5_f32.to_radians());
//! config.validate()?;
//! ```
//!
//! Configurations can also be loaded from JSON. Missing fields take their
//! default values:
//!
//! ```ignore
//! let config = RainConfig::from_json(r#"{ "num_columns": 60, "has_thunder": true }"#)?;
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How fast a glyph cycles through the symbol sequence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStyle {
    /// Bright glyphs hold their symbol; dimming glyphs cycle faster.
    /// Speed is `(1 - brightness)⁴` while brightness is positive, zero otherwise.
    #[default]
    DecayCoupled,
    /// Cycling speed follows its own double-harmonic pulse, independent of brightness.
    UniformDrift,
}

/// Shape of the periodic pulse highlighting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RippleType {
    /// No ripples.
    #[default]
    None,
    /// Square rings (max-axis distance, aspect corrected).
    Box,
    /// Circular rings (Euclidean distance).
    Circle,
}

/// Geometric remap applied when compositing. Exactly one is active.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Projection {
    /// Rotate the grid by `angle` radians, scaled so the viewport stays covered.
    Slant {
        /// Slant angle in radians.
        angle: f32,
    },
    /// Glyphs radiate outward and downward from a point above the viewport.
    Polar,
}

impl Default for Projection {
    fn default() -> Self {
        Projection::Slant { angle: 0.0 }
    }
}

/// Complete configuration of a glyph rain session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RainConfig {
    /// Grid is `num_columns × num_columns` cells.
    pub num_columns: u32,
    /// Number of distinct glyphs a cell cycles through.
    pub glyph_sequence_length: u32,
    /// Atlas layout: the atlas is a `columns × columns` grid of glyphs.
    pub glyph_texture_columns: u32,

    /// Global time multiplier.
    pub animation_speed: f32,
    /// Speed of the falling pulse.
    pub fall_speed: f32,
    /// Speed of symbol cycling.
    pub cycle_speed: f32,
    /// Vertical stretch of each raindrop. Shorter drops give longer tails.
    pub raindrop_length: f32,
    /// Glyph aspect ratio (height / width).
    pub glyph_height_to_width: f32,

    /// Brightness floor below which values are left unscaled.
    pub brightness_minimum: f32,
    /// Multiplier applied to brightness above the floor.
    pub brightness_multiplier: f32,
    /// Offset applied to brightness above the floor.
    pub brightness_offset: f32,
    /// Temporal blend with the previous brightness (1 = replace, 0 = frozen).
    pub brightness_mix: f32,

    /// Symbol cycling behaviour.
    pub cycle_style: CycleStyle,

    /// Pulse shape, or none.
    pub ripple_type: RippleType,
    /// Radius growth of a pulse over one tick.
    pub ripple_scale: f32,
    /// Ticks per unit of simulation time.
    pub ripple_speed: f32,
    /// Width of the pulse annulus.
    pub ripple_thickness: f32,

    /// Top-down ambient glow.
    pub has_sun: bool,
    /// Screen-wide lightning flashes.
    pub has_thunder: bool,
    /// Brightness at or above which a glyph is fully highlighted.
    pub cursor_effect_threshold: f32,

    /// Slant or polar projection.
    pub projection: Projection,
    /// Fraction of each glyph cell cropped at the edges (0..1).
    pub glyph_edge_crop: f32,
    /// Lower values start fading glyphs at larger on-screen sizes.
    pub glyph_sharpness: f32,

    /// Render the raw simulation state instead of glyphs.
    pub show_computation_texture: bool,
}

impl Default for RainConfig {
    fn default() -> Self {
        Self {
            num_columns: 80,
            glyph_sequence_length: 57,
            glyph_texture_columns: 8,
            animation_speed: 1.0,
            fall_speed: 1.0,
            cycle_speed: 1.0,
            raindrop_length: 1.0,
            glyph_height_to_width: 1.0,
            brightness_minimum: 0.0,
            brightness_multiplier: 1.0,
            brightness_offset: 0.0,
            brightness_mix: 1.0,
            cycle_style: CycleStyle::DecayCoupled,
            ripple_type: RippleType::None,
            ripple_scale: 30.0,
            ripple_speed: 0.2,
            ripple_thickness: 0.2,
            has_sun: false,
            has_thunder: false,
            cursor_effect_threshold: 1.0,
            projection: Projection::default(),
            glyph_edge_crop: 0.0,
            glyph_sharpness: 0.5,
            show_computation_texture: false,
        }
    }
}

impl RainConfig {
    /// Parse a JSON configuration and validate it.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: RainConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every field for consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_columns == 0 {
            return Err(ConfigError::EmptyGrid);
        }
        if self.glyph_sequence_length == 0 {
            return Err(ConfigError::EmptyGlyphSequence);
        }
        if self.glyph_texture_columns == 0 {
            return Err(ConfigError::ZeroAtlasColumns);
        }
        let capacity = self.glyph_texture_columns.saturating_mul(self.glyph_texture_columns);
        if self.glyph_sequence_length > capacity {
            return Err(ConfigError::SequenceExceedsAtlas {
                sequence_length: self.glyph_sequence_length,
                capacity,
            });
        }

        for (field, value) in self.numeric_fields() {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { field });
            }
        }

        if self.raindrop_length == 0.0 {
            return Err(ConfigError::OutOfRange { field: "raindrop_length", value: self.raindrop_length });
        }
        if self.glyph_height_to_width <= 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "glyph_height_to_width",
                value: self.glyph_height_to_width,
            });
        }
        if !(0.0..=1.0).contains(&self.brightness_mix) {
            return Err(ConfigError::OutOfRange { field: "brightness_mix", value: self.brightness_mix });
        }
        if !(0.0..=1.0).contains(&self.glyph_edge_crop) {
            return Err(ConfigError::OutOfRange { field: "glyph_edge_crop", value: self.glyph_edge_crop });
        }
        if self.glyph_sharpness <= 0.0 {
            return Err(ConfigError::OutOfRange { field: "glyph_sharpness", value: self.glyph_sharpness });
        }
        Ok(())
    }

    fn numeric_fields(&self) -> [(&'static str, f32); 16] {
        let slant = match self.projection {
            Projection::Slant { angle } => angle,
            Projection::Polar => 0.0,
        };
        [
            ("animation_speed", self.animation_speed),
            ("fall_speed", self.fall_speed),
            ("cycle_speed", self.cycle_speed),
            ("raindrop_length", self.raindrop_length),
            ("glyph_height_to_width", self.glyph_height_to_width),
            ("brightness_minimum", self.brightness_minimum),
            ("brightness_multiplier", self.brightness_multiplier),
            ("brightness_offset", self.brightness_offset),
            ("brightness_mix", self.brightness_mix),
            ("ripple_scale", self.ripple_scale),
            ("ripple_speed", self.ripple_speed),
            ("ripple_thickness", self.ripple_thickness),
            ("cursor_effect_threshold", self.cursor_effect_threshold),
            ("glyph_edge_crop", self.glyph_edge_crop),
            ("glyph_sharpness", self.glyph_sharpness),
            ("projection.angle", slant),
        ]
    }

    /// Total number of grid cells.
    pub fn total_cells(&self) -> usize {
        self.num_columns as usize * self.num_columns as usize
    }

    /// Set the grid dimension.
    pub fn with_columns(mut self, num_columns: u32) -> Self {
        self.num_columns = num_columns;
        self
    }

    /// Set the glyph sequence length and atlas layout.
    pub fn with_glyphs(mut self, sequence_length: u32, texture_columns: u32) -> Self {
        self.glyph_sequence_length = sequence_length;
        self.glyph_texture_columns = texture_columns;
        self
    }

    /// Set the global animation speed.
    pub fn with_animation_speed(mut self, speed: f32) -> Self {
        self.animation_speed = speed;
        self
    }

    /// Set the fall speed.
    pub fn with_fall_speed(mut self, speed: f32) -> Self {
        self.fall_speed = speed;
        self
    }

    /// Set the cycle speed.
    pub fn with_cycle_speed(mut self, speed: f32) -> Self {
        self.cycle_speed = speed;
        self
    }

    /// Set the cycle style.
    pub fn with_cycle_style(mut self, style: CycleStyle) -> Self {
        self.cycle_style = style;
        self
    }

    /// Set the raindrop length.
    pub fn with_raindrop_length(mut self, length: f32) -> Self {
        self.raindrop_length = length;
        self
    }

    /// Set brightness floor, multiplier and offset.
    pub fn with_brightness(mut self, minimum: f32, multiplier: f32, offset: f32) -> Self {
        self.brightness_minimum = minimum;
        self.brightness_multiplier = multiplier;
        self.brightness_offset = offset;
        self
    }

    /// Set the temporal brightness blend (clamped to 0..1).
    pub fn with_brightness_mix(mut self, mix: f32) -> Self {
        self.brightness_mix = mix.clamp(0.0, 1.0);
        self
    }

    /// Enable a ripple shape with the current scale, speed and thickness.
    pub fn with_ripple(mut self, ripple_type: RippleType) -> Self {
        self.ripple_type = ripple_type;
        self
    }

    /// Set ripple scale, speed and thickness.
    pub fn with_ripple_params(mut self, scale: f32, speed: f32, thickness: f32) -> Self {
        self.ripple_scale = scale;
        self.ripple_speed = speed;
        self.ripple_thickness = thickness;
        self
    }

    /// Toggle the ambient glow.
    pub fn with_sun(mut self, enabled: bool) -> Self {
        self.has_sun = enabled;
        self
    }

    /// Toggle lightning flashes.
    pub fn with_thunder(mut self, enabled: bool) -> Self {
        self.has_thunder = enabled;
        self
    }

    /// Set the cursor highlight threshold.
    pub fn with_cursor_threshold(mut self, threshold: f32) -> Self {
        self.cursor_effect_threshold = threshold;
        self
    }

    /// Use the slant projection with `angle` radians.
    pub fn with_slant(mut self, angle: f32) -> Self {
        self.projection = Projection::Slant { angle };
        self
    }

    /// Use the polar projection.
    pub fn with_polar(mut self) -> Self {
        self.projection = Projection::Polar;
        self
    }

    /// Set glyph aspect ratio.
    pub fn with_glyph_height_to_width(mut self, ratio: f32) -> Self {
        self.glyph_height_to_width = ratio;
        self
    }

    /// Set glyph edge crop (clamped to 0..1).
    pub fn with_edge_crop(mut self, crop: f32) -> Self {
        self.glyph_edge_crop = crop.clamp(0.0, 1.0);
        self
    }

    /// Set the glyph sharpness.
    pub fn with_sharpness(mut self, sharpness: f32) -> Self {
        self.glyph_sharpness = sharpness;
        self
    }

    /// Toggle the raw state debug view.
    pub fn with_computation_texture(mut self, enabled: bool) -> Self {
        self.show_computation_texture = enabled;
        self
    }
}
