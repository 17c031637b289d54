//! # Glyph Rain
//!
//! A procedurally animated "digital rain" of falling glyphs.
//!
//! A square grid of cells is advanced once per frame. Every cell carries a
//! brightness, a cycle phase that selects its symbol, and an effect signal.
//! A stateless fragment-style pass then maps each output pixel onto the grid
//! and draws the selected glyph out of a multi-channel signed distance field
//! atlas.
//!
//! ## Quick Start
//!
//! ```ignore
//! use glyphrain::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RainConfig::default()
//!         .with_columns(80)
//!         .with_ripple(RippleType::Circle);
//!     let atlas = GlyphAtlas::from_file("msdf_glyphs.png", config.glyph_texture_columns)?;
//!
//!     let mut pipeline = Pipeline::initialize_with_atlas(config, atlas, (1280, 720))?;
//!     for frame in 0..600 {
//!         pipeline.step(frame as f64 * 1000.0 / 60.0);
//!     }
//!     pipeline.frame().save_png("rain.png")?;
//!     Ok(())
//! }
//! ```
//!
//! ## Core Concepts
//!
//! ### Rain time
//!
//! Every cell derives a scalar phase from its column and row with
//! [`rain::rain_time`]. Columns carry a fixed random time and speed offset,
//! so drops fall at slightly different rates. Brightness and cycling speed
//! are functions of that phase.
//!
//! ### Effects
//!
//! Optional effects run in a fixed order after the base brightness is known:
//!
//! | Effect | Stage | Enabled by |
//! |--------|-------|------------|
//! | [`Effect::SunShower`] | brightness | `has_sun` |
//! | [`Effect::Thunder`] | brightness | `has_thunder` |
//! | [`Effect::Ripple`] | effect channel | `ripple_type` |
//! | [`Effect::Cursor`] | effect channel | always |
//!
//! ### Backends
//!
//! [`CpuBackend`] runs both stages on the rayon pool. With the `gpu` feature,
//! `GpuBackend` runs the same computation as generated WGSL compute kernels.
//! Both implement [`Backend`] and plug into [`Pipeline`].
//!
//! ## Logging
//!
//! The crate logs through `tracing`. Install any subscriber to see it; the
//! bundled binary uses `tracing_subscriber` with `RUST_LOG` filtering.

pub mod atlas;
pub mod backend;
pub mod compositor;
pub mod config;
pub mod effects;
pub mod error;
pub mod frame;
#[cfg(feature = "gpu")]
pub mod gpu;
pub mod hash;
pub mod pipeline;
pub mod projection;
pub mod rain;
pub mod shader;
pub mod simulate;
pub mod state;
pub mod time;

pub use atlas::GlyphAtlas;
pub use backend::{Backend, CpuBackend, Session};
pub use bytemuck;
pub use config::{CycleStyle, Projection, RainConfig, RippleType};
pub use effects::{Effect, EffectStack};
pub use error::{AllocationError, AtlasError, ConfigError, InitError};
#[cfg(feature = "gpu")]
pub use error::GpuError;
pub use frame::Frame;
pub use glam::{Vec2, Vec4};
#[cfg(feature = "gpu")]
pub use gpu::GpuBackend;
pub use pipeline::Pipeline;
pub use state::{CellState, StateBuffer};
pub use time::{DropReason, FrameClock, FrameDecision, FrameTiming};

/// Convenient re-exports for common usage.
///
/// ```ignore
/// use glyphrain::prelude::*;
/// ```
pub mod prelude {
    pub use crate::atlas::GlyphAtlas;
    pub use crate::backend::{Backend, CpuBackend};
    pub use crate::config::{CycleStyle, Projection, RainConfig, RippleType};
    pub use crate::effects::{Effect, EffectStack};
    pub use crate::error::InitError;
    pub use crate::frame::Frame;
    #[cfg(feature = "gpu")]
    pub use crate::gpu::GpuBackend;
    pub use crate::pipeline::Pipeline;
    pub use crate::state::CellState;
    pub use crate::time::{FrameDecision, FrameTiming};
    pub use crate::{Vec2, Vec4};
}
