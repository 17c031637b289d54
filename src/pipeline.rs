//! The per-frame driver.
//!
//! A [`Pipeline`] owns the session, the backend with its state buffers, the
//! frame clock and the viewport coverage. Each [`Pipeline::step`] asks the
//! clock whether the frame may run, then simulates once and composites
//! once. Stages never overlap: the backend publishes the new state before
//! compositing reads it.
//!
//! # Example
//!
//! ```ignore
//! use glyphrain::prelude::*;
//!
//! let config = RainConfig::default().with_columns(60);
//! let atlas = GlyphAtlas::procedural(config.glyph_texture_columns, 64)?;
//! let mut pipeline = Pipeline::initialize_with_atlas(config, atlas, (640, 480))?;
//!
//! for frame in 0..120 {
//!     pipeline.step(frame as f64 * 16.0);
//! }
//! pipeline.frame().save_png("rain.png")?;
//! ```

use image::RgbaImage;

use crate::atlas::GlyphAtlas;
use crate::backend::{Backend, CpuBackend, Session};
use crate::config::RainConfig;
use crate::effects::EffectStack;
use crate::error::InitError;
use crate::frame::Frame;
use crate::projection::ViewportCover;
use crate::state::CellState;
use crate::time::{FrameClock, FrameDecision};

/// Glyph rain pipeline over backend `B`.
pub struct Pipeline<B: Backend = CpuBackend> {
    session: Session,
    backend: B,
    clock: FrameClock,
    cover: ViewportCover,
}

impl Pipeline<CpuBackend> {
    /// Create a CPU pipeline from a configuration and an atlas image.
    ///
    /// # Errors
    ///
    /// Fails without creating anything if the configuration is invalid, the
    /// atlas image cannot be divided into `glyph_texture_columns²` cells, or
    /// buffers cannot be allocated.
    pub fn initialize(config: RainConfig, atlas_image: RgbaImage, viewport: (u32, u32)) -> Result<Self, InitError> {
        let atlas = GlyphAtlas::new(atlas_image, config.glyph_texture_columns)?;
        Self::initialize_with_atlas(config, atlas, viewport)
    }

    /// Create a CPU pipeline from an already loaded atlas.
    pub fn initialize_with_atlas(config: RainConfig, atlas: GlyphAtlas, viewport: (u32, u32)) -> Result<Self, InitError> {
        Self::initialize_with(config, atlas, viewport, |session, width, height| {
            Ok(CpuBackend::new(session, width, height)?)
        })
    }
}

impl<B: Backend> Pipeline<B> {
    /// Create a pipeline whose backend is built by `factory`.
    pub fn initialize_with<F>(config: RainConfig, atlas: GlyphAtlas, viewport: (u32, u32), factory: F) -> Result<Self, InitError>
    where
        F: FnOnce(&Session, u32, u32) -> Result<B, InitError>,
    {
        let session = Session::new(config, atlas)?;
        let (width, height) = viewport;
        let backend = factory(&session, width, height)?;

        tracing::info!(
            backend = backend.name(),
            columns = session.dimension(),
            width,
            height,
            effects = ?session.effects().effects().iter().map(|e| e.name()).collect::<Vec<_>>(),
            "glyph rain pipeline initialized"
        );

        Ok(Self {
            session,
            backend,
            clock: FrameClock::new(),
            cover: ViewportCover::new(width, height),
        })
    }

    /// Advance one frame at host time `elapsed_ms` and composite it.
    ///
    /// Returns the clock's decision. A dropped frame leaves state, frame and
    /// clock untouched.
    pub fn step(&mut self, elapsed_ms: f64) -> FrameDecision {
        let decision = self.clock.tick(elapsed_ms);
        if let FrameDecision::Step(timing) = &decision {
            let _frame = tracing::debug_span!("frame", index = timing.frame).entered();
            tracing::debug_span!("simulate").in_scope(|| self.backend.simulate(&self.session, timing));
            tracing::debug_span!("composite").in_scope(|| self.backend.composite(&self.session, &self.cover));
            tracing::trace!(time_secs = timing.time_secs, delta_frames = timing.delta_frames, "frame complete");
        }
        decision
    }

    /// Change the viewport size. The grid is not touched.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), InitError> {
        self.backend.resize(width, height)?;
        self.cover = ViewportCover::new(width, height);
        tracing::info!(width, height, "viewport resized");
        Ok(())
    }

    /// Replace the configuration.
    ///
    /// The state grid survives unless `num_columns` changes, in which case it
    /// is reallocated and every cell reseeds. On error the pipeline keeps its
    /// previous configuration.
    pub fn reconfigure(&mut self, config: RainConfig) -> Result<(), InitError> {
        let session = Session::new(config, self.session.atlas().clone())?;
        let reallocate = session.dimension() != self.session.dimension();
        self.backend.rebuild(&session)?;
        if reallocate {
            tracing::info!(columns = session.dimension(), "grid reallocated");
        }
        self.session = session;
        Ok(())
    }

    /// Clear the grid and the clock, as if freshly initialized.
    pub fn reset(&mut self) {
        self.backend.reset();
        self.clock.reset();
    }

    /// The last published cell state, row-major with row 0 at the bottom.
    pub fn cells(&self) -> &[CellState] {
        self.backend.cells()
    }

    /// The last composited frame, top row first.
    pub fn frame(&self) -> &Frame {
        self.backend.frame()
    }

    /// Frames run so far.
    pub fn frame_count(&self) -> u64 {
        self.clock.frame()
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    pub fn config(&self) -> &RainConfig {
        self.session.config()
    }

    pub fn effects(&self) -> &EffectStack {
        self.session.effects()
    }

    pub fn viewport(&self) -> &ViewportCover {
        &self.cover
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Grid cells per side.
    pub fn dimension(&self) -> u32 {
        self.session.dimension()
    }
}
