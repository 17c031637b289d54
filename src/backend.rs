//! Execution backends.
//!
//! A [`Session`] is the immutable, validated input of a pipeline: the
//! configuration, the effect stack selected from it and the glyph atlas. A
//! [`Backend`] owns the mutable resources (the double-buffered state grid
//! and the output frame) and runs the two stages over them.
//!
//! [`CpuBackend`] runs both stages on the rayon thread pool. The optional
//! `gpu` feature adds `GpuBackend`, which runs generated WGSL compute
//! kernels through wgpu.

use crate::atlas::GlyphAtlas;
use crate::compositor::{composite_frame, CompositeContext};
use crate::config::RainConfig;
use crate::effects::EffectStack;
use crate::error::{AllocationError, AtlasError, InitError};
use crate::frame::Frame;
use crate::projection::ViewportCover;
use crate::simulate::{simulate_grid, StepContext};
use crate::state::{CellState, StateBuffer};
use crate::time::FrameTiming;

/// Validated configuration, effects and atlas for one pipeline.
#[derive(Debug, Clone)]
pub struct Session {
    config: RainConfig,
    effects: EffectStack,
    atlas: GlyphAtlas,
}

impl Session {
    /// Validate `config` and check that `atlas` matches its layout.
    pub fn new(config: RainConfig, atlas: GlyphAtlas) -> Result<Self, InitError> {
        config.validate()?;
        if atlas.columns() != config.glyph_texture_columns {
            return Err(AtlasError::ColumnMismatch {
                atlas: atlas.columns(),
                config: config.glyph_texture_columns,
            }
            .into());
        }
        let effects = EffectStack::from_config(&config);
        Ok(Self { config, effects, atlas })
    }

    #[inline]
    pub fn config(&self) -> &RainConfig {
        &self.config
    }

    #[inline]
    pub fn effects(&self) -> &EffectStack {
        &self.effects
    }

    #[inline]
    pub fn atlas(&self) -> &GlyphAtlas {
        &self.atlas
    }

    /// Grid cells per side.
    #[inline]
    pub fn dimension(&self) -> u32 {
        self.config.num_columns
    }
}

/// A substrate that can run the simulate and composite stages.
///
/// The simulate stage must finish writing every cell before the state
/// becomes visible to [`Backend::composite`] or the next simulate call.
pub trait Backend {
    /// Short name for logging.
    fn name(&self) -> &'static str;

    /// Advance every cell by one step and publish the result.
    fn simulate(&mut self, session: &Session, timing: &FrameTiming);

    /// Render the current state into the output frame.
    fn composite(&mut self, session: &Session, cover: &ViewportCover);

    /// Reallocate the output frame for a new viewport size.
    fn resize(&mut self, width: u32, height: u32) -> Result<(), InitError>;

    /// Adopt a new session. Reallocates the grid only when its dimension changes.
    fn rebuild(&mut self, session: &Session) -> Result<(), InitError>;

    /// Return every cell to the uninitialized sentinel.
    fn reset(&mut self);

    /// The last published state, row 0 at the bottom.
    fn cells(&self) -> &[CellState];

    /// The last composited frame.
    fn frame(&self) -> &Frame;
}

/// Runs both stages on the CPU, parallelized across rows with rayon.
#[derive(Debug)]
pub struct CpuBackend {
    state: StateBuffer,
    frame: Frame,
}

impl CpuBackend {
    /// Allocate state for `session` and a `width × height` frame.
    pub fn new(session: &Session, width: u32, height: u32) -> Result<Self, AllocationError> {
        Ok(Self {
            state: StateBuffer::new(session.dimension())?,
            frame: Frame::new(width, height)?,
        })
    }
}

impl Backend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn simulate(&mut self, session: &Session, timing: &FrameTiming) {
        let ctx = StepContext::new(session.config(), session.effects(), timing.time_secs, timing.delta_frames);
        let dimension = self.state.dimension();
        let (front, back) = self.state.split_mut();
        simulate_grid(front, back, dimension, &ctx);
        self.state.swap();
    }

    fn composite(&mut self, session: &Session, cover: &ViewportCover) {
        let ctx = CompositeContext::new(session.config(), session.atlas(), *cover);
        composite_frame(self.state.front(), self.state.dimension(), &mut self.frame, &ctx);
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(), InitError> {
        if self.frame.width() == width && self.frame.height() == height {
            return Ok(());
        }
        self.frame = Frame::new(width, height)?;
        Ok(())
    }

    fn rebuild(&mut self, session: &Session) -> Result<(), InitError> {
        if session.dimension() != self.state.dimension() {
            self.state = StateBuffer::new(session.dimension())?;
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.state.reset();
    }

    fn cells(&self) -> &[CellState] {
        self.state.front()
    }

    fn frame(&self) -> &Frame {
        &self.frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;

    fn session(columns: u32) -> Session {
        let config = RainConfig::default().with_columns(columns).with_glyphs(16, 4);
        Session::new(config, GlyphAtlas::procedural(4, 8).unwrap()).unwrap()
    }

    #[test]
    fn test_session_rejects_mismatched_atlas() {
        let config = RainConfig::default();
        let atlas = GlyphAtlas::procedural(4, 8).unwrap();
        assert!(matches!(
            Session::new(config, atlas),
            Err(InitError::Atlas(AtlasError::ColumnMismatch { atlas: 4, config: 8 }))
        ));
    }

    #[test]
    fn test_session_rejects_invalid_config() {
        let config = RainConfig::default().with_columns(0);
        let atlas = GlyphAtlas::procedural(8, 8).unwrap();
        assert!(matches!(Session::new(config, atlas), Err(InitError::Config(ConfigError::EmptyGrid))));
    }

    #[test]
    fn test_cpu_backend_publishes_after_simulate() {
        let session = session(4);
        let mut backend = CpuBackend::new(&session, 8, 8).unwrap();
        assert!(backend.cells().iter().all(CellState::is_uninitialized));

        let timing = FrameTiming { time_secs: 0.0, delta_ms: 0.0, delta_frames: 0.0, frame: 0 };
        backend.simulate(&session, &timing);
        assert!(backend.cells().iter().all(|c| !c.is_uninitialized()));
    }

    #[test]
    fn test_rebuild_keeps_state_for_same_dimension() {
        let first = session(4);
        let mut backend = CpuBackend::new(&first, 8, 8).unwrap();
        let timing = FrameTiming { time_secs: 1.0, delta_ms: 0.0, delta_frames: 0.0, frame: 0 };
        backend.simulate(&first, &timing);
        let before = backend.cells().to_vec();

        backend.rebuild(&session(4)).unwrap();
        assert_eq!(backend.cells(), before.as_slice());

        backend.rebuild(&session(6)).unwrap();
        assert_eq!(backend.cells().len(), 36);
        assert!(backend.cells().iter().all(CellState::is_uninitialized));
    }

    #[test]
    fn test_resize_reallocates_frame() {
        let session = session(4);
        let mut backend = CpuBackend::new(&session, 8, 8).unwrap();
        backend.resize(16, 4).unwrap();
        assert_eq!((backend.frame().width(), backend.frame().height()), (16, 4));
    }
}
