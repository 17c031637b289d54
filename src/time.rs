//! Frame timing for the pipeline.
//!
//! The host passes its elapsed time in milliseconds to every
//! [`crate::Pipeline::step`]. A [`FrameClock`] turns those readings into
//! per-frame timing values and decides whether a frame may run at all.
//!
//! # Example
//!
//! ```ignore
//! use glyphrain::time::{FrameClock, FrameDecision};
//!
//! let mut clock = FrameClock::new();
//!
//! match clock.tick(16.0) {
//!     FrameDecision::Step(timing) => println!("t = {:.3}s, dt = {:.2} frames", timing.time_secs, timing.delta_frames),
//!     FrameDecision::Drop(reason) => println!("dropped: {}", reason),
//! }
//! ```
//!
//! # Policy
//!
//! - The first reading produces a normal step with zero delta.
//! - A gap longer than [`STALL_THRESHOLD_MS`] (tab backgrounded, debugger
//!   pause) still steps, but with zero delta, so nothing jumps.
//! - Readings that are not finite, negative, earlier than the previous
//!   reading, or beyond [`MAX_ELAPSED_MS`] drop the frame entirely.

use std::fmt;

/// Gap between readings after which the delta is clamped to zero.
pub const STALL_THRESHOLD_MS: f64 = 1000.0;

/// Largest elapsed time accepted, about 28 hours. Beyond this `f32`
/// simulation time loses too much precision to animate smoothly.
pub const MAX_ELAPSED_MS: f64 = 1.0e8;

/// Duration of one reference frame. Per-frame rates are defined at 60 Hz.
pub const REFERENCE_FRAME_MS: f64 = 1000.0 / 60.0;

/// Timing values for one accepted frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameTiming {
    /// Elapsed time in seconds.
    pub time_secs: f32,
    /// Time since the previous accepted frame in milliseconds, after clamping.
    pub delta_ms: f32,
    /// `delta_ms` in reference frames.
    pub delta_frames: f32,
    /// Index of this frame, starting at 0.
    pub frame: u64,
}

/// Why a frame was not run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DropReason {
    /// The reading was NaN or infinite.
    NonFinite,
    /// The reading was negative.
    Negative,
    /// The reading was earlier than the previous one.
    Backwards {
        previous_ms: f64,
        elapsed_ms: f64,
    },
    /// The reading exceeded [`MAX_ELAPSED_MS`].
    TooLarge,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::NonFinite => write!(f, "elapsed time is not finite"),
            DropReason::Negative => write!(f, "elapsed time is negative"),
            DropReason::Backwards { previous_ms, elapsed_ms } => {
                write!(f, "elapsed time went backwards ({}ms -> {}ms)", previous_ms, elapsed_ms)
            }
            DropReason::TooLarge => write!(f, "elapsed time exceeds {}ms", MAX_ELAPSED_MS),
        }
    }
}

/// Outcome of a [`FrameClock::tick`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FrameDecision {
    /// Run simulation and compositing with these values.
    Step(FrameTiming),
    /// Skip this frame. Clock state is unchanged.
    Drop(DropReason),
}

impl FrameDecision {
    /// The timing, if the frame runs.
    pub fn timing(&self) -> Option<&FrameTiming> {
        match self {
            FrameDecision::Step(timing) => Some(timing),
            FrameDecision::Drop(_) => None,
        }
    }

    /// Whether the frame was dropped.
    pub fn is_dropped(&self) -> bool {
        matches!(self, FrameDecision::Drop(_))
    }
}

/// Frame clock owned by a pipeline.
#[derive(Debug, Default, Clone)]
pub struct FrameClock {
    /// Last accepted reading.
    last_ms: Option<f64>,
    /// Accepted frames so far.
    frame_count: u64,
    /// Frames dropped so far.
    dropped: u64,
    /// Frames whose delta was clamped by the stall threshold.
    stalls: u64,
}

impl FrameClock {
    /// Create a clock that has seen no frames.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept or reject the reading `elapsed_ms`.
    pub fn tick(&mut self, elapsed_ms: f64) -> FrameDecision {
        if !elapsed_ms.is_finite() {
            return self.drop_frame(DropReason::NonFinite);
        }
        if elapsed_ms < 0.0 {
            return self.drop_frame(DropReason::Negative);
        }
        if elapsed_ms > MAX_ELAPSED_MS {
            return self.drop_frame(DropReason::TooLarge);
        }

        let delta_ms = match self.last_ms {
            None => 0.0,
            Some(previous_ms) if elapsed_ms < previous_ms => {
                return self.drop_frame(DropReason::Backwards { previous_ms, elapsed_ms });
            }
            Some(previous_ms) if elapsed_ms - previous_ms > STALL_THRESHOLD_MS => {
                self.stalls += 1;
                tracing::debug!(gap_ms = elapsed_ms - previous_ms, "stall detected, clamping delta");
                0.0
            }
            Some(previous_ms) => elapsed_ms - previous_ms,
        };

        let timing = FrameTiming {
            time_secs: (elapsed_ms / 1000.0) as f32,
            delta_ms: delta_ms as f32,
            delta_frames: (delta_ms / REFERENCE_FRAME_MS) as f32,
            frame: self.frame_count,
        };
        self.last_ms = Some(elapsed_ms);
        self.frame_count += 1;
        FrameDecision::Step(timing)
    }

    fn drop_frame(&mut self, reason: DropReason) -> FrameDecision {
        self.dropped += 1;
        tracing::warn!(%reason, "frame dropped");
        FrameDecision::Drop(reason)
    }

    /// Accepted frames so far.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }

    /// Dropped frames so far.
    #[inline]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Stalled frames so far.
    #[inline]
    pub fn stalls(&self) -> u64 {
        self.stalls
    }

    /// Last accepted reading, if any.
    #[inline]
    pub fn last_ms(&self) -> Option<f64> {
        self.last_ms
    }

    /// Forget all readings. The next tick is treated as a first frame.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
