// SPDX-License-Identifier: MIT OR Apache-2.0
//! Frame rate resolution and elapsed-time to frame conversion.
//!
//! A clip either has its own frame rate, inherits the rate of its nearest
//! independent ancestor, or advances exactly one frame per tick. The rate is
//! resolved top-down while walking the scene, so each clip receives the
//! inherited value as an argument instead of looking up its parents.

use serde::{Deserialize, Serialize};

/// Upper bound on frames advanced by a single tick. Longer stalls drop the
/// excess time instead of replaying every missed frame.
pub const MAX_FRAMES_PER_TICK: u32 = 1000;

/// Target frame rate of a clip
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum FrameRate {
    /// Use the rate of the nearest independent ancestor
    #[default]
    Inherit,
    /// One frame per tick, elapsed time is ignored. Stops inheritance.
    TickSynchronous,
    /// Fixed frames per second
    Fixed(f32),
}

impl FrameRate {
    /// Create a fixed rate. Non-finite or non-positive rates become tick-synchronous.
    pub fn fixed(fps: f32) -> Self {
        if fps.is_finite() && fps > 0.0 {
            Self::Fixed(fps)
        } else {
            Self::TickSynchronous
        }
    }

    /// Resolve this rate against the rate inherited from the parent chain
    pub fn resolve(self, inherited: FrameRate) -> FrameRate {
        match self {
            Self::Inherit => inherited,
            Self::Fixed(fps) => Self::fixed(fps),
            Self::TickSynchronous => Self::TickSynchronous,
        }
    }

    /// Frames per second, if this is a usable fixed rate
    pub fn fps(&self) -> Option<f32> {
        match *self {
            Self::Fixed(fps) if fps.is_finite() && fps > 0.0 => Some(fps),
            _ => None,
        }
    }

    /// Duration of one frame in milliseconds
    pub fn frame_duration_ms(&self) -> Option<f64> {
        self.fps().map(|fps| 1000.0 / f64::from(fps))
    }
}

/// Converts elapsed wall-clock time into whole frames, carrying the remainder
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameClock {
    /// Fraction of a frame left over from previous ticks
    remainder: f64,
}

impl FrameClock {
    /// Create a clock with no carried time
    pub fn new() -> Self {
        Self { remainder: 0.0 }
    }

    /// Number of frames to advance for this tick.
    ///
    /// Without a fixed rate, or without an elapsed time, exactly one frame is
    /// advanced and the remainder is dropped. At most [`MAX_FRAMES_PER_TICK`]
    /// frames are returned; when capped the remainder is dropped too.
    pub fn frames_for(&mut self, elapsed_ms: Option<f64>, rate: FrameRate) -> u32 {
        let (Some(elapsed), Some(frame_ms)) = (
            elapsed_ms.filter(|ms| ms.is_finite()),
            rate.frame_duration_ms(),
        ) else {
            self.remainder = 0.0;
            return 1;
        };

        let t = elapsed.max(0.0) / frame_ms + self.remainder;
        let frames = t.floor();
        if frames >= f64::from(MAX_FRAMES_PER_TICK) {
            self.remainder = 0.0;
            return MAX_FRAMES_PER_TICK;
        }
        self.remainder = t - frames;
        frames as u32
    }

    /// Carried sub-frame time, in frames
    pub fn remainder(&self) -> f64 {
        self.remainder
    }

    /// Drop any carried time
    pub fn reset(&mut self) {
        self.remainder = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_rates_are_tick_synchronous() {
        assert_eq!(FrameRate::fixed(0.0), FrameRate::TickSynchronous);
        assert_eq!(FrameRate::fixed(-1.0), FrameRate::TickSynchronous);
        assert_eq!(FrameRate::fixed(f32::NAN), FrameRate::TickSynchronous);
        assert_eq!(FrameRate::fixed(30.0).fps(), Some(30.0));
    }

    #[test]
    fn test_resolve_against_inherited() {
        let parent = FrameRate::fixed(24.0);
        assert_eq!(FrameRate::Inherit.resolve(parent), parent);
        assert_eq!(FrameRate::fixed(60.0).resolve(parent), FrameRate::Fixed(60.0));
        assert_eq!(
            FrameRate::TickSynchronous.resolve(parent),
            FrameRate::TickSynchronous
        );
        // A rate loaded from settings is revalidated
        assert_eq!(
            FrameRate::Fixed(0.0).resolve(parent),
            FrameRate::TickSynchronous
        );
    }

    #[test]
    fn test_tick_synchronous_ignores_elapsed() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.frames_for(Some(500.0), FrameRate::Inherit), 1);
        assert_eq!(clock.frames_for(Some(0.0), FrameRate::TickSynchronous), 1);
        assert_eq!(clock.frames_for(None, FrameRate::fixed(30.0)), 1);
        assert_eq!(clock.remainder(), 0.0);
    }

    #[test]
    fn test_remainder_is_carried() {
        let mut clock = FrameClock::new();
        let rate = FrameRate::fixed(24.0);
        // 60Hz display driving a 24fps clip: 0.4 frames per tick
        let elapsed = 1000.0 / 60.0;

        let mut total = 0u32;
        for _ in 0..1000 {
            total += clock.frames_for(Some(elapsed), rate);
        }

        assert!((399..=400).contains(&total), "advanced {total} frames");
        assert!(clock.remainder() < 1.0);
    }

    #[test]
    fn test_negative_elapsed_advances_nothing() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.frames_for(Some(-100.0), FrameRate::fixed(30.0)), 0);
    }

    #[test]
    fn test_long_stall_is_capped() {
        let mut clock = FrameClock::new();
        let rate = FrameRate::fixed(10.0);
        assert_eq!(clock.frames_for(Some(1.0e12), rate), MAX_FRAMES_PER_TICK);
        assert_eq!(clock.frames_for(Some(f64::MAX), rate), MAX_FRAMES_PER_TICK);
        assert_eq!(clock.remainder(), 0.0);

        // Normal ticks are unaffected afterwards
        assert_eq!(clock.frames_for(Some(250.0), rate), 2);
        assert!((clock.remainder() - 0.5).abs() < 1e-9);
    }
}
