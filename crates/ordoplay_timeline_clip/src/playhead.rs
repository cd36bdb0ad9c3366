// SPDX-License-Identifier: MIT OR Apache-2.0
//! Playhead position bookkeeping.

/// Last resolved position of a clip's playhead
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayheadPosition {
    /// Never positioned
    #[default]
    Unpositioned,
    /// Seeked before any resolution; the next resolution must not short-circuit
    PendingForce,
    /// Resolved to a frame
    Positioned(u32),
}

impl PlayheadPosition {
    /// Whether no position has been resolved or requested yet
    pub fn is_unpositioned(&self) -> bool {
        matches!(self, Self::Unpositioned)
    }

    /// The resolved frame, if any
    pub fn frame(&self) -> Option<u32> {
        match self {
            Self::Positioned(frame) => Some(*frame),
            Self::Unpositioned | Self::PendingForce => None,
        }
    }

    /// Whether this matches the timeline's reported position
    pub fn matches(&self, timeline_position: Option<u32>) -> bool {
        match (self, timeline_position) {
            (Self::Positioned(frame), Some(reported)) => *frame == reported,
            (Self::Unpositioned, None) => true,
            _ => false,
        }
    }
}

/// Named event emitted by a frame action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipEvent {
    /// Frame the playhead was on when the event fired
    pub frame: u32,
    /// Event name
    pub name: String,
}
