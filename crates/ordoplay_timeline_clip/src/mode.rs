// SPDX-License-Identifier: MIT OR Apache-2.0
//! Synchronization modes for timeline clips.

use serde::{Deserialize, Serialize};

/// How a clip's playhead position is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SyncMode {
    /// The clip advances its own playhead from elapsed time
    #[default]
    Independent,
    /// The playhead is pinned to the clip's start position
    SingleFrame,
    /// The playhead follows the parent: start position plus synch offset
    Synched,
}

impl SyncMode {
    /// Whether the position is driven by the parent rather than the frame clock
    pub fn is_synchronized(&self) -> bool {
        !matches!(self, Self::Independent)
    }
}
