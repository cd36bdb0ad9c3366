// SPDX-License-Identifier: MIT OR Apache-2.0
//! Display properties shared by every scene node.

use serde::{Deserialize, Serialize};

/// Container fields read by the scene walk
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayProperties {
    /// Visibility flag
    pub visible: bool,
    /// Opacity (0.0 - 1.0)
    pub alpha: f32,
    /// Horizontal scale
    pub scale_x: f32,
    /// Vertical scale
    pub scale_y: f32,
    /// Whether the node and its children receive ticks
    pub tick_enabled: bool,
}

impl DisplayProperties {
    /// Whether the node would draw anything
    pub fn is_visible(&self) -> bool {
        self.visible && self.alpha > 0.0 && self.scale_x != 0.0 && self.scale_y != 0.0
    }
}

impl Default for DisplayProperties {
    fn default() -> Self {
        Self {
            visible: true,
            alpha: 1.0,
            scale_x: 1.0,
            scale_y: 1.0,
            tick_enabled: true,
        }
    }
}
