// SPDX-License-Identifier: MIT OR Apache-2.0
//! Clip settings and scene descriptions.
//!
//! Scenes are described in RON:
//! - Scene-wide frame rate
//! - Nested nodes, each with clip settings and a frame timeline
//! - Labels and frame actions per timeline
//! - Placement frame of each child inside its parent's timeline

use crate::clip::AnimatedNode;
use crate::container::DisplayProperties;
use crate::frame_clock::FrameRate;
use crate::mode::SyncMode;
use crate::scene::{NodeId, SceneError, SceneTree};
use crate::timeline::{FrameAction, FrameTimeline, LabelTable, PlayheadTarget, TimedAction};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current scene description format version
pub const SCENE_FORMAT_VERSION: u32 = 1;

/// Construction settings for a clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipSettings {
    /// Synchronization mode
    pub mode: SyncMode,
    /// Frame offset used by synchronized modes
    pub start_position: u32,
    /// Whether the timeline wraps at the end
    pub looping: bool,
    /// Start paused
    pub paused: bool,
    /// Whether frame actions run
    pub actions_enabled: bool,
    /// Own frame rate
    pub framerate: FrameRate,
    /// Labels added to the timeline
    pub labels: LabelTable,
    /// Container properties
    pub display: DisplayProperties,
}

impl Default for ClipSettings {
    fn default() -> Self {
        Self {
            mode: SyncMode::Independent,
            start_position: 0,
            looping: true,
            paused: false,
            actions_enabled: true,
            framerate: FrameRate::Inherit,
            labels: LabelTable::new(),
            display: DisplayProperties::default(),
        }
    }
}

/// Frame timeline contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineDescription {
    /// Length in frames
    pub duration: u32,
    /// Named labels
    pub labels: LabelTable,
    /// Frame actions
    pub actions: Vec<TimedAction>,
}

impl TimelineDescription {
    /// Build the timeline
    pub fn build(&self) -> FrameTimeline {
        let mut timeline = FrameTimeline::new(self.duration);
        for (name, frame) in self.labels.iter() {
            timeline = timeline.with_label(name, frame);
        }
        for action in &self.actions {
            timeline.add_action(action.frame, action.action.clone());
        }
        timeline
    }
}

/// A node and its children
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeDescription {
    /// Node name
    pub name: String,
    /// Clip settings
    pub clip: ClipSettings,
    /// Timeline contents
    pub timeline: TimelineDescription,
    /// Parent frame at which this node is placed
    pub placement_frame: u32,
    /// Child nodes
    pub children: Vec<NodeDescription>,
}

impl NodeDescription {
    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidNode {
            node: self.name.clone(),
            reason,
        };

        if self.timeline.duration == 0 {
            return Err(invalid("timeline has no frames".to_string()));
        }
        if self.clip.mode.is_synchronized() && self.clip.start_position >= self.timeline.duration {
            return Err(invalid(format!(
                "start position {} is past the last frame",
                self.clip.start_position
            )));
        }

        for action in &self.timeline.actions {
            if action.frame >= self.timeline.duration {
                return Err(invalid(format!("action on frame {} is out of range", action.frame)));
            }
            let target = match &action.action {
                FrameAction::GotoAndStop(target) | FrameAction::GotoAndPlay(target) => target,
                _ => continue,
            };
            if let PlayheadTarget::Label(label) = target {
                let known = self.timeline.labels.frame(label).is_some()
                    || self.clip.labels.frame(label).is_some();
                if !known {
                    return Err(ConfigError::UnknownLabelTarget {
                        node: self.name.clone(),
                        label: label.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Complete scene description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneDescription {
    /// Format version
    pub version: u32,
    /// Rate handed to root clips that inherit
    pub framerate: FrameRate,
    /// Top-level nodes
    pub nodes: Vec<NodeDescription>,
}

impl Default for SceneDescription {
    fn default() -> Self {
        Self {
            version: SCENE_FORMAT_VERSION,
            framerate: FrameRate::Inherit,
            nodes: Vec::new(),
        }
    }
}

impl SceneDescription {
    /// Parse a scene description from RON
    pub fn from_ron(content: &str) -> Result<Self, ConfigError> {
        let scene: SceneDescription = ron::from_str(content)?;

        if scene.version > SCENE_FORMAT_VERSION {
            return Err(ConfigError::UnsupportedVersion(scene.version));
        }

        Ok(scene)
    }

    /// Load a scene description from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let scene = Self::from_ron(&content)?;
        tracing::debug!("Loaded scene description from {}", path.display());
        Ok(scene)
    }

    /// Serialize to RON
    pub fn to_ron(&self) -> Result<String, ConfigError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    /// Save the scene description to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }

    /// Build the scene tree
    pub fn build(&self) -> Result<SceneTree<FrameTimeline>, ConfigError> {
        let mut scene = SceneTree::new();
        scene.framerate = self.framerate;

        for node in &self.nodes {
            node.validate()?;
            let id = scene.add_root(node.name.clone(), Self::build_clip(node));
            Self::build_children(&mut scene, id, &node.children)?;
        }

        Ok(scene)
    }

    fn build_children(
        scene: &mut SceneTree<FrameTimeline>,
        parent: NodeId,
        children: &[NodeDescription],
    ) -> Result<(), ConfigError> {
        for child in children {
            child.validate()?;
            let id = scene.add_child(
                parent,
                child.name.clone(),
                Self::build_clip(child),
                child.placement_frame,
            )?;
            Self::build_children(scene, id, &child.children)?;
        }
        Ok(())
    }

    fn build_clip(node: &NodeDescription) -> AnimatedNode<FrameTimeline> {
        AnimatedNode::new(node.timeline.build(), &node.clip)
    }
}

/// Load and build a scene from a RON file
pub fn load_scene(path: &Path) -> Result<SceneTree<FrameTimeline>, ConfigError> {
    SceneDescription::load(path)?.build()
}

/// Error loading or building a scene description
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// RON could not be parsed
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// RON could not be written
    #[error("Serialization error: {0}")]
    Serialize(#[from] ron::Error),

    /// Written by a newer version
    #[error("Scene version {0} is newer than supported version {max}", max = SCENE_FORMAT_VERSION)]
    UnsupportedVersion(u32),

    /// Frame action seeks to a label the timeline does not have
    #[error("Node {node}: frame action targets unknown label \"{label}\"")]
    UnknownLabelTarget {
        /// Node name
        node: String,
        /// Missing label
        label: String,
    },

    /// Node settings are inconsistent
    #[error("Node {node}: {reason}")]
    InvalidNode {
        /// Node name
        node: String,
        /// What is wrong
        reason: String,
    },

    /// Scene structure error
    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),
}

#[cfg(test)]
mod tests {
    use super::*;

    const WALK_SCENE: &str = r#"(
        version: 1,
        framerate: Fixed(10.0),
        nodes: [
            (
                name: "character",
                timeline: (
                    duration: 20,
                    labels: { "idle": 0, "walk": 10 },
                    actions: [
                        (frame: 5, action: Event("step")),
                        (frame: 19, action: GotoAndPlay(Label("walk"))),
                    ],
                ),
                children: [
                    (
                        name: "legs",
                        clip: (mode: Synched),
                        timeline: (duration: 20),
                        placement_frame: 2,
                    ),
                    (
                        name: "badge",
                        clip: (mode: SingleFrame, start_position: 3),
                        timeline: (duration: 4),
                    ),
                ],
            ),
        ],
    )"#;

    #[test]
    fn test_default_settings() {
        let settings = ClipSettings::default();
        assert_eq!(settings.mode, SyncMode::Independent);
        assert!(settings.looping);
        assert!(settings.actions_enabled);
        assert!(!settings.paused);
        assert!(settings.labels.is_empty());
    }

    #[test]
    fn test_build_scene() {
        let description = SceneDescription::from_ron(WALK_SCENE).unwrap();
        let mut scene = description.build().unwrap();
        assert_eq!(scene.node_count(), 3);

        let character = scene.find("character").unwrap();
        let legs = scene.find("legs").unwrap();
        let badge = scene.find("badge").unwrap();

        // 10fps, 100ms per tick
        for _ in 0..6 {
            scene.tick(Some(100.0));
        }

        assert_eq!(scene.clip(character).unwrap().current_frame(), 5);
        assert_eq!(scene.clip(legs).unwrap().current_frame(), 3);
        assert_eq!(scene.clip(badge).unwrap().current_frame(), 3);

        let events = scene.clip_mut(character).unwrap().take_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "step");
    }

    #[test]
    fn test_sample_scene_builds() {
        let description =
            SceneDescription::from_ron(include_str!("../scenes/walk_cycle.ron")).unwrap();
        let scene = description.build().unwrap();
        assert_eq!(scene.node_count(), 4);
        assert_eq!(scene.framerate, FrameRate::Fixed(24.0));
    }

    #[test]
    fn test_save_and_load_scene() {
        let description = SceneDescription::from_ron(WALK_SCENE).unwrap();
        let path = std::env::temp_dir().join(format!("walk_scene_{}.ron", NodeId::new().0));

        description.save(&path).unwrap();
        let scene = load_scene(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert!(scene.find("legs").is_some());
        assert!(matches!(load_scene(&path), Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_serialization() {
        let description = SceneDescription::from_ron(WALK_SCENE).unwrap();
        let ron_str = description.to_ron().unwrap();
        let loaded = SceneDescription::from_ron(&ron_str).unwrap();
        assert_eq!(loaded, description);
    }

    #[test]
    fn test_unknown_label_target() {
        let content = r#"(
            nodes: [(
                name: "broken",
                timeline: (
                    duration: 5,
                    actions: [(frame: 1, action: GotoAndStop(Label("nowhere")))],
                ),
            )],
        )"#;

        let description = SceneDescription::from_ron(content).unwrap();
        assert!(matches!(
            description.build(),
            Err(ConfigError::UnknownLabelTarget { .. })
        ));
    }

    #[test]
    fn test_invalid_nodes() {
        let empty = r#"(nodes: [(name: "empty")])"#;
        assert!(matches!(
            SceneDescription::from_ron(empty).unwrap().build(),
            Err(ConfigError::InvalidNode { .. })
        ));

        let pinned_past_end = r#"(nodes: [(
            name: "pinned",
            clip: (mode: SingleFrame, start_position: 9),
            timeline: (duration: 4),
        )])"#;
        assert!(matches!(
            SceneDescription::from_ron(pinned_past_end).unwrap().build(),
            Err(ConfigError::InvalidNode { .. })
        ));
    }

    #[test]
    fn test_newer_version_rejected() {
        let result = SceneDescription::from_ron("(version: 99)");
        assert!(matches!(result, Err(ConfigError::UnsupportedVersion(99))));
        if let Err(e) = result {
            assert_eq!(
                e.to_string(),
                format!("Scene version 99 is newer than supported version {SCENE_FORMAT_VERSION}")
            );
        }
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            SceneDescription::from_ron("(nodes: [oops"),
            Err(ConfigError::Parse(_))
        ));
    }
}
