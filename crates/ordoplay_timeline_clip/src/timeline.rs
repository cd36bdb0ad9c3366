// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline interface driven by a clip's playhead.
//!
//! The clip only talks to its timeline through [`Timeline`]. The timeline
//! owns duration, labels, loop wrapping and frame actions; the clip decides
//! which raw position to ask for. [`FrameTimeline`] is the frame-based
//! implementation used by scene descriptions.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A seek target: frame number or named label
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayheadTarget {
    /// Absolute frame
    Frame(u32),
    /// Named label
    Label(String),
}

impl From<u32> for PlayheadTarget {
    fn from(frame: u32) -> Self {
        Self::Frame(frame)
    }
}

impl From<&str> for PlayheadTarget {
    fn from(label: &str) -> Self {
        Self::Label(label.to_string())
    }
}

impl From<String> for PlayheadTarget {
    fn from(label: String) -> Self {
        Self::Label(label)
    }
}

impl fmt::Display for PlayheadTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Frame(frame) => write!(f, "frame {frame}"),
            Self::Label(label) => write!(f, "label \"{label}\""),
        }
    }
}

/// Named labels, kept sorted by frame
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "IndexMap<String, u32>", into = "IndexMap<String, u32>")]
pub struct LabelTable {
    labels: IndexMap<String, u32>,
}

impl LabelTable {
    /// Create an empty label table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or move a label
    pub fn insert(&mut self, name: impl Into<String>, frame: u32) {
        self.labels.insert(name.into(), frame);
        self.sort_labels();
    }

    /// Frame of a label
    pub fn frame(&self, name: &str) -> Option<u32> {
        self.labels.get(name).copied()
    }

    /// The label covering a frame: the last label at or before it
    pub fn label_at(&self, frame: u32) -> Option<&str> {
        self.labels
            .iter()
            .take_while(|(_, start)| **start <= frame)
            .last()
            .map(|(name, _)| name.as_str())
    }

    /// Iterate labels in frame order
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.labels.iter().map(|(name, &frame)| (name.as_str(), frame))
    }

    /// Number of labels
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether there are no labels
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    fn sort_labels(&mut self) {
        self.labels.sort_by(|_, a, _, b| a.cmp(b));
    }
}

impl From<IndexMap<String, u32>> for LabelTable {
    fn from(labels: IndexMap<String, u32>) -> Self {
        let mut table = Self { labels };
        table.sort_labels();
        table
    }
}

impl From<LabelTable> for IndexMap<String, u32> {
    fn from(table: LabelTable) -> Self {
        table.labels
    }
}

impl<S: Into<String>> FromIterator<(S, u32)> for LabelTable {
    fn from_iter<I: IntoIterator<Item = (S, u32)>>(iter: I) -> Self {
        iter.into_iter()
            .map(|(name, frame)| (name.into(), frame))
            .collect::<IndexMap<_, _>>()
            .into()
    }
}

/// Action embedded in a timeline frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameAction {
    /// Pause the clip
    Stop,
    /// Resume the clip
    Play,
    /// Seek and pause
    GotoAndStop(PlayheadTarget),
    /// Seek and resume
    GotoAndPlay(PlayheadTarget),
    /// Named event for the host
    Event(String),
}

/// Narrow interface to the timeline engine owned by a clip
pub trait Timeline {
    /// Length in frames
    fn duration(&self) -> u32;

    /// Named labels
    fn labels(&self) -> &LabelTable;

    /// Add or move a label
    fn add_label(&mut self, name: &str, frame: u32);

    /// Whether positions wrap at the end
    fn looping(&self) -> bool;

    /// Set loop wrapping
    fn set_looping(&mut self, looping: bool);

    /// Set the position from a raw (unwrapped) position.
    ///
    /// Returns the actions of the frames crossed, or nothing when
    /// `suppress_actions` is set. A `jump` only reports actions on the
    /// destination frame.
    fn set_position(&mut self, raw: u32, suppress_actions: bool, jump: bool) -> Vec<FrameAction>;

    /// Resolved frame of the last `set_position`, `None` before the first one
    fn prev_position(&self) -> Option<u32>;

    /// Raw position of the last `set_position`
    fn prev_raw_position(&self) -> u32;

    /// Resolve a target to a frame. Unknown labels and out of range frames are `None`.
    fn resolve(&self, target: &PlayheadTarget) -> Option<u32> {
        match target {
            PlayheadTarget::Frame(frame) => (*frame < self.duration()).then_some(*frame),
            PlayheadTarget::Label(name) => self.labels().frame(name),
        }
    }

    /// The label covering a frame
    fn label_at(&self, frame: u32) -> Option<&str> {
        self.labels().label_at(frame)
    }

    /// Frame a raw position maps to, without changing anything
    fn calc_position(&self, raw: u32) -> u32 {
        let duration = self.duration();
        if duration == 0 {
            0
        } else if self.looping() {
            raw % duration
        } else {
            raw.min(duration - 1)
        }
    }
}

/// Action placed on a frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedAction {
    /// Frame the action runs on
    pub frame: u32,
    /// The action
    pub action: FrameAction,
}

/// Frame-based timeline with labels and frame actions
#[derive(Debug, Clone)]
pub struct FrameTimeline {
    /// Length in frames
    duration: u32,
    /// Named labels
    labels: LabelTable,
    /// Frame actions, sorted by frame
    actions: Vec<TimedAction>,
    /// Whether positions wrap at the end
    looping: bool,
    prev_position: Option<u32>,
    prev_raw_position: u32,
}

impl FrameTimeline {
    /// Create a timeline of the given length
    pub fn new(duration: u32) -> Self {
        Self {
            duration,
            labels: LabelTable::new(),
            actions: Vec::new(),
            looping: true,
            prev_position: None,
            prev_raw_position: 0,
        }
    }

    /// Add a label
    pub fn with_label(mut self, name: &str, frame: u32) -> Self {
        self.add_label(name, frame);
        self
    }

    /// Add a frame action
    pub fn with_action(mut self, frame: u32, action: FrameAction) -> Self {
        self.add_action(frame, action);
        self
    }

    /// Add a frame action
    pub fn add_action(&mut self, frame: u32, action: FrameAction) {
        self.actions.push(TimedAction { frame, action });
        self.actions.sort_by_key(|a| a.frame);
    }

    /// Actions on frames in `start..=end`
    pub fn actions_in_range(&self, start: u32, end: u32) -> impl Iterator<Item = &FrameAction> {
        self.actions
            .iter()
            .filter(move |a| a.frame >= start && a.frame <= end)
            .map(|a| &a.action)
    }

    /// Collect the actions crossed when moving to `position`
    fn crossed_actions(&self, position: u32, raw: u32, jump: bool) -> Vec<FrameAction> {
        let Some(prev) = self.prev_position else {
            return self.actions_in_range(position, position).cloned().collect();
        };

        if raw == self.prev_raw_position {
            return Vec::new();
        }
        if jump || raw < self.prev_raw_position {
            return self.actions_in_range(position, position).cloned().collect();
        }

        if position > prev {
            self.actions_in_range(prev + 1, position).cloned().collect()
        } else {
            // Wrapped past the end
            let last = self.duration.saturating_sub(1);
            let mut crossed: Vec<_> = if prev < last {
                self.actions_in_range(prev + 1, last).cloned().collect()
            } else {
                Vec::new()
            };
            crossed.extend(self.actions_in_range(0, position).cloned());
            crossed
        }
    }
}

impl Default for FrameTimeline {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Timeline for FrameTimeline {
    fn duration(&self) -> u32 {
        self.duration
    }

    fn labels(&self) -> &LabelTable {
        &self.labels
    }

    fn add_label(&mut self, name: &str, frame: u32) {
        self.labels.insert(name, frame);
    }

    fn looping(&self) -> bool {
        self.looping
    }

    fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    fn set_position(&mut self, raw: u32, suppress_actions: bool, jump: bool) -> Vec<FrameAction> {
        let position = self.calc_position(raw);
        // Without looping the raw position stops at the last frame
        let raw = if self.looping { raw } else { position };

        let actions = if suppress_actions {
            Vec::new()
        } else {
            self.crossed_actions(position, raw, jump)
        };

        self.prev_position = Some(position);
        self.prev_raw_position = raw;
        actions
    }

    fn prev_position(&self) -> Option<u32> {
        self.prev_position
    }

    fn prev_raw_position(&self) -> u32 {
        self.prev_raw_position
    }
}
