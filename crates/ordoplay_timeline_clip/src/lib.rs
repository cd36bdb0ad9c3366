// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline clip playhead for `OrdoPlay`.
//!
//! This crate drives the playhead of animated scene nodes:
//! - Frame clock with per-clip or inherited frame rates
//! - Synched and single-frame clips nested inside parent timelines
//! - Label and frame seeking
//! - Frame actions (stop, play, goto, events)
//!
//! ## Architecture
//!
//! The engine is built on:
//! - An [`AnimatedNode`] owning a [`Timeline`] implementation
//! - A [`SceneTree`] walked top-down once per tick
//! - A [`Ticker`] with scoped subscriptions
//! - RON scene descriptions

pub mod mode;
pub mod frame_clock;
pub mod playhead;
pub mod timeline;
pub mod container;
pub mod clip;
pub mod scene;
pub mod ticker;
pub mod config;

pub use mode::SyncMode;
pub use frame_clock::{FrameClock, FrameRate, MAX_FRAMES_PER_TICK};
pub use playhead::{ClipEvent, PlayheadPosition};
pub use timeline::{FrameAction, FrameTimeline, LabelTable, PlayheadTarget, TimedAction, Timeline};
pub use container::DisplayProperties;
pub use clip::{AnimatedNode, MAX_ACTION_DEPTH};
pub use scene::{NodeId, SceneError, SceneNode, SceneTree, TickContext};
pub use ticker::{TickEvent, TickSubscription, Ticker};
pub use config::{
    load_scene, ClipSettings, ConfigError, NodeDescription, SceneDescription, TimelineDescription,
    SCENE_FORMAT_VERSION,
};
