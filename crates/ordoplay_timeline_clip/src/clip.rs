// SPDX-License-Identifier: MIT OR Apache-2.0
//! Animated scene node driving a timeline playhead.
//!
//! An [`AnimatedNode`] owns its [`Timeline`] and decides which raw position
//! the timeline should be at:
//! - `Independent` clips advance from elapsed time through a [`FrameClock`]
//! - `Synched` clips sit at `start_position + synch_offset`, where the offset
//!   is handed down by the parent during the scene walk
//! - `SingleFrame` clips stay on `start_position`

use crate::config::ClipSettings;
use crate::container::DisplayProperties;
use crate::frame_clock::{FrameClock, FrameRate};
use crate::mode::SyncMode;
use crate::playhead::{ClipEvent, PlayheadPosition};
use crate::timeline::{FrameAction, LabelTable, PlayheadTarget, Timeline};

/// Maximum nesting of goto actions triggered by frame actions
pub const MAX_ACTION_DEPTH: u32 = 8;

/// A timeline clip in the scene
#[derive(Debug, Clone)]
pub struct AnimatedNode<T: Timeline> {
    /// Container properties
    pub display: DisplayProperties,
    /// Synchronization mode, read on every resolution
    pub mode: SyncMode,
    /// Whether the timeline wraps at the end
    pub looping: bool,
    /// Whether independent advancement is paused
    pub paused: bool,
    /// Whether frame actions run
    pub actions_enabled: bool,
    /// Own frame rate
    pub framerate: FrameRate,
    start_position: u32,
    current_frame: u32,
    effective_framerate: FrameRate,
    resolved: PlayheadPosition,
    requested_position: u32,
    clock: FrameClock,
    synch_offset: u32,
    timeline: T,
    events: Vec<ClipEvent>,
    action_depth: u32,
}

impl<T: Timeline> AnimatedNode<T> {
    /// Create a clip that takes ownership of its timeline
    pub fn new(mut timeline: T, settings: &ClipSettings) -> Self {
        for (name, frame) in settings.labels.iter() {
            timeline.add_label(name, frame);
        }
        timeline.set_looping(settings.looping);

        Self {
            display: settings.display,
            mode: settings.mode,
            looping: settings.looping,
            paused: settings.paused,
            actions_enabled: settings.actions_enabled,
            framerate: settings.framerate,
            start_position: settings.start_position,
            current_frame: 0,
            effective_framerate: FrameRate::Inherit,
            resolved: PlayheadPosition::Unpositioned,
            requested_position: 0,
            clock: FrameClock::new(),
            synch_offset: 0,
            timeline,
            events: Vec::new(),
            action_depth: 0,
        }
    }

    /// Advance an independent clip by the frames `elapsed_ms` covers.
    ///
    /// `inherited` is the rate resolved by the nearest independent ancestor.
    /// Without an elapsed time or a fixed rate the clip advances one frame.
    /// Synchronized clips are left alone.
    pub fn advance(&mut self, elapsed_ms: Option<f64>, inherited: FrameRate) {
        if self.mode.is_synchronized() {
            return;
        }

        let rate = self.framerate.resolve(inherited);
        self.effective_framerate = rate;

        let mut frames = self.clock.frames_for(elapsed_ms, rate);
        // Frame actions may pause the clip mid-loop
        while !self.paused && frames > 0 {
            frames -= 1;
            self.requested_position = if self.resolved.is_unpositioned() {
                0
            } else {
                self.requested_position.saturating_add(1)
            };
            self.update_timeline(false);
        }
    }

    /// Take the offset handed down by the parent and resolve a synchronized clip
    pub fn synchronize(&mut self, synch_offset: u32) {
        self.synch_offset = synch_offset;
        if self.mode.is_synchronized() {
            self.update_timeline(false);
        }
    }

    /// Resume playback and seek
    pub fn goto_and_play(&mut self, target: impl Into<PlayheadTarget>) {
        self.paused = false;
        self.goto(target.into());
    }

    /// Pause playback and seek
    pub fn goto_and_stop(&mut self, target: impl Into<PlayheadTarget>) {
        self.paused = true;
        self.goto(target.into());
    }

    /// Resume playback
    pub fn play(&mut self) {
        self.paused = false;
    }

    /// Pause playback
    pub fn stop(&mut self) {
        self.paused = true;
    }

    /// Whether independent advancement is paused
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Last resolved frame
    pub fn current_frame(&self) -> u32 {
        self.current_frame
    }

    /// Label covering the current frame. Resolves the position first.
    pub fn current_label(&mut self) -> Option<String> {
        self.update_timeline(false);
        self.timeline
            .label_at(self.current_frame)
            .map(str::to_string)
    }

    /// Named labels of the timeline
    pub fn labels(&self) -> &LabelTable {
        self.timeline.labels()
    }

    /// Number of frames in the timeline
    pub fn total_frames(&self) -> u32 {
        self.timeline.duration()
    }

    /// Timeline duration in frames
    pub fn duration(&self) -> u32 {
        self.timeline.duration()
    }

    /// Get the synchronization mode
    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    /// Change the synchronization mode; applies on the next resolution
    pub fn set_mode(&mut self, mode: SyncMode) {
        self.mode = mode;
    }

    /// Frame offset used by synchronized modes
    pub fn start_position(&self) -> u32 {
        self.start_position
    }

    /// Offset last handed down by the parent
    pub fn synch_offset(&self) -> u32 {
        self.synch_offset
    }

    /// Rate used by the last `advance`
    pub fn effective_framerate(&self) -> FrameRate {
        self.effective_framerate
    }

    /// Carried sub-frame time, in frames
    pub fn carried_time(&self) -> f64 {
        self.clock.remainder()
    }

    /// Playhead bookkeeping state
    pub fn position(&self) -> PlayheadPosition {
        self.resolved
    }

    /// The owned timeline
    pub fn timeline(&self) -> &T {
        &self.timeline
    }

    /// Get events fired since the last call and clear them
    pub fn take_events(&mut self) -> Vec<ClipEvent> {
        std::mem::take(&mut self.events)
    }

    /// Seek, ignoring targets the timeline cannot resolve
    fn goto(&mut self, target: PlayheadTarget) {
        let Some(frame) = self.timeline.resolve(&target) else {
            tracing::debug!("Ignoring seek to unresolved {target}");
            return;
        };

        if self.resolved.is_unpositioned() {
            self.resolved = PlayheadPosition::PendingForce;
        }
        self.clock.reset();
        self.requested_position = frame;
        self.update_timeline(true);
    }

    /// Push the playhead into the timeline and adopt what it resolved
    fn update_timeline(&mut self, jump: bool) {
        self.timeline.set_looping(self.looping);

        let position = match self.mode {
            SyncMode::SingleFrame => self.start_position,
            SyncMode::Synched => self.start_position.saturating_add(self.synch_offset),
            SyncMode::Independent if self.resolved.is_unpositioned() => 0,
            SyncMode::Independent => self.requested_position,
        };
        let suppress_actions = self.mode.is_synchronized() || !self.actions_enabled;

        self.current_frame = self.timeline.calc_position(position);
        let actions = self.timeline.set_position(position, suppress_actions, jump);
        self.requested_position = self.timeline.prev_raw_position();

        let reported = self.timeline.prev_position();
        if !self.resolved.matches(reported) {
            if let Some(frame) = reported {
                self.current_frame = frame;
                self.resolved = PlayheadPosition::Positioned(frame);
            }
        }
        tracing::trace!(position, frame = self.current_frame, "Resolved playhead");

        self.run_actions(actions);
    }

    fn run_actions(&mut self, actions: Vec<FrameAction>) {
        if actions.is_empty() {
            return;
        }
        if self.action_depth >= MAX_ACTION_DEPTH {
            tracing::warn!(
                "Frame actions nested deeper than {MAX_ACTION_DEPTH} at frame {}; dropping {} action(s)",
                self.current_frame,
                actions.len()
            );
            return;
        }

        let frame = self.current_frame;
        self.action_depth += 1;
        for action in actions {
            match action {
                FrameAction::Stop => self.paused = true,
                FrameAction::Play => self.paused = false,
                FrameAction::GotoAndStop(target) => self.goto_and_stop(target),
                FrameAction::GotoAndPlay(target) => self.goto_and_play(target),
                FrameAction::Event(name) => self.events.push(ClipEvent { frame, name }),
            }
        }
        self.action_depth -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::FrameTimeline;

    fn clip(timeline: FrameTimeline, mode: SyncMode) -> AnimatedNode<FrameTimeline> {
        let settings = ClipSettings {
            mode,
            ..ClipSettings::default()
        };
        AnimatedNode::new(timeline, &settings)
    }

    fn tick(node: &mut AnimatedNode<FrameTimeline>, times: usize) {
        for _ in 0..times {
            node.advance(None, FrameRate::Inherit);
        }
    }

    #[test]
    fn test_first_advance_positions_at_zero() {
        let mut node = clip(FrameTimeline::new(10), SyncMode::Independent);
        assert_eq!(node.position(), PlayheadPosition::Unpositioned);

        tick(&mut node, 1);
        assert_eq!(node.current_frame(), 0);
        assert_eq!(node.position(), PlayheadPosition::Positioned(0));

        tick(&mut node, 1);
        assert_eq!(node.current_frame(), 1);
    }

    #[test]
    fn test_tick_synchronous_ignores_elapsed_time() {
        let mut node = clip(FrameTimeline::new(100), SyncMode::Independent);
        node.advance(Some(5000.0), FrameRate::Inherit);
        node.advance(Some(0.0), FrameRate::Inherit);
        node.advance(Some(16.6), FrameRate::TickSynchronous);
        assert_eq!(node.current_frame(), 2);
    }

    #[test]
    fn test_loop_wraps_at_duration() {
        let mut node = clip(FrameTimeline::new(10), SyncMode::Independent);
        tick(&mut node, 12);
        assert_eq!(node.current_frame(), 1);
    }

    #[test]
    fn test_non_looping_stops_on_last_frame() {
        let mut node = clip(FrameTimeline::new(3), SyncMode::Independent);
        node.looping = false;
        tick(&mut node, 5);
        assert_eq!(node.current_frame(), 2);
    }

    #[test]
    fn test_fixed_rate_carries_remainder() {
        let mut node = clip(FrameTimeline::new(10_000), SyncMode::Independent);
        node.framerate = FrameRate::fixed(24.0);

        for _ in 0..1000 {
            node.advance(Some(1000.0 / 60.0), FrameRate::Inherit);
        }

        // 400 frames advanced, the first one lands on frame 0
        assert!((398..=399).contains(&node.current_frame()), "at {}", node.current_frame());
        assert!(node.carried_time() < 1.0);
    }

    #[test]
    fn test_inherited_rate() {
        let mut node = clip(FrameTimeline::new(100), SyncMode::Independent);
        node.advance(Some(300.0), FrameRate::fixed(10.0));
        assert_eq!(node.current_frame(), 2);
        assert_eq!(node.effective_framerate(), FrameRate::Fixed(10.0));

        // An explicit tick-synchronous rate stops inheritance
        node.framerate = FrameRate::TickSynchronous;
        node.advance(Some(300.0), FrameRate::fixed(10.0));
        assert_eq!(node.current_frame(), 3);
    }

    #[test]
    fn test_paused_clip_does_not_advance() {
        let mut node = clip(FrameTimeline::new(10), SyncMode::Independent);
        tick(&mut node, 3);
        node.stop();
        tick(&mut node, 3);
        assert_eq!(node.current_frame(), 2);
        node.play();
        tick(&mut node, 1);
        assert_eq!(node.current_frame(), 3);
    }

    #[test]
    fn test_goto_and_play_label() {
        let timeline = FrameTimeline::new(10).with_label("run", 5);
        let mut node = clip(timeline, SyncMode::Independent);
        node.paused = true;

        node.goto_and_play("run");
        assert_eq!(node.current_frame(), 5);
        assert!(!node.is_paused());

        tick(&mut node, 1);
        assert_eq!(node.current_frame(), 6);
    }

    #[test]
    fn test_goto_and_stop_twice_is_idempotent() {
        let timeline = FrameTimeline::new(10).with_label("idle", 3);
        let mut node = clip(timeline, SyncMode::Independent);

        node.goto_and_stop("idle");
        assert_eq!(node.current_frame(), 3);
        node.goto_and_stop("idle");
        assert_eq!(node.current_frame(), 3);
        assert!(node.is_paused());
    }

    #[test]
    fn test_goto_out_of_range_is_ignored() {
        let mut node = clip(FrameTimeline::new(10), SyncMode::Independent);
        tick(&mut node, 4);

        node.goto_and_stop(999);
        assert_eq!(node.current_frame(), 3);
        assert!(node.is_paused());

        node.goto_and_play("missing");
        assert_eq!(node.current_frame(), 3);
        assert!(!node.is_paused());
    }

    #[test]
    fn test_goto_resets_carried_time() {
        let mut node = clip(FrameTimeline::new(100), SyncMode::Independent);
        node.framerate = FrameRate::fixed(10.0);
        node.advance(Some(150.0), FrameRate::Inherit);
        assert!(node.carried_time() > 0.0);

        node.goto_and_play(20);
        assert_eq!(node.carried_time(), 0.0);
        assert_eq!(node.current_frame(), 20);
    }

    #[test]
    fn test_frame_duration_ticks_advance_one_frame_each() {
        for fps in [24.0, 25.0, 30.0, 60.0] {
            let rate = FrameRate::fixed(fps);
            let Some(frame_ms) = rate.frame_duration_ms() else {
                panic!("{fps} should be a fixed rate");
            };
            let mut node = clip(FrameTimeline::new(1000), SyncMode::Independent);

            for _ in 0..50 {
                node.advance(Some(frame_ms), rate);
            }

            assert_eq!(node.current_frame(), 49, "at {fps}fps");
            assert_eq!(node.carried_time(), 0.0);
        }
    }

    #[test]
    fn test_synchronized_clip_ignores_frame_clock() {
        let mut node = AnimatedNode::new(
            FrameTimeline::new(10),
            &ClipSettings {
                mode: SyncMode::Synched,
                start_position: 1,
                ..ClipSettings::default()
            },
        );
        node.synchronize(2);
        let position = node.position();

        node.advance(Some(150.0), FrameRate::fixed(10.0));
        assert_eq!(node.carried_time(), 0.0);
        assert_eq!(node.position(), position);
        assert_eq!(node.current_frame(), 3);
    }

    #[test]
    fn test_first_seek_forces_resolution() {
        let mut node = clip(FrameTimeline::new(10), SyncMode::Independent);
        node.goto_and_stop(0);
        assert_eq!(node.position(), PlayheadPosition::Positioned(0));
        assert_eq!(node.current_frame(), 0);
    }

    #[test]
    fn test_synched_follows_offset_and_ignores_pause() {
        let mut node = AnimatedNode::new(
            FrameTimeline::new(10),
            &ClipSettings {
                mode: SyncMode::Synched,
                start_position: 2,
                ..ClipSettings::default()
            },
        );

        assert_eq!(node.start_position(), 2);
        node.synchronize(3);
        assert_eq!(node.current_frame(), 5);

        node.stop();
        node.synchronize(4);
        assert_eq!(node.current_frame(), 6);

        // The frame clock never moves a synched clip
        tick(&mut node, 5);
        assert_eq!(node.current_frame(), 6);
    }

    #[test]
    fn test_single_frame_never_moves() {
        let mut node = AnimatedNode::new(
            FrameTimeline::new(10),
            &ClipSettings {
                mode: SyncMode::SingleFrame,
                start_position: 4,
                ..ClipSettings::default()
            },
        );

        node.synchronize(7);
        assert_eq!(node.current_frame(), 4);
        tick(&mut node, 20);
        node.synchronize(2);
        assert_eq!(node.current_frame(), 4);
    }

    #[test]
    fn test_mode_change_applies_on_next_resolution() {
        let mut node = clip(FrameTimeline::new(10), SyncMode::Independent);
        tick(&mut node, 3);

        node.set_mode(SyncMode::SingleFrame);
        assert_eq!(node.current_frame(), 2);
        node.synchronize(0);
        assert_eq!(node.current_frame(), 0);
    }

    #[test]
    fn test_synched_clip_suppresses_actions() {
        let timeline = FrameTimeline::new(10).with_action(3, FrameAction::Event("hit".into()));
        let mut node = clip(timeline, SyncMode::Synched);
        node.synchronize(3);
        assert_eq!(node.current_frame(), 3);
        assert!(node.take_events().is_empty());
    }

    #[test]
    fn test_stop_action_ends_advance_loop() {
        let timeline = FrameTimeline::new(10).with_action(3, FrameAction::Stop);
        let mut node = clip(timeline, SyncMode::Independent);
        node.framerate = FrameRate::fixed(10.0);

        // 600ms at 10fps is six frames, the stop on frame 3 cuts it short
        node.advance(Some(600.0), FrameRate::Inherit);
        assert_eq!(node.current_frame(), 3);
        assert!(node.is_paused());
    }

    #[test]
    fn test_event_actions_are_queued() {
        let timeline = FrameTimeline::new(10).with_action(2, FrameAction::Event("footstep".into()));
        let mut node = clip(timeline, SyncMode::Independent);
        tick(&mut node, 3);

        let events = node.take_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "footstep");
        assert_eq!(events[0].frame, 2);
        assert!(node.take_events().is_empty());
    }

    #[test]
    fn test_disabled_actions_do_not_run() {
        let timeline = FrameTimeline::new(10).with_action(1, FrameAction::Stop);
        let mut node = clip(timeline, SyncMode::Independent);
        node.actions_enabled = false;
        tick(&mut node, 4);
        assert_eq!(node.current_frame(), 3);
        assert!(!node.is_paused());
    }

    #[test]
    fn test_goto_action_loops_section() {
        let timeline = FrameTimeline::new(10)
            .with_label("loop_start", 1)
            .with_action(4, FrameAction::GotoAndPlay("loop_start".into()));
        let mut node = clip(timeline, SyncMode::Independent);

        tick(&mut node, 5);
        assert_eq!(node.current_frame(), 1);
        tick(&mut node, 1);
        assert_eq!(node.current_frame(), 2);
    }

    #[test]
    fn test_ping_pong_actions_terminate() {
        let timeline = FrameTimeline::new(10)
            .with_action(1, FrameAction::GotoAndPlay(PlayheadTarget::Frame(2)))
            .with_action(2, FrameAction::GotoAndPlay(PlayheadTarget::Frame(1)));
        let mut node = clip(timeline, SyncMode::Independent);

        tick(&mut node, 2);
        assert!(matches!(node.current_frame(), 1 | 2));
    }

    #[test]
    fn test_current_label() {
        let settings = ClipSettings {
            labels: [("intro", 0u32), ("run", 5)].into_iter().collect(),
            ..ClipSettings::default()
        };
        let mut node = AnimatedNode::new(FrameTimeline::new(10), &settings);

        assert_eq!(node.labels().len(), 2);
        assert_eq!(node.current_label().as_deref(), Some("intro"));

        node.goto_and_stop(7);
        assert_eq!(node.current_label().as_deref(), Some("run"));
        assert_eq!(node.total_frames(), 10);
        assert_eq!(node.duration(), 10);
    }
}
