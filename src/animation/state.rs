//! One playback instance of one clip.

use std::sync::Arc;

use slotmap::new_key_type;

use crate::animation::blend::{BlendKind, BlendTable, BlendTarget};
use crate::animation::config::AnimationConfig;
use crate::armature::Rig;
use crate::model::{AnimationData, ArmatureData, KeyframeCursor};
use crate::utils::Poolable;

new_key_type! {
    /// Generation-checked handle to an [`AnimationState`] owned by a player.
    pub struct AnimationStateKey;
}

/// Smallest non-zero fade progress; keeps fade-out math away from zero.
const MIN_FADE_PROGRESS: f32 = 0.000_001;

/// Pulls a playhead parked on the end of its last loop back inside the clip.
const END_PLAYHEAD_EPSILON: f32 = 0.000_001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FadeState {
    FadingIn,
    #[default]
    Settled,
    FadingOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubFadeState {
    /// The fade was requested but has not advanced yet.
    Pending,
    Fading,
    #[default]
    Done,
}

#[derive(Debug, Default)]
pub struct AnimationState {
    pub(crate) name: String,
    pub(crate) group: String,
    pub(crate) layer: i32,
    pub time_scale: f32,
    pub weight: f32,
    /// Whether this state drives authored actions and slot displays.
    pub action_enabled: bool,
    pub reset_to_pose: bool,
    /// Whether display timelines of this state may switch slot displays.
    pub display_control: bool,

    animation: Option<Arc<AnimationData>>,
    play_times: u32,
    position: f32,
    duration: f32,

    time: f32,
    current_time: f32,
    current_play_times: u32,
    playing: bool,
    completed: bool,
    /// Playhead frozen by a fade-out.
    fade_paused: bool,

    pub(crate) fade_state: FadeState,
    pub(crate) sub_fade_state: SubFadeState,
    fade_time: f32,
    fade_total_time: f32,
    fade_progress: f32,
    pub(crate) weight_result: f32,

    pub(crate) parent: Option<AnimationStateKey>,
    pub(crate) children: Vec<AnimationStateKey>,
    /// Sub-timeline of the parent clip that drives this state.
    pub(crate) blend_timeline: Option<String>,

    bone_bindings: Vec<Option<usize>>,
    slot_bindings: Vec<Option<usize>>,
    bone_cursors: Vec<KeyframeCursor>,
}

impl Poolable for AnimationState {
    fn clear(&mut self) {
        let mut children = std::mem::take(&mut self.children);
        let mut bone_bindings = std::mem::take(&mut self.bone_bindings);
        let mut slot_bindings = std::mem::take(&mut self.slot_bindings);
        let mut bone_cursors = std::mem::take(&mut self.bone_cursors);
        children.clear();
        bone_bindings.clear();
        slot_bindings.clear();
        bone_cursors.clear();

        *self = Self {
            children,
            bone_bindings,
            slot_bindings,
            bone_cursors,
            ..Self::default()
        };
    }
}

impl AnimationState {
    /// Binds this state to a clip using an already normalized config.
    pub(crate) fn init(
        &mut self,
        animation: Arc<AnimationData>,
        config: &AnimationConfig,
        armature: &ArmatureData,
    ) {
        self.name = if config.name.is_empty() {
            config.animation.clone()
        } else {
            config.name.clone()
        };
        self.group.clone_from(&config.group);
        self.layer = config.layer;
        self.time_scale = config.time_scale;
        self.weight = config.weight;
        self.action_enabled = config.action_enabled;
        self.reset_to_pose = config.reset_to_pose;
        self.display_control = config.action_enabled;

        self.play_times = config.play_times.max(0) as u32;
        self.position = config.position;
        self.duration = if config.duration > 0.0 {
            config.duration
        } else {
            (animation.duration - config.position).max(0.0)
        };

        self.time = 0.0;
        self.current_time = self.position;
        self.current_play_times = 0;
        self.playing = true;
        self.completed = false;
        self.fade_paused = false;

        self.fade_time = 0.0;
        self.fade_total_time = config.fade_in_time.max(0.0);
        if self.fade_total_time > 0.0 {
            self.fade_state = FadeState::FadingIn;
            self.sub_fade_state = SubFadeState::Pending;
            self.fade_progress = 0.0;
        } else {
            self.fade_state = FadeState::Settled;
            self.sub_fade_state = SubFadeState::Done;
            self.fade_progress = 1.0;
        }
        self.weight_result = self.weight * self.fade_progress;

        self.bone_bindings.clear();
        self.bone_bindings.extend(
            animation
                .bone_timelines
                .iter()
                .map(|timeline| armature.bone_index(&timeline.bone)),
        );
        self.bone_cursors.clear();
        self.bone_cursors
            .resize(animation.bone_timelines.len(), KeyframeCursor::default());
        self.slot_bindings.clear();
        self.slot_bindings.extend(
            animation
                .slot_timelines
                .iter()
                .map(|timeline| armature.slot_index(&timeline.slot)),
        );

        self.animation = Some(animation);
    }

    // ========================================================================
    // Time
    // ========================================================================

    /// Advances fade and playhead by `dt` seconds.
    ///
    /// Returns the armature cache frame index when this state can use the
    /// transform cache at `cache_frame_rate`.
    pub(crate) fn advance_time(&mut self, dt: f32, cache_frame_rate: f32) -> Option<usize> {
        if self.fade_state != FadeState::Settled {
            self.advance_fade_time(dt);
        }

        if self.playing && !self.fade_paused && self.parent.is_none() {
            if self.duration > 0.0 {
                self.time += dt * self.time_scale;
            } else {
                // Single-pose clips are done as soon as they are shown.
                self.completed = true;
            }
        }
        self.update_current_time();
        self.weight_result = self.weight * self.fade_progress;

        if self.parent.is_none() && cache_frame_rate > 0.0 {
            Some((self.current_time * cache_frame_rate).floor() as usize)
        } else {
            None
        }
    }

    fn advance_fade_time(&mut self, dt: f32) {
        let fading_out = self.fade_state == FadeState::FadingOut;
        if self.sub_fade_state == SubFadeState::Pending {
            self.sub_fade_state = SubFadeState::Fading;
        }

        self.fade_time += dt.abs();
        if self.fade_time >= self.fade_total_time {
            self.sub_fade_state = SubFadeState::Done;
            self.fade_progress = if fading_out { 0.0 } else { 1.0 };
        } else if self.fade_time > 0.0 {
            let progress = self.fade_time / self.fade_total_time;
            self.fade_progress = if fading_out { 1.0 - progress } else { progress };
        }

        if self.sub_fade_state == SubFadeState::Done && !fading_out {
            self.fade_state = FadeState::Settled;
        }
    }

    fn update_current_time(&mut self) {
        let span = self.duration;
        if span <= 0.0 {
            self.current_time = self.position;
            self.current_play_times = u32::from(self.completed);
            return;
        }

        let total = span * self.play_times as f32;
        let local = if self.play_times > 0 && self.time.abs() >= total {
            self.completed = true;
            self.current_play_times = self.play_times;
            if self.time >= 0.0 { span } else { 0.0 }
        } else {
            self.completed = false;
            self.current_play_times = (self.time.abs() / span) as u32;
            self.time.rem_euclid(span)
        };
        self.current_time = self.position + local;
    }

    // ========================================================================
    // Fading
    // ========================================================================

    /// Starts or shortens a fade-out. Does not touch blend children.
    pub(crate) fn fade_out(&mut self, fade_out_time: f32, pause_playhead: bool) {
        let fade_out_time = fade_out_time.max(0.0);
        if pause_playhead {
            self.fade_paused = true;
        }

        if self.fade_state == FadeState::FadingOut {
            if fade_out_time > self.fade_total_time - self.fade_time {
                // The running fade-out ends sooner.
                return;
            }
        } else {
            self.fade_state = FadeState::FadingOut;
            self.sub_fade_state = SubFadeState::Pending;
            if fade_out_time <= 0.0 || self.fade_progress <= 0.0 {
                self.fade_progress = MIN_FADE_PROGRESS;
            }
        }

        self.fade_total_time = if self.fade_progress > MIN_FADE_PROGRESS {
            fade_out_time / self.fade_progress
        } else {
            0.0
        };
        self.fade_time = self.fade_total_time * (1.0 - self.fade_progress);
    }

    // ========================================================================
    // Blend children
    // ========================================================================

    /// Drives this blend child from its parent's sub-timeline.
    pub(crate) fn follow_parent(&mut self, progress: f32, weight: f32, parent_weight: f32) {
        self.time = progress.clamp(0.0, 1.0) * self.duration;
        if self.play_times > 0 && self.time >= self.duration {
            self.time = (self.duration - END_PLAYHEAD_EPSILON).max(0.0);
        }
        self.update_current_time();
        self.weight = weight;
        self.weight_result = weight * self.fade_progress * parent_weight;
    }

    pub(crate) fn add_child(&mut self, child: AnimationStateKey) {
        if !self.children.contains(&child) {
            self.children.push(child);
        }
    }

    // ========================================================================
    // Timeline application
    // ========================================================================

    /// Writes this state's bone and display timelines into the rig.
    pub(crate) fn apply_timelines(&mut self, blends: &mut BlendTable, rig: &mut Rig<'_>) {
        let Some(animation) = self.animation.clone() else {
            return;
        };
        let weight = self.weight_result;
        if weight <= 0.0 {
            return;
        }
        let time = self.current_time;
        let cache_frame_index = *rig.cache_frame_index;

        for (i, timeline) in animation.bone_timelines.iter().enumerate() {
            let Some(bone_index) = self.bone_bindings[i] else {
                continue;
            };
            if rig.is_bone_cached(bone_index, cache_frame_index) {
                continue;
            }

            let blend = blends.get_or_create(BlendKind::Bone, &timeline.bone, BlendTarget::Bone(bone_index));
            if !blend.update(self.layer, weight) {
                continue;
            }
            let Some(sample) = timeline.track.sample_with_cursor(time, &mut self.bone_cursors[i]) else {
                continue;
            };

            let bone = &mut rig.bones[bone_index];
            if blend.is_first() {
                bone.animation_pose = sample.weighted(blend.blend_weight());
            } else {
                bone.animation_pose.accumulate(&sample, blend.blend_weight());
            }
            bone.invalidate_update();
        }

        if !self.display_control {
            return;
        }
        for (i, timeline) in animation.slot_timelines.iter().enumerate() {
            let Some(slot_index) = self.slot_bindings[i] else {
                continue;
            };
            let blend = blends.get_or_create(BlendKind::SlotDisplay, &timeline.slot, BlendTarget::Slot(slot_index));
            if !blend.update(self.layer, weight) || !blend.is_first() {
                continue;
            }
            if let Some(display_index) = timeline.sample(time) {
                rig.slots[slot_index].set_display_index(display_index, true);
            }
        }
    }

    // ========================================================================
    // Controls & queries
    // ========================================================================

    pub fn play(&mut self) {
        self.playing = true;
    }

    pub fn stop(&mut self) {
        self.playing = false;
    }

    /// Moves the playhead to `value` seconds into the current loop.
    pub fn set_current_time(&mut self, value: f32) {
        let span = self.duration;
        if span <= 0.0 {
            return;
        }
        let loop_index = self.current_play_times - u32::from(self.completed && self.current_play_times > 0);
        let mut value = value.clamp(0.0, span);
        if self.play_times > 0 && loop_index + 1 >= self.play_times && value >= span {
            value = span - END_PLAYHEAD_EPSILON;
        }
        self.time = loop_index as f32 * span + value;
        self.update_current_time();
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    #[must_use]
    pub fn layer(&self) -> i32 {
        self.layer
    }

    #[must_use]
    pub fn animation_data(&self) -> Option<&Arc<AnimationData>> {
        self.animation.as_ref()
    }

    #[must_use]
    pub fn play_times(&self) -> u32 {
        self.play_times
    }

    #[must_use]
    pub fn position(&self) -> f32 {
        self.position
    }

    /// Effective span played per loop.
    #[must_use]
    pub fn total_time(&self) -> f32 {
        self.duration
    }

    /// Accumulated playhead time before wrapping.
    #[must_use]
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Playhead position inside the clip.
    #[must_use]
    pub fn current_time(&self) -> f32 {
        self.current_time
    }

    #[must_use]
    pub fn current_play_times(&self) -> u32 {
        self.current_play_times
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.playing && !self.completed
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    #[must_use]
    pub fn fade_state(&self) -> FadeState {
        self.fade_state
    }

    #[must_use]
    pub fn sub_fade_state(&self) -> SubFadeState {
        self.sub_fade_state
    }

    #[must_use]
    pub fn is_fade_in(&self) -> bool {
        self.fade_state == FadeState::FadingIn
    }

    #[must_use]
    pub fn is_fade_out(&self) -> bool {
        self.fade_state == FadeState::FadingOut
    }

    /// Whether a fade-out has finished and the state awaits removal.
    #[must_use]
    pub fn is_fade_complete(&self) -> bool {
        self.fade_state == FadeState::FadingOut && self.sub_fade_state == SubFadeState::Done
    }

    #[must_use]
    pub fn fade_progress(&self) -> f32 {
        self.fade_progress
    }

    #[must_use]
    pub fn fade_total_time(&self) -> f32 {
        self.fade_total_time
    }

    /// Weight applied this tick after fading and parent weighting.
    #[must_use]
    pub fn weight_result(&self) -> f32 {
        self.weight_result
    }

    #[must_use]
    pub fn parent(&self) -> Option<AnimationStateKey> {
        self.parent
    }

    #[must_use]
    pub fn children(&self) -> &[AnimationStateKey] {
        &self.children
    }

    #[must_use]
    pub fn blend_timeline(&self) -> Option<&str> {
        self.blend_timeline.as_deref()
    }
}
