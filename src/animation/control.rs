//! Borrowed playback handle for one armature.

use crate::animation::config::{AnimationConfig, FadeOutMode};
use crate::animation::player::AnimationPlayer;
use crate::animation::state::{AnimationState, AnimationStateKey};
use crate::armature::Rig;

/// An [`AnimationPlayer`] paired with the armature it drives.
///
/// Returned by [`Armature::animation`](crate::armature::Armature::animation).
/// Every method that starts a state needs the armature's bones, slots and
/// child armatures, which this handle borrows for its lifetime.
pub struct AnimationControl<'a> {
    pub(crate) player: &'a mut AnimationPlayer,
    pub(crate) rig: Rig<'a>,
}

impl AnimationControl<'_> {
    /// Plays a fully specified request. The config is normalized in place.
    pub fn play_config(&mut self, config: &mut AnimationConfig) -> Option<AnimationStateKey> {
        self.player.play_config(config, &mut self.rig)
    }

    /// See [`AnimationPlayer::play`].
    pub fn play(&mut self, name: Option<&str>, play_times: i32) -> Option<AnimationStateKey> {
        self.player.play(name, play_times, &mut self.rig)
    }

    /// See [`AnimationPlayer::fade_in`].
    pub fn fade_in(
        &mut self,
        name: &str,
        fade_in_time: f32,
        play_times: i32,
        layer: i32,
        group: Option<&str>,
        fade_out_mode: FadeOutMode,
    ) -> Option<AnimationStateKey> {
        self.player
            .fade_in(name, fade_in_time, play_times, layer, group, fade_out_mode, &mut self.rig)
    }

    pub fn goto_and_play_by_time(&mut self, name: &str, time: f32, play_times: i32) -> Option<AnimationStateKey> {
        self.player.goto_and_play_by_time(name, time, play_times, &mut self.rig)
    }

    pub fn goto_and_play_by_frame(&mut self, name: &str, frame: u32, play_times: i32) -> Option<AnimationStateKey> {
        self.player.goto_and_play_by_frame(name, frame, play_times, &mut self.rig)
    }

    pub fn goto_and_play_by_progress(
        &mut self,
        name: &str,
        progress: f32,
        play_times: i32,
    ) -> Option<AnimationStateKey> {
        self.player
            .goto_and_play_by_progress(name, progress, play_times, &mut self.rig)
    }

    pub fn goto_and_stop_by_time(&mut self, name: &str, time: f32) -> Option<AnimationStateKey> {
        self.player.goto_and_stop_by_time(name, time, &mut self.rig)
    }

    pub fn goto_and_stop_by_frame(&mut self, name: &str, frame: u32) -> Option<AnimationStateKey> {
        self.player.goto_and_stop_by_frame(name, frame, &mut self.rig)
    }

    pub fn goto_and_stop_by_progress(&mut self, name: &str, progress: f32) -> Option<AnimationStateKey> {
        self.player.goto_and_stop_by_progress(name, progress, &mut self.rig)
    }

    /// Fades out one state and its blend children.
    pub fn fade_out(&mut self, key: AnimationStateKey, fade_out_time: f32, pause_playhead: bool) {
        self.player.fade_out_state(key, fade_out_time, pause_playhead);
    }

    pub fn stop(&mut self, name: Option<&str>) {
        self.player.stop(name);
    }

    pub fn reset(&mut self) {
        self.player.reset();
    }

    #[must_use]
    pub fn state(&self, key: AnimationStateKey) -> Option<&AnimationState> {
        self.player.state(key)
    }

    pub fn state_mut(&mut self, key: AnimationStateKey) -> Option<&mut AnimationState> {
        self.player.state_mut(key)
    }

    #[must_use]
    pub fn player(&self) -> &AnimationPlayer {
        self.player
    }

    pub fn player_mut(&mut self) -> &mut AnimationPlayer {
        self.player
    }
}
