//! Animation Player
//!
//! Owns the active [`AnimationState`] list and the [`BlendTable`] of one
//! armature and drives them every tick.
//!
//! # Ordering
//!
//! Active states are kept sorted by descending layer so that blend weight
//! is handed out from the top layer down. A blend-node primary always sits
//! before its satellites.
//!
//! # Caching
//!
//! With exactly one active state whose clip declares a cache frame rate,
//! the player hands the armature a cache frame index and bones/slots reuse
//! transforms computed on earlier loops. Any blend of two or more states
//! disables caching for that tick.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use slotmap::SlotMap;

use crate::animation::blend::{BlendKind, BlendState, BlendTable, BlendTarget};
use crate::animation::config::{AnimationConfig, FadeOutMode, TIME_SCALE_FROM_CLIP};
use crate::animation::state::{AnimationState, AnimationStateKey};
use crate::armature::{CacheTarget, Rig};
use crate::geom::Transform2D;
use crate::model::AnimationData;
use crate::utils::Pool;

/// Pulls a position equal to the clip duration back inside the clip.
const END_POSITION_EPSILON: f32 = 0.000_001;

#[derive(Debug)]
pub struct AnimationPlayer {
    /// Playback speed multiplier for every state of this armature.
    pub time_scale: f32,
    /// `time_scale` times every inherited ancestor scale, as of the last advance.
    effective_time_scale: f32,

    animations: FxHashMap<String, Arc<AnimationData>>,
    animation_names: Vec<String>,

    states: SlotMap<AnimationStateKey, AnimationState>,
    state_pool: Pool<AnimationState>,
    /// Active states, descending layer.
    active: Vec<AnimationStateKey>,
    last: Option<AnimationStateKey>,

    blend_states: BlendTable,
    /// Scratch request reused by the convenience builders.
    config: AnimationConfig,
    /// Cached-frame-index tables must be rebound before the next cached tick.
    animation_dirty: bool,
    /// Armature cache rate used by clips that declare none.
    cache_frame_rate: u32,
}

impl AnimationPlayer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            time_scale: 1.0,
            effective_time_scale: 1.0,
            animations: FxHashMap::default(),
            animation_names: Vec::new(),
            states: SlotMap::with_key(),
            state_pool: Pool::new(),
            active: Vec::new(),
            last: None,
            blend_states: BlendTable::new(),
            config: AnimationConfig::new(),
            animation_dirty: false,
            cache_frame_rate: 0,
        }
    }

    // ========================================================================
    // Per-frame advance
    // ========================================================================

    /// Advances every active state by `dt` seconds and applies the result
    /// to the rig.
    ///
    /// `inherited_scale` is the parent armature's effective time scale when
    /// this armature inherits animation from it.
    pub fn advance_time(&mut self, dt: f32, inherited_scale: Option<f32>, rig: &mut Rig<'_>) {
        let scale = inherited_scale.map_or(self.time_scale, |parent| parent * self.time_scale);
        self.effective_time_scale = scale;
        let dt = dt.abs() * scale;

        self.blend_states.reset_all();

        match self.active.len() {
            0 => *rig.cache_frame_index = -1,
            1 => self.advance_single(dt, rig),
            _ => self.advance_blended(dt, rig),
        }

        self.sync_blend_children();

        for i in 0..self.active.len() {
            if let Some(state) = self.states.get_mut(self.active[i]) {
                state.apply_timelines(&mut self.blend_states, rig);
            }
        }

        self.reset_unanimated_bones(rig);
    }

    fn advance_single(&mut self, dt: f32, rig: &mut Rig<'_>) {
        let key = self.active[0];
        let Some(state) = self.states.get(key) else {
            self.active.clear();
            *rig.cache_frame_index = -1;
            return;
        };

        if state.is_fade_complete() {
            self.remove_state(key);
            self.active.clear();
            self.last = None;
            *rig.cache_frame_index = -1;
            return;
        }

        let animation = state.animation_data().cloned();
        let cache_frame_rate = animation.as_deref().map_or(0.0, |a| self.clip_cache_rate(a));

        if self.animation_dirty && cache_frame_rate > 0.0 {
            self.animation_dirty = false;
            if let Some(animation) = &animation {
                Self::rebind_cache_tables(animation, cache_frame_rate, rig);
            }
        }

        let cache_index = self
            .states
            .get_mut(key)
            .and_then(|state| state.advance_time(dt, cache_frame_rate));
        *rig.cache_frame_index = cache_index.map_or(-1, |i| i as i32);
    }

    fn advance_blended(&mut self, dt: f32, rig: &mut Rig<'_>) {
        let mut removed = 0;
        for i in 0..self.active.len() {
            let key = self.active[i];
            let finished = self.states.get(key).is_none_or(AnimationState::is_fade_complete);

            if finished {
                removed += 1;
                self.remove_state(key);
                self.animation_dirty = true;
                if self.last == Some(key) {
                    self.last = None;
                }
            } else {
                if removed > 0 {
                    self.active[i - removed] = key;
                }
                if let Some(state) = self.states.get_mut(key) {
                    state.advance_time(dt, 0.0);
                }
            }
        }

        if removed > 0 {
            let len = self.active.len() - removed;
            self.active.truncate(len);
            if self.last.is_none() {
                self.last = self.active.last().copied();
            }
        }

        *rig.cache_frame_index = -1;
    }

    /// Points every bone and eligible slot at its cached-frame-index table
    /// for `animation`.
    fn rebind_cache_tables(animation: &AnimationData, frame_rate: f32, rig: &mut Rig<'_>) {
        log::debug!(
            "Rebuilding transform cache tables for '{}' in '{}'",
            animation.name,
            rig.data.name
        );

        for (index, bone) in rig.bones.iter_mut().enumerate() {
            bone.cached_frame_indices = Some(rig.cache.table_for(animation, frame_rate, CacheTarget::Bone(index)));
        }

        let default_skin = rig.data.default_skin().map(|skin| skin.name.as_str());
        for (index, slot) in rig.slots.iter_mut().enumerate() {
            let from_default_skin = slot
                .first_raw_display_data()
                .is_some_and(|raw| Some(raw.skin.as_str()) == default_skin);
            slot.cached_frame_indices = if from_default_skin {
                Some(rig.cache.table_for(animation, frame_rate, CacheTarget::Slot(index)))
            } else {
                None
            };
        }
    }

    /// Cache rate of `animation`: its own, else the armature rate at clip scale.
    fn clip_cache_rate(&self, animation: &AnimationData) -> f32 {
        if animation.cache_frame_rate > 0.0 {
            animation.cache_frame_rate
        } else if self.cache_frame_rate > 0 {
            (self.cache_frame_rate as f32 * animation.scale).ceil()
        } else {
            0.0
        }
    }

    /// Copies progress and weight from each primary into its satellites.
    fn sync_blend_children(&mut self) {
        for i in 0..self.active.len() {
            let key = self.active[i];
            let Some(child) = self.states.get(key) else {
                continue;
            };
            let (Some(parent_key), Some(timeline)) = (child.parent, child.blend_timeline.clone()) else {
                continue;
            };
            let Some(parent) = self.states.get(parent_key) else {
                continue;
            };

            let parent_time = parent.current_time();
            let parent_weight = parent.weight_result();
            let sampled = parent
                .animation_data()
                .and_then(|animation| animation.blend_timeline(&timeline))
                .map(|blend| {
                    (
                        blend.progress.sample(parent_time).unwrap_or(0.0),
                        blend.weight.sample(parent_time).unwrap_or(1.0),
                    )
                });

            if let (Some((progress, weight)), Some(child)) = (sampled, self.states.get_mut(key)) {
                child.follow_parent(progress, weight, parent_weight);
            }
        }
    }

    /// Returns animated bones that no state touched this tick to the setup pose.
    fn reset_unanimated_bones(&self, rig: &mut Rig<'_>) {
        let Some(last) = self.last.and_then(|key| self.states.get(key)) else {
            return;
        };
        if !last.reset_to_pose {
            return;
        }

        for (index, bone) in rig.bones.iter_mut().enumerate() {
            let untouched = self
                .blend_states
                .get(BlendKind::Bone, &bone.name)
                .is_some_and(|blend| blend.dirty == 0);
            if untouched
                && bone.animation_pose != Transform2D::IDENTITY
                && !rig.cache.has_entry(bone.cached_frame_indices, *rig.cache_frame_index)
            {
                log::trace!("Bone {index} ('{}') returns to setup pose", bone.name);
                bone.animation_pose = Transform2D::IDENTITY;
                bone.invalidate_update();
            }
        }
    }

    // ========================================================================
    // Creation
    // ========================================================================

    /// Normalizes `config` in place and starts a new state from it.
    ///
    /// Returns `None` and changes nothing when the clip does not exist.
    pub fn play_config(&mut self, config: &mut AnimationConfig, rig: &mut Rig<'_>) -> Option<AnimationStateKey> {
        let Some(animation) = self.animations.get(&config.animation).cloned() else {
            log::warn!(
                "Non-existent animation '{}' requested on armature '{}'",
                config.animation,
                rig.data.name
            );
            return None;
        };

        if config.fade_out_mode == FadeOutMode::Single {
            let existing = self.active.iter().copied().find(|&key| {
                self.states.get(key).is_some_and(|state| {
                    !state.is_fade_out()
                        && state.layer == config.layer
                        && state
                            .animation_data()
                            .is_some_and(|data| Arc::ptr_eq(data, &animation))
                })
            });
            if existing.is_some() {
                return existing;
            }
        }

        Self::normalize_config(config, &animation, self.active.is_empty());
        self.fade_out_for(config);

        let mut state = self.state_pool.acquire();
        state.init(Arc::clone(&animation), config, rig.data);
        let key = self.states.insert(state);
        self.animation_dirty = true;
        *rig.cache_frame_index = -1;
        log::debug!("Animation state '{}' created on layer {}", config.animation, config.layer);

        let index = self
            .active
            .iter()
            .position(|&other| self.states.get(other).is_some_and(|s| config.layer > s.layer))
            .unwrap_or(self.active.len());
        self.active.insert(index, key);

        Self::propagate_to_child_armatures(&config.animation, rig);
        self.expand_blend_nodes(key, &animation, config.layer, rig);

        self.last = Some(key);
        self.last
    }

    fn normalize_config(config: &mut AnimationConfig, animation: &AnimationData, first_state: bool) {
        if first_state {
            config.fade_in_time = 0.0;
        } else if config.fade_in_time < 0.0 {
            config.fade_in_time = animation.fade_in_time;
        }
        if config.fade_out_time < 0.0 {
            config.fade_out_time = config.fade_in_time;
        }
        if config.time_scale <= TIME_SCALE_FROM_CLIP {
            config.time_scale = 1.0 / animation.scale;
        }

        let clip_duration = animation.duration;
        if animation.frame_count > 0 {
            if config.position < 0.0 {
                config.position = config.position % clip_duration + clip_duration;
            } else if config.position > clip_duration {
                config.position %= clip_duration;
            }
            if config.position == clip_duration {
                // Keep one visible frame before the end.
                config.position -= END_POSITION_EPSILON;
            }

            if config.duration > 0.0 && config.position + config.duration > clip_duration {
                config.duration = clip_duration - config.position;
            }
            if config.play_times < 0 {
                config.play_times = animation.play_times as i32;
            }
        } else {
            config.play_times = 1;
            config.position = 0.0;
            if config.duration > 0.0 {
                config.duration = 0.0;
            }
        }

        if config.duration == 0.0 {
            config.duration = -1.0;
        }
    }

    fn fade_out_for(&mut self, config: &AnimationConfig) {
        let targets: Vec<AnimationStateKey> = self
            .active
            .iter()
            .copied()
            .filter(|&key| {
                self.states.get(key).is_some_and(|state| {
                    state.parent.is_none()
                        && match config.fade_out_mode {
                            FadeOutMode::SameLayer => state.layer == config.layer,
                            FadeOutMode::SameGroup => state.group == config.group,
                            FadeOutMode::SameLayerAndGroup => {
                                state.layer == config.layer && state.group == config.group
                            }
                            FadeOutMode::All => true,
                            FadeOutMode::None | FadeOutMode::Single => false,
                        }
                })
            })
            .collect();

        for key in targets {
            self.fade_out_state(key, config.fade_out_time, config.pause_fade_out);
        }
    }

    /// Fades out a state and its blend-node satellites.
    pub fn fade_out_state(&mut self, key: AnimationStateKey, fade_out_time: f32, pause_playhead: bool) {
        let Some(state) = self.states.get_mut(key) else {
            return;
        };
        state.fade_out(fade_out_time, pause_playhead);
        let children = state.children.clone();
        for child in children {
            self.fade_out_state(child, fade_out_time, pause_playhead);
        }
    }

    fn propagate_to_child_armatures(name: &str, rig: &mut Rig<'_>) {
        for slot in rig.slots.iter() {
            let Some(child) = slot.child_armature().and_then(|key| rig.children.get_mut(key)) else {
                continue;
            };
            let player = child.animation_player();
            if child.inherit_animation && player.has_animation(name) && player.get_state(name, -1).is_none() {
                child.animation().fade_in(name, -1.0, -1, 0, None, FadeOutMode::SameLayerAndGroup);
            }
        }
    }

    fn expand_blend_nodes(
        &mut self,
        parent_key: AnimationStateKey,
        animation: &AnimationData,
        layer: i32,
        rig: &mut Rig<'_>,
    ) {
        for timeline in &animation.blend_timelines {
            let Some(child_key) = self.fade_in(&timeline.name, 0.0, 1, layer, None, FadeOutMode::Single, rig)
            else {
                continue;
            };
            if child_key == parent_key {
                continue;
            }

            if let Some(child) = self.states.get_mut(child_key) {
                child.action_enabled = false;
                child.display_control = false;
                child.reset_to_pose = false;
                child.stop();
                child.parent = Some(parent_key);
                child.blend_timeline = Some(timeline.name.clone());
            }
            if let Some(parent) = self.states.get_mut(parent_key) {
                parent.add_child(child_key);
            }

            let child_index = self.active.iter().position(|&k| k == child_key);
            let parent_index = self.active.iter().position(|&k| k == parent_key);
            if let (Some(child_index), Some(parent_index)) = (child_index, parent_index) {
                if child_index < parent_index {
                    self.active.remove(parent_index);
                    self.active.insert(child_index, parent_key);
                }
            }
        }
    }

    fn remove_state(&mut self, key: AnimationStateKey) {
        let Some(state) = self.states.remove(key) else {
            return;
        };
        log::debug!("Animation state '{}' removed", state.name);

        if let Some(parent) = state.parent.and_then(|p| self.states.get_mut(p)) {
            parent.children.retain(|&child| child != key);
        }
        for &child in &state.children {
            if let Some(child) = self.states.get_mut(child) {
                child.parent = None;
                child.fade_out(0.0, true);
            }
        }

        self.state_pool.release(state);
    }

    /// Runs `build` against the cleared scratch config and plays it.
    fn play_scratch(
        &mut self,
        rig: &mut Rig<'_>,
        build: impl FnOnce(&mut AnimationConfig),
    ) -> Option<AnimationStateKey> {
        let mut config = std::mem::take(&mut self.config);
        config.clear();
        build(&mut config);
        let key = self.play_config(&mut config, rig);
        self.config = config;
        key
    }

    // ========================================================================
    // Convenience builders
    // ========================================================================

    /// Plays `name`, or with `None` resumes/replays the last state or plays
    /// the default animation.
    pub fn play(&mut self, name: Option<&str>, play_times: i32, rig: &mut Rig<'_>) -> Option<AnimationStateKey> {
        match name.filter(|n| !n.is_empty()) {
            Some(name) => {
                self.play_scratch(rig, |config| {
                    config.reset_to_pose = true;
                    config.play_times = play_times;
                    config.fade_in_time = 0.0;
                    config.animation = name.to_owned();
                });
            }
            None => match self.last.and_then(|key| self.states.get(key).map(|s| (key, s))) {
                None => {
                    if let Some(default) = rig.data.default_animation.clone() {
                        self.play_scratch(rig, |config| {
                            config.reset_to_pose = true;
                            config.play_times = play_times;
                            config.fade_in_time = 0.0;
                            config.animation = default;
                        });
                    }
                }
                Some((key, state)) if !state.is_playing() && !state.is_completed() => {
                    if let Some(state) = self.states.get_mut(key) {
                        state.play();
                    }
                }
                Some((_, state)) => {
                    let name = state.name.clone();
                    self.play_scratch(rig, |config| {
                        config.reset_to_pose = true;
                        config.play_times = play_times;
                        config.fade_in_time = 0.0;
                        config.animation = name;
                    });
                }
            },
        }

        self.last
    }

    /// Fades `name` in over `fade_in_time` seconds.
    ///
    /// Negative times and play counts use the clip defaults.
    pub fn fade_in(
        &mut self,
        name: &str,
        fade_in_time: f32,
        play_times: i32,
        layer: i32,
        group: Option<&str>,
        fade_out_mode: FadeOutMode,
        rig: &mut Rig<'_>,
    ) -> Option<AnimationStateKey> {
        self.play_scratch(rig, |config| {
            config.fade_out_mode = fade_out_mode;
            config.play_times = play_times;
            config.layer = layer;
            config.fade_in_time = fade_in_time;
            config.animation = name.to_owned();
            if let Some(group) = group {
                config.group = group.to_owned();
            }
        })
    }

    pub fn goto_and_play_by_time(
        &mut self,
        name: &str,
        time: f32,
        play_times: i32,
        rig: &mut Rig<'_>,
    ) -> Option<AnimationStateKey> {
        self.play_scratch(rig, |config| {
            config.reset_to_pose = true;
            config.play_times = play_times;
            config.position = time;
            config.fade_in_time = 0.0;
            config.animation = name.to_owned();
        })
    }

    pub fn goto_and_play_by_frame(
        &mut self,
        name: &str,
        frame: u32,
        play_times: i32,
        rig: &mut Rig<'_>,
    ) -> Option<AnimationStateKey> {
        let position = self.animations.get(name).map_or(0.0, |animation| {
            if animation.frame_count > 0 {
                animation.duration * frame as f32 / animation.frame_count as f32
            } else {
                0.0
            }
        });
        self.play_scratch(rig, |config| {
            config.reset_to_pose = true;
            config.play_times = play_times;
            config.position = position;
            config.fade_in_time = 0.0;
            config.animation = name.to_owned();
        })
    }

    pub fn goto_and_play_by_progress(
        &mut self,
        name: &str,
        progress: f32,
        play_times: i32,
        rig: &mut Rig<'_>,
    ) -> Option<AnimationStateKey> {
        let position = self
            .animations
            .get(name)
            .map_or(0.0, |animation| animation.duration * progress.max(0.0));
        self.play_scratch(rig, |config| {
            config.reset_to_pose = true;
            config.play_times = play_times;
            config.position = position;
            config.fade_in_time = 0.0;
            config.animation = name.to_owned();
        })
    }

    pub fn goto_and_stop_by_time(&mut self, name: &str, time: f32, rig: &mut Rig<'_>) -> Option<AnimationStateKey> {
        let key = self.goto_and_play_by_time(name, time, 1, rig);
        self.stop_key(key);
        key
    }

    pub fn goto_and_stop_by_frame(&mut self, name: &str, frame: u32, rig: &mut Rig<'_>) -> Option<AnimationStateKey> {
        let key = self.goto_and_play_by_frame(name, frame, 1, rig);
        self.stop_key(key);
        key
    }

    pub fn goto_and_stop_by_progress(
        &mut self,
        name: &str,
        progress: f32,
        rig: &mut Rig<'_>,
    ) -> Option<AnimationStateKey> {
        let key = self.goto_and_play_by_progress(name, progress, 1, rig);
        self.stop_key(key);
        key
    }

    fn stop_key(&mut self, key: Option<AnimationStateKey>) {
        if let Some(state) = key.and_then(|key| self.states.get_mut(key)) {
            state.stop();
        }
    }

    // ========================================================================
    // Control
    // ========================================================================

    /// Stops the named state, or every state with `None`.
    pub fn stop(&mut self, name: Option<&str>) {
        match name {
            Some(name) => {
                let key = self.get_state(name, -1);
                self.stop_key(key);
            }
            None => {
                for &key in &self.active {
                    if let Some(state) = self.states.get_mut(key) {
                        state.stop();
                    }
                }
            }
        }
    }

    /// Returns every state to the pool and forgets the last state.
    pub fn reset(&mut self) {
        for key in std::mem::take(&mut self.active) {
            if let Some(state) = self.states.remove(key) {
                self.state_pool.release(state);
            }
        }
        self.states.clear();
        self.animation_dirty = false;
        self.config.clear();
        self.last = None;
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Blend state for `(kind, name)`, created bound to `target` on first use.
    pub fn get_blend_state(&mut self, kind: BlendKind, name: &str, target: BlendTarget) -> &mut BlendState {
        self.blend_states.get_or_create(kind, name, target)
    }

    #[must_use]
    pub fn blend_states(&self) -> &BlendTable {
        &self.blend_states
    }

    /// Most recently created state named `name`; `layer < 0` matches any layer.
    #[must_use]
    pub fn get_state(&self, name: &str, layer: i32) -> Option<AnimationStateKey> {
        self.active.iter().rev().copied().find(|&key| {
            self.states
                .get(key)
                .is_some_and(|state| state.name == name && (layer < 0 || state.layer == layer))
        })
    }

    #[must_use]
    pub fn state(&self, key: AnimationStateKey) -> Option<&AnimationState> {
        self.states.get(key)
    }

    pub fn state_mut(&mut self, key: AnimationStateKey) -> Option<&mut AnimationState> {
        self.states.get_mut(key)
    }

    /// Active states in blend order.
    pub fn states(&self) -> impl Iterator<Item = (AnimationStateKey, &AnimationState)> {
        self.active
            .iter()
            .filter_map(|&key| self.states.get(key).map(|state| (key, state)))
    }

    #[must_use]
    pub fn state_count(&self) -> usize {
        self.active.len()
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.states().any(|(_, state)| state.is_playing())
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        !self.active.is_empty() && self.states().all(|(_, state)| state.is_completed())
    }

    #[must_use]
    pub fn last_animation_state(&self) -> Option<AnimationStateKey> {
        self.last
    }

    #[must_use]
    pub fn last_animation_name(&self) -> Option<&str> {
        self.last
            .and_then(|key| self.states.get(key))
            .map(AnimationState::name)
    }

    #[must_use]
    pub fn has_animation(&self, name: &str) -> bool {
        self.animations.contains_key(name)
    }

    #[must_use]
    pub fn animation_names(&self) -> &[String] {
        &self.animation_names
    }

    #[must_use]
    pub fn animations(&self) -> &FxHashMap<String, Arc<AnimationData>> {
        &self.animations
    }

    /// Replaces the playable clips, keeping their order for `animation_names`.
    pub fn set_animations(&mut self, animations: impl IntoIterator<Item = Arc<AnimationData>>) {
        self.animations.clear();
        self.animation_names.clear();
        for animation in animations {
            if !self.animations.contains_key(&animation.name) {
                self.animation_names.push(animation.name.clone());
            }
            self.animations.insert(animation.name.clone(), animation);
        }
    }

    /// Scale applied on the last advance, inherited factors included.
    ///
    /// Child armatures that inherit animation advance with this scale.
    #[must_use]
    pub fn effective_time_scale(&self) -> f32 {
        self.effective_time_scale
    }

    #[must_use]
    pub fn cache_frame_rate(&self) -> u32 {
        self.cache_frame_rate
    }

    /// Changes the armature cache rate; tables are rebound on the next tick.
    pub(crate) fn set_cache_frame_rate(&mut self, rate: u32) {
        self.cache_frame_rate = rate;
        self.animation_dirty = true;
    }

    /// Pool counters for the state allocator.
    #[must_use]
    pub fn pool_stats(&self) -> crate::utils::PoolStats {
        self.state_pool.stats()
    }

    /// Scratch config as left by the last convenience call.
    #[must_use]
    pub fn last_config(&self) -> &AnimationConfig {
        &self.config
    }
}

impl Default for AnimationPlayer {
    fn default() -> Self {
        Self::new()
    }
}
