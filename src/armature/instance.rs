//! Armature instance: the runtime owner of bones, slots and playback.

use std::sync::Arc;

use glam::Vec2;
use slotmap::{SlotMap, new_key_type};

use crate::animation::{AnimationControl, AnimationPlayer, FadeOutMode};
use crate::armature::backend::{DisplayBackend, DisplayId};
use crate::armature::bone::Bone;
use crate::armature::cache::FrameCache;
use crate::armature::display_frame::{Display, DisplayFrame};
use crate::armature::slot::{Slot, SlotEnv};
use crate::errors::{Result, SinewError};
use crate::model::{ActionData, ArmatureData, DisplayData, HitOutputs, SegmentHit, TextureData};
use crate::settings::RuntimeSettings;
use crate::utils::{Pool, PoolStats};

new_key_type! {
    /// Generation-checked handle to a child armature owned by its parent.
    pub struct ArmatureKey;
}

/// Authored action waiting for the end of the slot pass.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DeferredAction {
    pub slot: String,
    pub action: ActionData,
}

/// Named event raised by an authored action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmatureEvent {
    /// Slot whose display attached the child armature.
    pub slot: String,
    pub name: String,
}

/// The parts of an armature an [`AnimationPlayer`] writes into.
pub struct Rig<'a> {
    pub(crate) data: &'a ArmatureData,
    pub(crate) bones: &'a mut [Bone],
    pub(crate) slots: &'a mut [Slot],
    pub(crate) children: &'a mut SlotMap<ArmatureKey, Armature>,
    pub(crate) cache: &'a mut FrameCache,
    /// Cache frame chosen by the player this tick; `-1` disables caching.
    pub(crate) cache_frame_index: &'a mut i32,
}

impl Rig<'_> {
    /// Whether `bone` already has a cached transform for `frame`.
    #[must_use]
    pub(crate) fn is_bone_cached(&self, bone: usize, frame: i32) -> bool {
        self.bones
            .get(bone)
            .is_some_and(|bone| self.cache.has_entry(bone.cached_frame_indices, frame))
    }
}

#[derive(Debug)]
pub struct Armature {
    data: Arc<ArmatureData>,
    settings: RuntimeSettings,
    backend: Box<dyn DisplayBackend>,
    display: DisplayId,

    /// Whether this armature follows the animations of the armature that
    /// shows it in a slot.
    pub inherit_animation: bool,

    bones: Vec<Bone>,
    slots: Vec<Slot>,
    player: AnimationPlayer,

    cache: FrameCache,
    cache_frame_rate: u32,
    cache_frame_index: i32,
    frame_pool: Pool<DisplayFrame>,

    children: SlotMap<ArmatureKey, Armature>,
    actions: Vec<DeferredAction>,
    events: Vec<ArmatureEvent>,
}

impl Armature {
    /// Builds an instance of `data`, creating every slot's built-in
    /// displays through `backend`.
    pub fn new(data: Arc<ArmatureData>, settings: RuntimeSettings, mut backend: Box<dyn DisplayBackend>) -> Result<Self> {
        data.validate()?;

        let display = backend.create_armature_display(&data.name);
        let bones: Vec<Bone> = data
            .bones
            .iter()
            .map(|bone| Bone::new(bone, bone.parent.as_deref().and_then(|p| data.bone_index(p))))
            .collect();

        let mut frame_pool = Pool::new();
        let mut slots = Vec::with_capacity(data.slots.len());
        for slot_data in &data.slots {
            let parent = data
                .bone_index(&slot_data.parent)
                .ok_or_else(|| SinewError::UnknownSlotParent {
                    armature: data.name.clone(),
                    slot: slot_data.name.clone(),
                    bone: slot_data.parent.clone(),
                })?;
            let mut slot = Slot::new(slot_data, parent, backend.as_mut());
            slot.init_frames(&data, slot_data.display_index, &mut frame_pool);
            slots.push(slot);
        }

        let cache_frame_rate = if data.cache_frame_rate > 0 {
            data.cache_frame_rate
        } else {
            settings.default_cache_frame_rate
        };

        let mut player = AnimationPlayer::new();
        player.set_animations(data.animations.iter().cloned());
        player.set_cache_frame_rate(cache_frame_rate);

        log::debug!(
            "Armature '{}' built with {} bones and {} slots",
            data.name,
            bones.len(),
            slots.len()
        );

        Ok(Self {
            data,
            settings,
            backend,
            display,
            inherit_animation: true,
            bones,
            slots,
            player,
            cache: FrameCache::new(),
            cache_frame_rate,
            cache_frame_index: -1,
            frame_pool,
            children: SlotMap::with_key(),
            actions: Vec::new(),
            events: Vec::new(),
        })
    }

    fn split(&mut self) -> (&mut AnimationPlayer, Rig<'_>) {
        (
            &mut self.player,
            Rig {
                data: &self.data,
                bones: &mut self.bones,
                slots: &mut self.slots,
                children: &mut self.children,
                cache: &mut self.cache,
                cache_frame_index: &mut self.cache_frame_index,
            },
        )
    }

    // ========================================================================
    // Per-frame update
    // ========================================================================

    /// Advances playback by `dt` seconds and resolves bones and slots.
    ///
    /// Parents must be advanced before the armatures they show; attached
    /// child armatures are advanced here, after the parent's slots.
    pub fn advance_time(&mut self, dt: f32) {
        self.advance(dt, None);
    }

    fn advance(&mut self, dt: f32, inherited_scale: Option<f32>) {
        let (player, mut rig) = self.split();
        player.advance_time(dt, inherited_scale, &mut rig);
        let cache_frame_index = self.cache_frame_index;

        for i in 0..self.bones.len() {
            let (parents, rest) = self.bones.split_at_mut(i);
            let bone = &mut rest[0];
            let parent = bone
                .parent
                .and_then(|p| parents.get(p))
                .map(|p| (p.global_transform_matrix(), p.children_transform_dirty));
            bone.update(cache_frame_index, parent, &mut self.cache);
        }

        let mut env = SlotEnv {
            data: &self.data,
            settings: &self.settings,
            bones: &self.bones,
            cache: &mut self.cache,
            backend: self.backend.as_mut(),
            children: &mut self.children,
            actions: &mut self.actions,
            cache_frame_rate: self.cache_frame_rate,
        };
        for slot in &mut self.slots {
            slot.update(cache_frame_index, &mut env);
        }

        self.flush_actions();

        let time_scale = self.player.effective_time_scale();
        for slot in &self.slots {
            let Some(child) = slot.child_armature().and_then(|key| self.children.get_mut(key)) else {
                continue;
            };
            let inherited = child.inherit_animation.then_some(time_scale);
            child.advance(dt, inherited);
        }
    }

    fn flush_actions(&mut self) {
        for DeferredAction { slot, action } in std::mem::take(&mut self.actions) {
            match action {
                ActionData::Play(name) => {
                    let child = self
                        .data
                        .slot_index(&slot)
                        .and_then(|i| self.slots[i].child_armature())
                        .and_then(|key| self.children.get_mut(key));
                    if let Some(child) = child {
                        child
                            .animation()
                            .fade_in(&name, -1.0, -1, 0, None, FadeOutMode::SameLayerAndGroup);
                    }
                }
                ActionData::Event(name) => self.events.push(ArmatureEvent { slot, name }),
            }
        }
    }

    /// Takes every event raised since the last call.
    pub fn drain_events(&mut self) -> std::vec::Drain<'_, ArmatureEvent> {
        self.events.drain(..)
    }

    // ========================================================================
    // Animation
    // ========================================================================

    /// Playback handle borrowing this armature.
    pub fn animation(&mut self) -> AnimationControl<'_> {
        let (player, rig) = self.split();
        AnimationControl { player, rig }
    }

    #[must_use]
    pub fn animation_player(&self) -> &AnimationPlayer {
        &self.player
    }

    pub fn animation_player_mut(&mut self) -> &mut AnimationPlayer {
        &mut self.player
    }

    #[must_use]
    pub fn cache_frame_rate(&self) -> u32 {
        self.cache_frame_rate
    }

    /// Changes the transform cache rate and drops every cached transform.
    ///
    /// Child armatures without a rate of their own follow.
    pub fn set_cache_frame_rate(&mut self, rate: u32) {
        if self.cache_frame_rate == rate {
            return;
        }
        self.cache_frame_rate = rate;
        self.cache.clear();
        self.cache_frame_index = -1;
        self.bones.iter_mut().for_each(Bone::reset_cache);
        self.slots.iter_mut().for_each(Slot::reset_cache);
        self.player.set_cache_frame_rate(rate);

        for child in self.children.values_mut() {
            if child.cache_frame_rate() == 0 {
                child.set_cache_frame_rate(rate);
            }
        }
    }

    /// Cache frame used by the last tick; `-1` when caching was off.
    #[must_use]
    pub fn cache_frame_index(&self) -> i32 {
        self.cache_frame_index
    }

    #[must_use]
    pub fn frame_cache(&self) -> &FrameCache {
        &self.cache
    }

    // ========================================================================
    // Child armatures
    // ========================================================================

    /// Takes ownership of `child` and shows it in frame `index` of `slot`.
    pub fn attach_child_armature(&mut self, slot: &str, index: i32, child: Armature) -> Option<ArmatureKey> {
        let Some(slot_index) = self.data.slot_index(slot) else {
            log::warn!(
                "Cannot attach child armature '{}': armature '{}' has no slot '{slot}'",
                child.name(),
                self.data.name
            );
            return None;
        };

        let name = child.name().to_owned();
        let key = self.children.insert(child);
        self.slots[slot_index].replace_display(Some(Display::Armature(key)), index, self.backend.as_mut());
        log::debug!("Child armature '{name}' placed in slot '{slot}' frame {index}");
        Some(key)
    }

    #[must_use]
    pub fn child_armature(&self, key: ArmatureKey) -> Option<&Armature> {
        self.children.get(key)
    }

    pub fn child_armature_mut(&mut self, key: ArmatureKey) -> Option<&mut Armature> {
        self.children.get_mut(key)
    }

    // ========================================================================
    // Bones & slots
    // ========================================================================

    #[must_use]
    pub fn bone(&self, name: &str) -> Option<&Bone> {
        self.data.bone_index(name).map(|i| &self.bones[i])
    }

    pub fn bone_mut(&mut self, name: &str) -> Option<&mut Bone> {
        self.data.bone_index(name).map(|i| &mut self.bones[i])
    }

    #[must_use]
    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    #[must_use]
    pub fn slot(&self, name: &str) -> Option<&Slot> {
        self.data.slot_index(name).map(|i| &self.slots[i])
    }

    #[must_use]
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Editing handle for one slot's frames and properties.
    pub fn edit_slot(&mut self, name: &str) -> Option<SlotEditor<'_>> {
        let index = self.data.slot_index(name)?;
        Some(SlotEditor {
            slot: &mut self.slots[index],
            backend: self.backend.as_mut(),
            pool: &mut self.frame_pool,
            data: &self.data,
        })
    }

    /// Forces a bone, or every bone with `None`, and the slots attached to
    /// it to resolve again on the next tick.
    pub fn invalidate_update(&mut self, bone: Option<&str>) {
        let target = match bone {
            Some(name) => match self.data.bone_index(name) {
                Some(index) => Some(index),
                None => return,
            },
            None => None,
        };

        for (index, bone) in self.bones.iter_mut().enumerate() {
            if target.is_none_or(|t| t == index) {
                bone.invalidate_update();
            }
        }
        for slot in &mut self.slots {
            if target.is_none_or(|t| t == slot.parent) {
                slot.invalidate_update();
            }
        }
    }

    // ========================================================================
    // Hit testing
    // ========================================================================

    /// Topmost slot whose bounding box contains `point` (armature space).
    pub fn contains_point(&mut self, point: Vec2) -> Option<&Slot> {
        for slot in &mut self.slots {
            if slot.bounding_box_data().is_some() {
                slot.update_transform_and_matrix(&self.bones);
            }
        }
        self.slots.iter().rev().find(|slot| slot.contains_point(point))
    }

    /// Slot whose bounding box the segment `a -> b` enters first.
    pub fn intersects_segment(&mut self, a: Vec2, b: Vec2, outputs: HitOutputs) -> Option<(&Slot, SegmentHit)> {
        for slot in &mut self.slots {
            if slot.bounding_box_data().is_some() {
                slot.update_transform_and_matrix(&self.bones);
            }
        }

        let mut best: Option<(usize, SegmentHit, f32)> = None;
        for (index, slot) in self.slots.iter().enumerate() {
            let hit = slot.intersects_segment(a, b, outputs | HitOutputs::POINT_A);
            if hit.count <= 0 {
                continue;
            }
            let distance = hit.point_a.map_or(0.0, |p| p.distance(a));
            if best.as_ref().is_none_or(|(_, _, d)| distance < *d) {
                best = Some((index, hit, distance));
            }
        }

        best.map(|(index, mut hit, _)| {
            if !outputs.contains(HitOutputs::POINT_A) {
                hit.point_a = None;
            }
            (&self.slots[index], hit)
        })
    }

    // ========================================================================
    // Properties
    // ========================================================================

    #[must_use]
    pub fn name(&self) -> &str {
        &self.data.name
    }

    #[must_use]
    pub fn data(&self) -> &Arc<ArmatureData> {
        &self.data
    }

    #[must_use]
    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    /// Root display object created by the backend.
    #[must_use]
    pub fn display(&self) -> DisplayId {
        self.display
    }

    /// Counters of the display-frame pool.
    #[must_use]
    pub fn frame_pool_stats(&self) -> PoolStats {
        self.frame_pool.stats()
    }
}

/// Mutable access to one slot together with what its edits need.
pub struct SlotEditor<'a> {
    slot: &'a mut Slot,
    backend: &'a mut dyn DisplayBackend,
    pool: &'a mut Pool<DisplayFrame>,
    data: &'a ArmatureData,
}

impl SlotEditor<'_> {
    #[must_use]
    pub fn slot(&self) -> &Slot {
        self.slot
    }

    /// Direct access for property setters such as visibility or offset.
    pub fn slot_mut(&mut self) -> &mut Slot {
        self.slot
    }

    /// Manual display selection; resolved on the next tick.
    pub fn set_display_index(&mut self, index: i32) {
        self.slot.set_display_index(index, false);
    }

    pub fn set_display_frame_count(&mut self, count: usize) {
        self.slot
            .set_display_frame_count(count, self.pool, self.backend);
    }

    pub fn replace_display(&mut self, display: Option<Display>, index: i32) {
        self.slot.replace_display(display, index, self.backend);
    }

    pub fn replace_display_data(&mut self, data: Option<Arc<DisplayData>>, index: i32) {
        self.slot.replace_display_data(data, index);
    }

    pub fn replace_raw_display_data(&mut self, data: Option<Arc<DisplayData>>, index: i32) {
        self.slot.replace_raw_display_data(data, index, self.data);
    }

    pub fn replace_texture_data(&mut self, texture: Option<Arc<TextureData>>, index: i32) {
        self.slot.replace_texture_data(texture, index);
    }

    pub fn deform_vertices_mut(&mut self) -> Option<&mut [Vec2]> {
        self.slot.deform_vertices_mut()
    }
}
