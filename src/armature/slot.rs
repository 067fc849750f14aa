//! Runtime slot and its per-tick update pipeline.
//!
//! A slot holds an ordered list of [`DisplayFrame`] candidates and shows at
//! most one of them. Changes are recorded as [`SlotDirty`] bits and
//! resolved by [`Slot::update`] in a fixed order:
//!
//! 1. display data: resolve geometry, bounding box, texture and pivot
//! 2. display: swap the render display or the child armature binding
//! 3. frame: push texture/geometry to a built-in display
//! 4. early out when nothing is shown
//! 5. visible, blend mode, color, z-order
//! 6. mesh deformation
//! 7. global transform, optionally through the frame cache
//!
//! Each stage reads only state refreshed by earlier stages.

use std::sync::Arc;

use bitflags::bitflags;
use glam::{Affine2, Vec2};
use slotmap::SlotMap;

use crate::armature::ArmatureKey;
use crate::armature::backend::{BuiltinDisplay, DisplayBackend, DisplayId, FrameUpdate};
use crate::armature::bone::Bone;
use crate::armature::cache::{CacheTableId, FrameCache};
use crate::armature::display_frame::{Display, DisplayFrame};
use crate::armature::instance::{Armature, DeferredAction};
use crate::geom::{ColorTransform, Transform2D};
use crate::model::display::same_arc;
use crate::model::{
    ArmatureData, BlendMode, BoneKind, BoundingBoxData, BoundingShape, DisplayData, DisplayKind, GeometryData,
    HitOutputs, SegmentHit, SlotData, TextureData,
};
use crate::settings::RuntimeSettings;
use crate::utils::Pool;

bitflags! {
    /// Pending work for the next [`Slot::update`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SlotDirty: u16 {
        const DISPLAY_DATA = 1 << 0;
        const DISPLAY = 1 << 1;
        const GEOMETRY = 1 << 2;
        const TEXTURE = 1 << 3;
        const VISIBLE = 1 << 4;
        const BLEND_MODE = 1 << 5;
        const COLOR = 1 << 6;
        const Z_ORDER = 1 << 7;
        const VERTICES = 1 << 8;
        const TRANSFORM = 1 << 9;
    }
}

/// Armature state a slot reads and writes while updating.
pub(crate) struct SlotEnv<'a> {
    pub data: &'a ArmatureData,
    pub settings: &'a RuntimeSettings,
    pub bones: &'a [Bone],
    pub cache: &'a mut FrameCache,
    pub backend: &'a mut dyn DisplayBackend,
    pub children: &'a mut SlotMap<ArmatureKey, Armature>,
    pub actions: &'a mut Vec<DeferredAction>,
    pub cache_frame_rate: u32,
}

#[derive(Debug)]
pub struct Slot {
    name: String,
    pub(crate) parent: usize,
    blend_mode: BlendMode,
    z_order: i32,
    color: ColorTransform,
    visible: bool,

    /// User offset composed on top of the display's authored transform.
    ///
    /// Call [`Slot::invalidate_update`] after editing it.
    pub offset: Transform2D,

    raw_display: DisplayId,
    mesh_display: DisplayId,
    frames: Vec<DisplayFrame>,
    display_index: i32,
    animation_display_index: i32,

    // Resolved by the display-data stage.
    active_frame: Option<usize>,
    active_display_data: Option<Arc<DisplayData>>,
    geometry: Option<Arc<GeometryData>>,
    bounding_box: Option<Arc<BoundingBoxData>>,
    texture: Option<Arc<TextureData>>,
    geometry_bones: Vec<Option<usize>>,
    pivot: Vec2,

    // Resolved by the display stage.
    render_display: Option<DisplayId>,
    child_armature: Option<ArmatureKey>,

    dirty: SlotDirty,
    local_matrix: Affine2,
    global: Transform2D,
    global_matrix: Affine2,
    deformed_vertices: Vec<Vec2>,

    cached_frame_index: i32,
    pub(crate) cached_frame_indices: Option<CacheTableId>,
}

impl Slot {
    pub(crate) fn new(data: &SlotData, parent: usize, backend: &mut dyn DisplayBackend) -> Self {
        let raw_display = backend.create_display(data, BuiltinDisplay::Raw);
        let mesh_display = backend.create_display(data, BuiltinDisplay::Mesh);
        backend.init_display(raw_display);
        if mesh_display != raw_display {
            backend.init_display(mesh_display);
        }
        backend.on_update_display(raw_display);

        Self {
            name: data.name.clone(),
            parent,
            blend_mode: data.blend_mode,
            z_order: data.z_order,
            color: data.color,
            visible: true,
            offset: Transform2D::IDENTITY,
            raw_display,
            mesh_display,
            frames: Vec::new(),
            display_index: -1,
            animation_display_index: -1,
            active_frame: None,
            active_display_data: None,
            geometry: None,
            bounding_box: None,
            texture: None,
            geometry_bones: Vec::new(),
            pivot: Vec2::ZERO,
            render_display: None,
            child_armature: None,
            dirty: SlotDirty::COLOR | SlotDirty::BLEND_MODE | SlotDirty::VISIBLE | SlotDirty::Z_ORDER,
            local_matrix: Affine2::IDENTITY,
            global: Transform2D::IDENTITY,
            global_matrix: Affine2::IDENTITY,
            deformed_vertices: Vec::new(),
            cached_frame_index: -1,
            cached_frame_indices: None,
        }
    }

    /// Fills the frame list from the armature's default skin.
    pub(crate) fn init_frames(&mut self, data: &ArmatureData, display_index: i32, pool: &mut Pool<DisplayFrame>) {
        let raw_displays = data
            .default_skin()
            .map(|skin| skin.slot_displays(&self.name))
            .unwrap_or_default();

        self.frames.extend(raw_displays.iter().map(|_| pool.acquire()));
        for (frame, raw) in self.frames.iter_mut().zip(raw_displays) {
            frame.raw_display_data.clone_from(raw);
            frame.display = raw.as_ref().and_then(|raw| match raw.kind {
                DisplayKind::Image { .. } => Some(Display::Object(self.raw_display)),
                DisplayKind::Mesh { .. } => Some(Display::Object(self.mesh_display)),
                _ => None,
            });
        }
        self.set_display_index(display_index, false);
    }

    // ========================================================================
    // Update pipeline
    // ========================================================================

    /// Runs the update pipeline once. `cache_frame_index` is `-1` when the
    /// armature is not caching this tick.
    pub(crate) fn update(&mut self, cache_frame_index: i32, env: &mut SlotEnv<'_>) {
        if self.dirty.contains(SlotDirty::DISPLAY_DATA) {
            self.update_display_data(env);
            self.dirty.remove(SlotDirty::DISPLAY_DATA);
        }

        if self.dirty.contains(SlotDirty::DISPLAY) {
            self.update_display(env);
            self.dirty.remove(SlotDirty::DISPLAY);
        }

        if self.dirty.intersects(SlotDirty::GEOMETRY | SlotDirty::TEXTURE) {
            let target = self.render_display.unwrap_or(self.raw_display);
            if self.is_builtin(target) {
                env.backend.update_frame(
                    target,
                    &FrameUpdate {
                        texture: self.texture.as_deref(),
                        geometry: self.geometry.as_deref(),
                        pivot: self.pivot,
                    },
                );
            }
            self.dirty.remove(SlotDirty::GEOMETRY | SlotDirty::TEXTURE);
        }

        let Some(render) = self.render_display else {
            // Hit queries resolve this transform lazily.
            if self.bounding_box.is_some() && env.bones[self.parent].children_transform_dirty {
                self.dirty.insert(SlotDirty::TRANSFORM);
            }
            return;
        };

        if self.dirty.contains(SlotDirty::VISIBLE) {
            env.backend.update_visible(render, self.visible);
            self.dirty.remove(SlotDirty::VISIBLE);
        }
        if self.dirty.contains(SlotDirty::BLEND_MODE) {
            env.backend.update_blend_mode(render, self.blend_mode);
            self.dirty.remove(SlotDirty::BLEND_MODE);
        }
        if self.dirty.contains(SlotDirty::COLOR) {
            env.backend.update_color(render, &self.color);
            self.dirty.remove(SlotDirty::COLOR);
        }
        if self.dirty.contains(SlotDirty::Z_ORDER) {
            env.backend.update_z_order(render, self.z_order);
            self.dirty.remove(SlotDirty::Z_ORDER);
        }

        if self.geometry.is_some() && render == self.mesh_display && self.update_mesh(env) {
            // Deformed vertices already carry the world transform.
            return;
        }

        self.update_transform(cache_frame_index, render, env);
    }

    fn update_display_data(&mut self, env: &SlotEnv<'_>) {
        let prev_frame = self.active_frame;
        let prev_display_data = self.active_display_data.take();
        let prev_geometry = self.geometry.take();
        let prev_texture = self.texture.take();
        self.active_frame = None;
        self.bounding_box = None;

        let mut raw_display_data: Option<Arc<DisplayData>> = None;
        let mut display_data: Option<Arc<DisplayData>> = None;
        if let Some(index) = usize::try_from(self.display_index).ok().filter(|&i| i < self.frames.len()) {
            let frame = &mut self.frames[index];
            self.active_frame = Some(index);
            raw_display_data.clone_from(&frame.raw_display_data);
            display_data.clone_from(&frame.display_data);
            self.geometry = frame.geometry_data().cloned();
            self.bounding_box = frame.bounding_box().cloned();
            self.texture = frame.texture().cloned();
            if self.geometry.is_some() {
                frame.update_deform_vertices();
            }
        }
        self.active_display_data = display_data.clone().or_else(|| raw_display_data.clone());

        let changed = self.active_frame != prev_frame
            || !same_arc(self.active_display_data.as_ref(), prev_display_data.as_ref())
            || !same_arc(self.geometry.as_ref(), prev_geometry.as_ref())
            || !same_arc(self.texture.as_ref(), prev_texture.as_ref());
        if !changed {
            return;
        }

        self.pivot = match (&self.geometry, &self.texture) {
            (None, Some(texture)) => Self::image_pivot(
                texture,
                raw_display_data.as_deref(),
                display_data.as_deref(),
                env.data.scale,
                env.settings.y_down,
            ),
            _ => Vec2::ZERO,
        };

        let mut local = raw_display_data
            .as_deref()
            .or(display_data.as_deref())
            .map_or(Transform2D::IDENTITY, |data| data.transform);
        local.add(&self.offset);
        self.local_matrix = local.to_matrix();

        if !same_arc(self.geometry.as_ref(), prev_geometry.as_ref()) {
            self.dirty.insert(SlotDirty::GEOMETRY | SlotDirty::VERTICES);
            self.geometry_bones.clear();
            if let Some(weight) = self.geometry.as_ref().and_then(|g| g.weight.as_ref()) {
                self.geometry_bones
                    .extend(weight.bones.iter().map(|name| env.data.bone_index(name)));
            }
        }
        if !same_arc(self.texture.as_ref(), prev_texture.as_ref()) {
            self.dirty.insert(SlotDirty::TEXTURE);
        }
        self.dirty.insert(SlotDirty::TRANSFORM);
    }

    /// Pivot of an image display in scaled texture pixels.
    fn image_pivot(
        texture: &TextureData,
        raw: Option<&DisplayData>,
        replaced: Option<&DisplayData>,
        armature_scale: f32,
        y_down: bool,
    ) -> Vec2 {
        let image = match replaced {
            Some(data) if matches!(data.kind, DisplayKind::Image { .. }) => Some(data),
            _ => raw,
        };
        let Some(image) = image else {
            return Vec2::ZERO;
        };
        let DisplayKind::Image { pivot, .. } = image.kind else {
            return Vec2::ZERO;
        };

        let scale = texture.atlas_scale * armature_scale;
        let rect = texture.frame.unwrap_or(texture.region);
        let mut size = rect.size();
        if texture.rotated && texture.frame.is_none() {
            size = Vec2::new(size.y, size.x);
        }

        let mut pivot = pivot * size * scale;
        if let Some(frame) = texture.frame {
            pivot += frame.origin() * scale;
        }

        if let Some(raw) = raw.filter(|raw| !std::ptr::eq(*raw, image)) {
            pivot -= raw.transform.to_matrix().inverse().transform_point2(Vec2::ZERO);
            pivot += image.transform.to_matrix().inverse().transform_point2(Vec2::ZERO);
        }

        if !y_down {
            let height = if texture.rotated {
                texture.region.width
            } else {
                texture.region.height
            };
            pivot.y = height * scale - pivot.y;
        }
        pivot
    }

    fn update_display(&mut self, env: &mut SlotEnv<'_>) {
        let prev_render = self.render_display.unwrap_or(self.raw_display);
        let prev_child = self.child_armature;

        let display = self
            .active_frame
            .and_then(|i| self.frames.get(i))
            .and_then(DisplayFrame::display);
        (self.render_display, self.child_armature) = match display {
            Some(Display::Object(id)) => (Some(id), None),
            Some(Display::Armature(key)) => match env.children.get(key) {
                Some(child) => (Some(child.display()), Some(key)),
                None => {
                    log::warn!("Slot '{}' shows a child armature that no longer exists", self.name);
                    (None, None)
                }
            },
            None => (None, None),
        };

        let current = self.render_display.unwrap_or(self.raw_display);
        if current != prev_render {
            self.dirty.insert(
                SlotDirty::TEXTURE | SlotDirty::VISIBLE | SlotDirty::BLEND_MODE | SlotDirty::COLOR | SlotDirty::TRANSFORM,
            );
            env.backend.on_update_display(current);
            env.backend.replace_display(prev_render, current);
        }

        if self.child_armature == prev_child {
            return;
        }

        if let Some(prev) = prev_child.and_then(|key| env.children.get_mut(key)) {
            log::debug!("Child armature '{}' detached from slot '{}'", prev.name(), self.name);
            if prev.inherit_animation {
                prev.animation_player_mut().reset();
            }
        }

        let Some(child) = self.child_armature.and_then(|key| env.children.get_mut(key)) else {
            return;
        };
        log::debug!("Child armature '{}' attached to slot '{}'", child.name(), self.name);
        if !child.inherit_animation {
            return;
        }
        if child.cache_frame_rate() == 0 && env.cache_frame_rate != 0 {
            child.set_cache_frame_rate(env.cache_frame_rate);
        }

        let actions = self.active_display_data.as_deref().map_or(&[][..], DisplayData::actions);
        if actions.is_empty() {
            child.animation().play(None, -1);
        } else {
            env.actions.extend(actions.iter().map(|action| DeferredAction {
                slot: self.name.clone(),
                action: action.clone(),
            }));
        }
    }

    /// Recomputes deformed vertices when needed. Returns `true` when the
    /// vertices are in armature space and the transform stage must be skipped.
    fn update_mesh(&mut self, env: &mut SlotEnv<'_>) -> bool {
        let Some(geometry) = self.geometry.clone() else {
            return false;
        };
        let parent = &env.bones[self.parent];
        let skinned = geometry.is_skinned();
        let surface = parent.kind() != BoneKind::Bone;
        let bones_changed = self
            .geometry_bones
            .iter()
            .flatten()
            .any(|&bone| env.bones[bone].children_transform_dirty);

        if self.dirty.contains(SlotDirty::VERTICES)
            || (skinned && bones_changed)
            || (surface && parent.children_transform_dirty)
        {
            self.dirty.remove(SlotDirty::VERTICES);
            self.deform(&geometry, env.bones);
            env.backend.update_mesh(self.mesh_display, &self.deformed_vertices);
        }

        skinned || surface
    }

    fn deform(&mut self, geometry: &GeometryData, bones: &[Bone]) {
        let deform = self
            .active_frame
            .and_then(|i| self.frames.get(i))
            .map_or(&[][..], |frame| frame.deform_vertices.as_slice());
        let offset_at = |i: usize| deform.get(i).copied().unwrap_or(Vec2::ZERO);

        self.deformed_vertices.clear();
        if let Some(weight) = &geometry.weight {
            for (i, influences) in weight.influences.iter().enumerate() {
                let position = influences.iter().fold(Vec2::ZERO, |sum, influence| {
                    match self.geometry_bones.get(influence.bone).copied().flatten() {
                        Some(bone) => {
                            let matrix = bones[bone].global_transform_matrix();
                            sum + matrix.transform_point2(influence.offset + offset_at(i)) * influence.weight
                        }
                        None => sum,
                    }
                });
                self.deformed_vertices.push(position);
            }
        } else if bones[self.parent].kind() == BoneKind::Bone {
            self.deformed_vertices
                .extend(geometry.vertices.iter().enumerate().map(|(i, &v)| v + offset_at(i)));
        } else {
            let matrix = *bones[self.parent].global_transform_matrix();
            self.deformed_vertices.extend(
                geometry
                    .vertices
                    .iter()
                    .enumerate()
                    .map(|(i, &v)| matrix.transform_point2(v + offset_at(i))),
            );
        }
    }

    fn update_transform(&mut self, cache_frame_index: i32, render: DisplayId, env: &mut SlotEnv<'_>) {
        let parent = &env.bones[self.parent];
        let parent_matrix = *parent.global_transform_matrix();
        let parent_dirty = parent.children_transform_dirty;
        let mut cache_frame_index = cache_frame_index;

        match self.cached_frame_indices.filter(|_| cache_frame_index >= 0) {
            Some(table) => {
                let cached = env.cache.cached_index(table, cache_frame_index);
                if cached >= 0 && cached == self.cached_frame_index {
                    self.dirty.remove(SlotDirty::TRANSFORM);
                } else if cached >= 0 {
                    self.dirty.insert(SlotDirty::TRANSFORM);
                    self.cached_frame_index = cached;
                } else if self.dirty.contains(SlotDirty::TRANSFORM) || parent_dirty {
                    self.dirty.insert(SlotDirty::TRANSFORM);
                    self.cached_frame_index = -1;
                } else if self.cached_frame_index >= 0 {
                    self.dirty.remove(SlotDirty::TRANSFORM);
                    env.cache.set_cached_index(table, cache_frame_index, self.cached_frame_index);
                } else {
                    self.dirty.insert(SlotDirty::TRANSFORM);
                    self.cached_frame_index = -1;
                }
            }
            None => {
                if self.dirty.contains(SlotDirty::TRANSFORM) || parent_dirty {
                    cache_frame_index = -1;
                    self.dirty.insert(SlotDirty::TRANSFORM);
                    self.cached_frame_index = -1;
                }
            }
        }

        if !self.dirty.contains(SlotDirty::TRANSFORM) {
            return;
        }

        if self.cached_frame_index < 0 {
            self.update_global_transform_matrix(&parent_matrix);
            if let Some(table) = self.cached_frame_indices.filter(|_| cache_frame_index >= 0) {
                self.cached_frame_index = env.cache.push_frame(self.global_matrix, self.global);
                env.cache.set_cached_index(table, cache_frame_index, self.cached_frame_index);
            }
        } else if let Some(frame) = env.cache.frame(self.cached_frame_index) {
            self.global_matrix = frame.matrix;
            self.global = frame.global;
        }

        env.backend.update_transform(render, &self.global_matrix, self.pivot);
        self.dirty.remove(SlotDirty::TRANSFORM);
    }

    fn update_global_transform_matrix(&mut self, parent: &Affine2) {
        self.global_matrix = *parent * self.local_matrix;
        self.global = Transform2D::from_matrix(&self.global_matrix);
    }

    /// Refreshes the global transform outside the tick, for queries.
    pub fn update_transform_and_matrix(&mut self, bones: &[Bone]) {
        if self.dirty.contains(SlotDirty::TRANSFORM) {
            if let Some(parent) = bones.get(self.parent) {
                self.update_global_transform_matrix(parent.global_transform_matrix());
            }
            self.dirty.remove(SlotDirty::TRANSFORM);
        }
    }

    /// Forces display data, display and transform to be re-resolved.
    pub fn invalidate_update(&mut self) {
        self.dirty
            .insert(SlotDirty::DISPLAY_DATA | SlotDirty::DISPLAY | SlotDirty::TRANSFORM);
    }

    pub(crate) fn reset_cache(&mut self) {
        self.cached_frame_index = -1;
        self.cached_frame_indices = None;
        self.dirty.insert(SlotDirty::TRANSFORM);
    }

    // ========================================================================
    // Display selection
    // ========================================================================

    /// Selects a display frame; `-1` hides the slot.
    ///
    /// Animation writes are skipped while the animated value is unchanged,
    /// so a manual selection survives until the timeline moves on.
    pub fn set_display_index(&mut self, value: i32, from_animation: bool) {
        if from_animation {
            if self.animation_display_index == value {
                return;
            }
            self.animation_display_index = value;
        }

        if self.display_index == value {
            return;
        }

        let last = self.frames.len() as i32 - 1;
        self.display_index = value.clamp(-1, last.max(-1));
        self.dirty.insert(SlotDirty::DISPLAY_DATA);

        let shown = self.current_display();
        let selected = usize::try_from(self.display_index)
            .ok()
            .and_then(|i| self.frames.get(i))
            .and_then(DisplayFrame::display);
        if self.display_index < 0 || shown != selected {
            self.dirty.insert(SlotDirty::DISPLAY);
        }
    }

    /// Display the slot resolved on its last update.
    fn current_display(&self) -> Option<Display> {
        match self.child_armature {
            Some(key) => Some(Display::Armature(key)),
            None => self.render_display.map(Display::Object),
        }
    }

    /// Resizes the frame list.
    ///
    /// Growth appends cleared frames from `pool`. Shrinking detaches each
    /// removed frame's display, from the end down, and returns the frame to
    /// `pool`. A selection past the new end moves to the last frame.
    pub fn set_display_frame_count(
        &mut self,
        count: usize,
        pool: &mut Pool<DisplayFrame>,
        backend: &mut dyn DisplayBackend,
    ) {
        let prev = self.frames.len();
        if count > prev {
            self.frames.extend((prev..count).map(|_| pool.acquire()));
            return;
        }

        for index in (count..prev).rev() {
            self.replace_display(None, index as i32, backend);
            if let Some(frame) = self.frames.pop() {
                pool.release(frame);
            }
        }

        if self.display_index >= count as i32 {
            self.display_index = count as i32 - 1;
            self.dirty.insert(SlotDirty::DISPLAY_DATA | SlotDirty::DISPLAY);
        }
        if self.active_frame.is_some_and(|i| i >= count) {
            self.active_frame = None;
        }
    }

    /// Resolves a frame argument; negative means the selected frame (or 0).
    fn frame_index(&self, index: i32) -> Option<usize> {
        let index = if index < 0 { self.display_index.max(0) } else { index };
        usize::try_from(index).ok().filter(|&i| i < self.frames.len())
    }

    fn is_selected(&self, index: usize) -> bool {
        i32::try_from(index).is_ok_and(|i| i == self.display_index)
    }

    fn is_builtin(&self, id: DisplayId) -> bool {
        id == self.raw_display || id == self.mesh_display
    }

    fn has_display(&self, display: Display) -> bool {
        self.frames.iter().any(|frame| frame.display == Some(display))
    }

    /// Sets the concrete display of frame `index`.
    ///
    /// A user display is initialised when first attached and disposed once
    /// no frame references it. Built-in displays are never disposed.
    pub fn replace_display(&mut self, value: Option<Display>, index: i32, backend: &mut dyn DisplayBackend) {
        let Some(index) = self.frame_index(index) else {
            return;
        };
        if self.frames[index].display == value {
            return;
        }

        let already_held = value.is_some_and(|display| self.has_display(display));
        let prev = std::mem::replace(&mut self.frames[index].display, value);

        if let Some(Display::Object(prev)) = prev {
            if !self.is_builtin(prev) && !self.has_display(Display::Object(prev)) {
                backend.dispose_display(prev);
            }
        }
        if let Some(Display::Object(id)) = value {
            if !self.is_builtin(id) && !already_held {
                backend.init_display(id);
            }
        }

        if self.is_selected(index) {
            self.dirty.insert(SlotDirty::DISPLAY);
        }
    }

    /// Overrides the display data of frame `index`.
    pub fn replace_display_data(&mut self, data: Option<Arc<DisplayData>>, index: i32) {
        let Some(index) = self.frame_index(index) else {
            return;
        };
        let frame = &mut self.frames[index];
        if same_arc(frame.display_data.as_ref(), data.as_ref()) || same_arc(frame.raw_display_data.as_ref(), data.as_ref())
        {
            return;
        }
        frame.display_data = data;
        if self.is_selected(index) {
            self.dirty.insert(SlotDirty::DISPLAY_DATA);
        }
    }

    /// Replaces the authored display data of frame `index`.
    ///
    /// `None` restores the default skin's display at that index.
    pub fn replace_raw_display_data(&mut self, data: Option<Arc<DisplayData>>, index: i32, armature: &ArmatureData) {
        let Some(index) = self.frame_index(index) else {
            return;
        };
        let frame = &mut self.frames[index];
        if same_arc(frame.raw_display_data.as_ref(), data.as_ref()) {
            return;
        }

        frame.deform_vertices.clear();
        frame.raw_display_data = data.or_else(|| {
            armature
                .default_skin()
                .and_then(|skin| skin.display(&self.name, index))
                .cloned()
        });
        if self.is_selected(index) {
            self.dirty.insert(SlotDirty::DISPLAY_DATA);
        }
    }

    /// Overrides the texture of frame `index`.
    pub fn replace_texture_data(&mut self, texture: Option<Arc<TextureData>>, index: i32) {
        let Some(index) = self.frame_index(index) else {
            return;
        };
        let frame = &mut self.frames[index];
        if same_arc(frame.texture_data.as_ref(), texture.as_ref()) {
            return;
        }
        frame.texture_data = texture;
        if self.is_selected(index) {
            self.dirty.insert(SlotDirty::DISPLAY_DATA);
        }
    }

    /// Mutable deform offsets of the selected mesh frame.
    pub fn deform_vertices_mut(&mut self) -> Option<&mut [Vec2]> {
        let index = usize::try_from(self.display_index).ok()?;
        let frame = self.frames.get_mut(index)?;
        frame.update_deform_vertices();
        if frame.deform_vertices.is_empty() {
            return None;
        }
        self.dirty.insert(SlotDirty::VERTICES);
        Some(&mut frame.deform_vertices)
    }

    // ========================================================================
    // Hit testing
    // ========================================================================

    /// Tests a point in armature space against the bounding box.
    ///
    /// Uses the global transform from the last update.
    #[must_use]
    pub fn contains_point(&self, point: Vec2) -> bool {
        let Some(bounding_box) = &self.bounding_box else {
            return false;
        };
        let local = self.global_matrix.inverse().transform_point2(point);
        bounding_box.contains_point(local)
    }

    /// Tests a segment in armature space against the bounding box.
    ///
    /// Intersection points come back in armature space and normals as
    /// armature-space angles.
    #[must_use]
    pub fn intersects_segment(&self, a: Vec2, b: Vec2, outputs: HitOutputs) -> SegmentHit {
        let Some(bounding_box) = &self.bounding_box else {
            return SegmentHit::NONE;
        };
        let inverse = self.global_matrix.inverse();
        let mut hit = bounding_box.intersects_segment(inverse.transform_point2(a), inverse.transform_point2(b), outputs);
        if hit.count <= 0 {
            return hit;
        }

        hit.point_a = hit.point_a.map(|p| self.global_matrix.transform_point2(p));
        hit.point_b = hit.point_b.map(|p| self.global_matrix.transform_point2(p));
        hit.normals = hit.normals.map(|angles| {
            let rotate = |angle: f32| {
                let (sin, cos) = angle.sin_cos();
                let v = self.global_matrix.transform_vector2(Vec2::new(cos, sin));
                v.y.atan2(v.x)
            };
            Vec2::new(rotate(angles.x), rotate(angles.y))
        });
        hit
    }

    // ========================================================================
    // Properties
    // ========================================================================

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Index of the bone the slot is attached to.
    #[must_use]
    pub fn parent(&self) -> usize {
        self.parent
    }

    #[must_use]
    pub fn display_index(&self) -> i32 {
        self.display_index
    }

    #[must_use]
    pub fn display_frame_count(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn display_frame(&self, index: usize) -> Option<&DisplayFrame> {
        self.frames.get(index)
    }

    /// Raw display data of the first frame; decides the skin for caching.
    #[must_use]
    pub fn first_raw_display_data(&self) -> Option<&Arc<DisplayData>> {
        self.frames.first()?.raw_display_data.as_ref()
    }

    /// Child armature currently shown.
    #[must_use]
    pub fn child_armature(&self) -> Option<ArmatureKey> {
        self.child_armature
    }

    /// Backend display currently shown, if any.
    #[must_use]
    pub fn render_display(&self) -> Option<DisplayId> {
        self.render_display
    }

    #[must_use]
    pub fn raw_display(&self) -> DisplayId {
        self.raw_display
    }

    #[must_use]
    pub fn mesh_display(&self) -> DisplayId {
        self.mesh_display
    }

    #[must_use]
    pub fn global_transform_matrix(&self) -> &Affine2 {
        &self.global_matrix
    }

    #[must_use]
    pub fn global(&self) -> &Transform2D {
        &self.global
    }

    #[must_use]
    pub fn pivot(&self) -> Vec2 {
        self.pivot
    }

    #[must_use]
    pub fn deformed_vertices(&self) -> &[Vec2] {
        &self.deformed_vertices
    }

    #[must_use]
    pub fn bounding_box_data(&self) -> Option<&Arc<BoundingBoxData>> {
        self.bounding_box.as_ref()
    }

    #[must_use]
    pub fn texture_data(&self) -> Option<&Arc<TextureData>> {
        self.texture.as_ref()
    }

    #[must_use]
    pub fn geometry_data(&self) -> Option<&Arc<GeometryData>> {
        self.geometry.as_ref()
    }

    #[must_use]
    pub fn dirty(&self) -> SlotDirty {
        self.dirty
    }

    #[must_use]
    pub fn cached_frame_index(&self) -> i32 {
        self.cached_frame_index
    }

    #[must_use]
    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        if self.visible != visible {
            self.visible = visible;
            self.dirty.insert(SlotDirty::VISIBLE);
        }
    }

    #[must_use]
    pub fn z_order(&self) -> i32 {
        self.z_order
    }

    pub fn set_z_order(&mut self, z_order: i32) {
        if self.z_order != z_order {
            self.z_order = z_order;
            self.dirty.insert(SlotDirty::Z_ORDER);
        }
    }

    #[must_use]
    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    pub fn set_blend_mode(&mut self, mode: BlendMode) {
        if self.blend_mode != mode {
            self.blend_mode = mode;
            self.dirty.insert(SlotDirty::BLEND_MODE);
        }
    }

    #[must_use]
    pub fn color(&self) -> &ColorTransform {
        &self.color
    }

    pub fn set_color(&mut self, color: ColorTransform) {
        if self.color != color {
            self.color = color;
            self.dirty.insert(SlotDirty::COLOR);
        }
    }
}
