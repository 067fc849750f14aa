//! Authored armature data: skeleton, slots, skins and clips.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::errors::{Result, SinewError};
use crate::geom::{ColorTransform, Transform2D};
use crate::model::animation_data::AnimationData;
use crate::model::display::DisplayData;

/// Name of the skin used when an armature does not declare one explicitly.
pub const DEFAULT_SKIN_NAME: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoneKind {
    #[default]
    Bone,
    /// Deformable surface; its deformation grid is computed by the host.
    Surface,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoneData {
    pub name: String,
    pub parent: Option<String>,
    pub kind: BoneKind,
    pub length: f32,
    /// Setup pose relative to the parent.
    pub transform: Transform2D,
}

impl BoneData {
    #[must_use]
    pub fn new(name: impl Into<String>, parent: Option<&str>) -> Self {
        Self {
            name: name.into(),
            parent: parent.map(str::to_owned),
            kind: BoneKind::Bone,
            length: 0.0,
            transform: Transform2D::IDENTITY,
        }
    }

    #[must_use]
    pub fn with_transform(mut self, transform: Transform2D) -> Self {
        self.transform = transform;
        self
    }

    #[must_use]
    pub fn with_kind(mut self, kind: BoneKind) -> Self {
        self.kind = kind;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    #[default]
    Normal,
    Add,
    Alpha,
    Darken,
    Difference,
    Erase,
    HardLight,
    Invert,
    Layer,
    Lighten,
    Multiply,
    Overlay,
    Screen,
    Subtract,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlotData {
    pub name: String,
    /// Name of the bone the slot is attached to.
    pub parent: String,
    /// Display shown in the setup pose; `-1` shows nothing.
    pub display_index: i32,
    pub z_order: i32,
    pub blend_mode: BlendMode,
    pub color: ColorTransform,
}

impl SlotData {
    #[must_use]
    pub fn new(name: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: parent.into(),
            display_index: 0,
            z_order: 0,
            blend_mode: BlendMode::Normal,
            color: ColorTransform::IDENTITY,
        }
    }
}

/// Display candidates per slot for one skin.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkinData {
    pub name: String,
    pub displays: FxHashMap<String, Vec<Option<Arc<DisplayData>>>>,
}

impl SkinData {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            displays: FxHashMap::default(),
        }
    }

    pub fn add_display(&mut self, slot: &str, display: Option<Arc<DisplayData>>) {
        self.displays.entry(slot.to_owned()).or_default().push(display);
    }

    #[must_use]
    pub fn slot_displays(&self, slot: &str) -> &[Option<Arc<DisplayData>>] {
        self.displays.get(slot).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn display(&self, slot: &str, index: usize) -> Option<&Arc<DisplayData>> {
        self.slot_displays(slot).get(index)?.as_ref()
    }
}

/// Immutable skeleton description shared by every armature instance.
#[derive(Debug, Clone)]
pub struct ArmatureData {
    pub name: String,
    pub frame_rate: u32,
    /// Rate at which transforms are cached; `0` disables caching.
    pub cache_frame_rate: u32,
    pub scale: f32,
    /// Bones, parents first.
    pub bones: Vec<BoneData>,
    /// Slots in draw order.
    pub slots: Vec<SlotData>,
    pub skins: Vec<SkinData>,
    pub animations: Vec<Arc<AnimationData>>,
    pub default_animation: Option<String>,
}

impl ArmatureData {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            frame_rate: 24,
            cache_frame_rate: 0,
            scale: 1.0,
            bones: Vec::new(),
            slots: Vec::new(),
            skins: Vec::new(),
            animations: Vec::new(),
            default_animation: None,
        }
    }

    /// The skin named [`DEFAULT_SKIN_NAME`], or the first skin.
    #[must_use]
    pub fn default_skin(&self) -> Option<&SkinData> {
        self.skins
            .iter()
            .find(|s| s.name == DEFAULT_SKIN_NAME)
            .or_else(|| self.skins.first())
    }

    #[must_use]
    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    #[must_use]
    pub fn slot_index(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.name == name)
    }

    #[must_use]
    pub fn animation(&self, name: &str) -> Option<&Arc<AnimationData>> {
        self.animations.iter().find(|a| a.name == name)
    }

    /// Checks the structural invariants the runtime relies on.
    pub fn validate(&self) -> Result<()> {
        let mut seen = FxHashSet::default();
        for bone in &self.bones {
            if !seen.insert(bone.name.as_str()) {
                return Err(SinewError::DuplicateName {
                    armature: self.name.clone(),
                    kind: "bone",
                    name: bone.name.clone(),
                });
            }
            if let Some(parent) = &bone.parent {
                if !seen.contains(parent.as_str()) {
                    return Err(if self.bone_index(parent).is_some() {
                        SinewError::BoneOrder {
                            armature: self.name.clone(),
                            bone: bone.name.clone(),
                            parent: parent.clone(),
                        }
                    } else {
                        SinewError::UnknownParentBone {
                            armature: self.name.clone(),
                            bone: bone.name.clone(),
                            parent: parent.clone(),
                        }
                    });
                }
            }
        }

        let mut slot_names = FxHashSet::default();
        for slot in &self.slots {
            if !slot_names.insert(slot.name.as_str()) {
                return Err(SinewError::DuplicateName {
                    armature: self.name.clone(),
                    kind: "slot",
                    name: slot.name.clone(),
                });
            }
            if !seen.contains(slot.parent.as_str()) {
                return Err(SinewError::UnknownSlotParent {
                    armature: self.name.clone(),
                    slot: slot.name.clone(),
                    bone: slot.parent.clone(),
                });
            }
        }

        if self.default_skin().is_none() {
            return Err(SinewError::MissingDefaultSkin(self.name.clone()));
        }

        Ok(())
    }
}
