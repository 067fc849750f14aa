//! Runtime armature: bones, slots, display frames and the transform cache.

pub mod backend;
pub mod bone;
pub mod cache;
pub mod display_frame;
pub mod instance;
pub mod slot;

pub use backend::{BuiltinDisplay, DisplayBackend, DisplayId, FrameUpdate, NullBackend};
pub use bone::Bone;
pub use cache::{CacheTableId, CacheTarget, CachedTransform, FrameCache};
pub use display_frame::{Display, DisplayFrame};
pub use instance::{Armature, ArmatureEvent, ArmatureKey, Rig, SlotEditor};
pub use slot::{Slot, SlotDirty};
