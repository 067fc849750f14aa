//! Immutable authored data consumed by the runtime.
//!
//! Everything here is produced by an external loader and shared between
//! armature instances through `Arc`. The runtime never mutates it.

pub mod animation_data;
pub mod armature_data;
pub mod bounding_box;
pub mod display;
pub mod tracks;

pub use animation_data::{AnimationData, BlendTimeline, BoneTimeline, SlotDisplayTimeline};
pub use armature_data::{
    ArmatureData, BlendMode, BoneData, BoneKind, DEFAULT_SKIN_NAME, SkinData, SlotData,
};
pub use bounding_box::{
    BoundingBoxData, BoundingShape, EllipseBoundingBox, HitOutputs, PolygonBoundingBox,
    RectangleBoundingBox, SegmentHit, ellipse_intersects_segment, polygon_intersects_segment,
    rectangle_intersects_segment,
};
pub use display::{
    ActionData, BoneInfluence, DisplayData, DisplayKind, GeometryData, TextureData, WeightData,
};
pub use tracks::{InterpolationMode, Interpolatable, KeyframeCursor, KeyframeTrack};
