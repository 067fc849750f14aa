#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod animation;
pub mod armature;
pub mod errors;
pub mod geom;
pub mod model;
pub mod settings;
pub mod utils;

pub use animation::{AnimationConfig, AnimationControl, AnimationPlayer, AnimationState, AnimationStateKey, FadeOutMode};
pub use armature::{Armature, ArmatureKey, Bone, Display, DisplayBackend, DisplayId, NullBackend, Slot};
pub use errors::{Result, SinewError};
pub use geom::{ColorTransform, Rect, Transform2D};
pub use model::{
    AnimationData, ArmatureData, BoundingBoxData, BoundingShape, DisplayData, DisplayKind, HitOutputs, SegmentHit,
};
pub use settings::RuntimeSettings;
