//! Animation playback: requests, blend weights, states and the per-armature player.

pub mod blend;
pub mod config;
pub mod control;
pub mod player;
pub mod state;

pub use blend::{BlendKind, BlendState, BlendTable, BlendTarget};
pub use config::{AnimationConfig, FadeOutMode, TIME_SCALE_FROM_CLIP};
pub use control::AnimationControl;
pub use player::AnimationPlayer;
pub use state::{AnimationState, AnimationStateKey, FadeState, SubFadeState};
