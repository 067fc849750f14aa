//! Play requests.

/// Which existing states a new play request fades out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FadeOutMode {
    /// Leave every other state alone.
    None,
    /// Fade out states on the same layer.
    SameLayer,
    /// Fade out states in the same group.
    SameGroup,
    /// Fade out states on the same layer and in the same group.
    #[default]
    SameLayerAndGroup,
    /// Fade out every state.
    All,
    /// Reuse a non-fading state playing the same clip on the same layer
    /// instead of creating a new one.
    Single,
}

/// A play request, normalized in place by the player before use.
///
/// Negative times and play counts mean "use the clip default".
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationConfig {
    /// Clip to play.
    pub animation: String,
    /// Name of the created state; defaults to the clip name.
    pub name: String,
    pub group: String,
    pub layer: i32,
    /// Repetitions; `0` loops forever, negative uses the clip default.
    pub play_times: i32,
    /// Start offset in seconds.
    pub position: f32,
    /// Span to play in seconds; `0` or negative plays to the clip end.
    pub duration: f32,
    pub time_scale: f32,
    pub weight: f32,
    pub fade_in_time: f32,
    pub fade_out_time: f32,
    pub fade_out_mode: FadeOutMode,
    /// Stop the playhead of states being faded out by this request.
    pub pause_fade_out: bool,
    /// Whether the state fires authored actions and drives slot displays.
    pub action_enabled: bool,
    /// Whether bones the clip does not animate snap back to the setup pose.
    pub reset_to_pose: bool,
}

/// Time scale at or below this value resolves to the inverse clip scale.
pub const TIME_SCALE_FROM_CLIP: f32 = -100.0;

impl AnimationConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            animation: String::new(),
            name: String::new(),
            group: String::new(),
            layer: 0,
            play_times: -1,
            position: 0.0,
            duration: 0.0,
            time_scale: TIME_SCALE_FROM_CLIP,
            weight: 1.0,
            fade_in_time: -1.0,
            fade_out_time: -1.0,
            fade_out_mode: FadeOutMode::SameLayerAndGroup,
            pause_fade_out: true,
            action_enabled: true,
            reset_to_pose: true,
        }
    }

    #[must_use]
    pub fn with_animation(animation: impl Into<String>) -> Self {
        Self {
            animation: animation.into(),
            ..Self::new()
        }
    }

    /// Restores every field to its default, keeping string allocations.
    pub fn clear(&mut self) {
        let mut animation = std::mem::take(&mut self.animation);
        let mut name = std::mem::take(&mut self.name);
        let mut group = std::mem::take(&mut self.group);
        animation.clear();
        name.clear();
        group.clear();

        *self = Self {
            animation,
            name,
            group,
            ..Self::new()
        };
    }
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_restores_defaults() {
        let mut config = AnimationConfig::with_animation("run");
        config.layer = 3;
        config.group = "legs".into();
        config.fade_out_mode = FadeOutMode::All;
        config.clear();
        assert_eq!(config, AnimationConfig::new());
    }
}
