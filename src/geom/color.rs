/// Per-channel multiply-then-offset color adjustment applied to a slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorTransform {
    pub alpha_multiplier: f32,
    pub red_multiplier: f32,
    pub green_multiplier: f32,
    pub blue_multiplier: f32,
    pub alpha_offset: i16,
    pub red_offset: i16,
    pub green_offset: i16,
    pub blue_offset: i16,
}

impl ColorTransform {
    pub const IDENTITY: Self = Self {
        alpha_multiplier: 1.0,
        red_multiplier: 1.0,
        green_multiplier: 1.0,
        blue_multiplier: 1.0,
        alpha_offset: 0,
        red_offset: 0,
        green_offset: 0,
        blue_offset: 0,
    };

    #[must_use]
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

impl Default for ColorTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}
