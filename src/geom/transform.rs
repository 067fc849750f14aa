use std::f32::consts::{PI, TAU};

use glam::{Affine2, Mat2, Vec2};

/// Wraps an angle into `[-PI, PI]`.
#[inline]
#[must_use]
pub fn normalize_radian(value: f32) -> f32 {
    let value = (value + PI) % TAU;
    if value < 0.0 { value + PI } else { value - PI }
}

/// Decomposed 2D transform: translation, rotation, skew and axis scale.
///
/// The matrix form is
///
/// ```text
/// a =  cos(rotation)        * scale_x
/// b =  sin(rotation)        * scale_x
/// c = -sin(rotation + skew) * scale_y
/// d =  cos(rotation + skew) * scale_y
/// ```
///
/// so `skew` shears the local Y axis away from its orthogonal position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform2D {
    pub x: f32,
    pub y: f32,
    pub skew: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
}

impl Transform2D {
    pub const IDENTITY: Self = Self {
        x: 0.0,
        y: 0.0,
        skew: 0.0,
        rotation: 0.0,
        scale_x: 1.0,
        scale_y: 1.0,
    };

    #[must_use]
    pub const fn from_translation(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            ..Self::IDENTITY
        }
    }

    #[inline]
    #[must_use]
    pub fn translation(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    /// Composes `other` on top of `self`: offsets add, scales multiply.
    pub fn add(&mut self, other: &Self) -> &mut Self {
        self.x += other.x;
        self.y += other.y;
        self.skew += other.skew;
        self.rotation += other.rotation;
        self.scale_x *= other.scale_x;
        self.scale_y *= other.scale_y;
        self
    }

    /// Builds the affine matrix for this transform.
    #[must_use]
    pub fn to_matrix(&self) -> Affine2 {
        let (a, b, c, d) = if self.rotation == 0.0 && self.skew == 0.0 {
            (self.scale_x, 0.0, 0.0, self.scale_y)
        } else {
            let (sin_r, cos_r) = self.rotation.sin_cos();
            let (sin_s, cos_s) = (self.rotation + self.skew).sin_cos();
            (
                cos_r * self.scale_x,
                sin_r * self.scale_x,
                -sin_s * self.scale_y,
                cos_s * self.scale_y,
            )
        };

        Affine2::from_mat2_translation(
            Mat2::from_cols(Vec2::new(a, b), Vec2::new(c, d)),
            Vec2::new(self.x, self.y),
        )
    }

    /// Decomposes an affine matrix.
    ///
    /// Scales come back positive; a mirrored axis shows up as a rotation
    /// or skew of PI instead.
    #[must_use]
    pub fn from_matrix(matrix: &Affine2) -> Self {
        let x_axis = matrix.matrix2.x_axis;
        let y_axis = matrix.matrix2.y_axis;

        let rotation = x_axis.y.atan2(x_axis.x);
        let skew_axis = (-y_axis.x).atan2(y_axis.y);

        Self {
            x: matrix.translation.x,
            y: matrix.translation.y,
            skew: normalize_radian(skew_axis - rotation),
            rotation,
            scale_x: x_axis.length(),
            scale_y: y_axis.length(),
        }
    }

    /// Linear blend toward `end`; angles take the shortest arc.
    #[must_use]
    pub fn lerp(&self, end: &Self, t: f32) -> Self {
        Self {
            x: self.x + (end.x - self.x) * t,
            y: self.y + (end.y - self.y) * t,
            skew: self.skew + normalize_radian(end.skew - self.skew) * t,
            rotation: self.rotation + normalize_radian(end.rotation - self.rotation) * t,
            scale_x: self.scale_x + (end.scale_x - self.scale_x) * t,
            scale_y: self.scale_y + (end.scale_y - self.scale_y) * t,
        }
    }

    /// Returns this transform with its effect scaled by `weight`
    /// around the identity.
    #[must_use]
    pub fn weighted(&self, weight: f32) -> Self {
        Self {
            x: self.x * weight,
            y: self.y * weight,
            skew: normalize_radian(self.skew) * weight,
            rotation: normalize_radian(self.rotation) * weight,
            scale_x: 1.0 + (self.scale_x - 1.0) * weight,
            scale_y: 1.0 + (self.scale_y - 1.0) * weight,
        }
    }

    /// Accumulates `sample` weighted by `weight` into this blended pose.
    pub fn accumulate(&mut self, sample: &Self, weight: f32) {
        self.x += sample.x * weight;
        self.y += sample.y * weight;
        self.skew += normalize_radian(sample.skew) * weight;
        self.rotation += normalize_radian(sample.rotation) * weight;
        self.scale_x += (sample.scale_x - 1.0) * weight;
        self.scale_y += (sample.scale_y - 1.0) * weight;
    }
}

impl Default for Transform2D {
    fn default() -> Self {
        Self::IDENTITY
    }
}
