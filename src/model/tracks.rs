//! Keyframe tracks and the value types they interpolate.

use glam::Vec2;

use crate::geom::Transform2D;

/// Values that can be sampled between two keyframes.
pub trait Interpolatable: Copy + Sized {
    fn interpolate_linear(start: Self, end: Self, t: f32) -> Self;

    /// Hermite interpolation with tangents scaled by the keyframe span `dt`.
    fn interpolate_cubic(v0: Self, out_tangent0: Self, in_tangent1: Self, v1: Self, t: f32, dt: f32)
    -> Self;
}

#[inline]
fn hermite(v0: f32, m0: f32, v1: f32, m1: f32, t: f32) -> f32 {
    let t2 = t * t;
    let t3 = t2 * t;
    let s2 = -2.0 * t3 + 3.0 * t2;
    let s3 = t3 - t2;
    let s0 = 1.0 - s2;
    let s1 = s3 - t2 + t;
    s0 * v0 + s1 * m0 + s2 * v1 + s3 * m1
}

impl Interpolatable for f32 {
    fn interpolate_linear(start: Self, end: Self, t: f32) -> Self {
        start + (end - start) * t
    }

    fn interpolate_cubic(v0: Self, out_tangent0: Self, in_tangent1: Self, v1: Self, t: f32, dt: f32) -> Self {
        hermite(v0, out_tangent0 * dt, v1, in_tangent1 * dt, t)
    }
}

impl Interpolatable for Vec2 {
    fn interpolate_linear(start: Self, end: Self, t: f32) -> Self {
        start.lerp(end, t)
    }

    fn interpolate_cubic(v0: Self, out_tangent0: Self, in_tangent1: Self, v1: Self, t: f32, dt: f32) -> Self {
        Vec2::new(
            hermite(v0.x, out_tangent0.x * dt, v1.x, in_tangent1.x * dt, t),
            hermite(v0.y, out_tangent0.y * dt, v1.y, in_tangent1.y * dt, t),
        )
    }
}

impl Interpolatable for Transform2D {
    fn interpolate_linear(start: Self, end: Self, t: f32) -> Self {
        start.lerp(&end, t)
    }

    fn interpolate_cubic(v0: Self, out_tangent0: Self, in_tangent1: Self, v1: Self, t: f32, dt: f32) -> Self {
        let h = |a: f32, ma: f32, b: f32, mb: f32| hermite(a, ma * dt, b, mb * dt, t);
        Self {
            x: h(v0.x, out_tangent0.x, v1.x, in_tangent1.x),
            y: h(v0.y, out_tangent0.y, v1.y, in_tangent1.y),
            skew: h(v0.skew, out_tangent0.skew, v1.skew, in_tangent1.skew),
            rotation: h(v0.rotation, out_tangent0.rotation, v1.rotation, in_tangent1.rotation),
            scale_x: h(v0.scale_x, out_tangent0.scale_x, v1.scale_x, in_tangent1.scale_x),
            scale_y: h(v0.scale_y, out_tangent0.scale_y, v1.scale_y, in_tangent1.scale_y),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolationMode {
    Linear,
    Step,
    /// Values are stored as `[in_tangent, value, out_tangent]` triples.
    CubicSpline,
}

/// Maximum keyframes scanned linearly before falling back to a binary search.
const MAX_SCAN_OFFSET: usize = 3;

/// Remembers the last keyframe interval a track was sampled in.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyframeCursor {
    pub last_index: usize,
}

#[derive(Debug, Clone)]
pub struct KeyframeTrack<T: Interpolatable> {
    pub times: Vec<f32>,
    pub values: Vec<T>,
    pub interpolation: InterpolationMode,
}

impl<T: Interpolatable> KeyframeTrack<T> {
    #[must_use]
    pub fn new(times: Vec<f32>, values: Vec<T>, interpolation: InterpolationMode) -> Self {
        Self {
            times,
            values,
            interpolation,
        }
    }

    /// Single-keyframe track holding `value` forever.
    #[must_use]
    pub fn constant(value: T) -> Self {
        Self::new(vec![0.0], vec![value], InterpolationMode::Step)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Time of the last keyframe, or `0` for an empty track.
    #[must_use]
    pub fn end_time(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }

    /// Stateless sample using a binary search. `None` for an empty track.
    #[must_use]
    pub fn sample(&self, time: f32) -> Option<T> {
        if self.times.is_empty() {
            return None;
        }
        let next = self.times.partition_point(|&t| t <= time);
        Some(self.sample_at_frame(next.saturating_sub(1), time))
    }

    /// Samples at `time`, starting the keyframe search from `cursor`.
    ///
    /// Sequential playback in either direction resolves in a few steps;
    /// large jumps fall back to a binary search.
    pub fn sample_with_cursor(&self, time: f32, cursor: &mut KeyframeCursor) -> Option<T> {
        let len = self.times.len();
        match len {
            0 => return None,
            1 => return Some(*self.value_at(0)),
            _ => {}
        }

        let i = cursor.last_index.min(len - 1);
        let found = if time >= self.times[i] {
            (0..=MAX_SCAN_OFFSET).map(|offset| i + offset).find_map(|idx| {
                if idx >= len - 1 {
                    (time >= self.times[len - 1]).then_some(len - 1)
                } else {
                    (time < self.times[idx + 1]).then_some(idx)
                }
            })
        } else {
            (0..=MAX_SCAN_OFFSET.min(i))
                .map(|offset| i - offset)
                .find(|&idx| time >= self.times[idx])
        };

        let index = found.unwrap_or_else(|| {
            self.times
                .partition_point(|&t| t <= time)
                .saturating_sub(1)
        });
        cursor.last_index = index;

        Some(self.sample_at_frame(index, time))
    }

    fn value_at(&self, index: usize) -> &T {
        match self.interpolation {
            InterpolationMode::CubicSpline => &self.values[index * 3 + 1],
            _ => &self.values[index],
        }
    }

    fn sample_at_frame(&self, index: usize, time: f32) -> T {
        let len = self.times.len();
        if index >= len - 1 {
            return *self.value_at(len - 1);
        }

        let next = index + 1;
        let t0 = self.times[index];
        let dt = self.times[next] - t0;
        let t = if dt > 1e-6 { ((time - t0) / dt).clamp(0.0, 1.0) } else { 0.0 };

        match self.interpolation {
            InterpolationMode::Step => *self.value_at(index),
            InterpolationMode::Linear => {
                T::interpolate_linear(*self.value_at(index), *self.value_at(next), t)
            }
            InterpolationMode::CubicSpline => {
                let (p, n) = (index * 3, next * 3);
                T::interpolate_cubic(
                    self.values[p + 1],
                    self.values[p + 2],
                    self.values[n],
                    self.values[n + 1],
                    t,
                    dt,
                )
            }
        }
    }
}
