//! Authored animation clips.

use crate::geom::Transform2D;
use crate::model::tracks::KeyframeTrack;

/// Bone motion over time.
///
/// Keyframes are offsets from the bone's setup pose: translation, rotation
/// and skew add to it, scale multiplies it (identity offset has scale 1).
#[derive(Debug, Clone)]
pub struct BoneTimeline {
    pub bone: String,
    pub track: KeyframeTrack<Transform2D>,
}

/// Stepped display switches for one slot. `-1` hides the slot.
#[derive(Debug, Clone, Default)]
pub struct SlotDisplayTimeline {
    pub slot: String,
    pub times: Vec<f32>,
    pub indices: Vec<i32>,
}

impl SlotDisplayTimeline {
    #[must_use]
    pub fn new(slot: impl Into<String>, frames: &[(f32, i32)]) -> Self {
        Self {
            slot: slot.into(),
            times: frames.iter().map(|f| f.0).collect(),
            indices: frames.iter().map(|f| f.1).collect(),
        }
    }

    /// Display index in effect at `time`, if any frame has started.
    #[must_use]
    pub fn sample(&self, time: f32) -> Option<i32> {
        let next = self.times.partition_point(|&t| t <= time);
        next.checked_sub(1).and_then(|i| self.indices.get(i).copied())
    }
}

/// Drives one blend-node satellite clip from its primary.
///
/// `progress` maps the primary's time to a normalized position in the
/// satellite clip; `weight` scales the satellite's contribution.
#[derive(Debug, Clone)]
pub struct BlendTimeline {
    pub name: String,
    pub progress: KeyframeTrack<f32>,
    pub weight: KeyframeTrack<f32>,
}

#[derive(Debug, Clone)]
pub struct AnimationData {
    pub name: String,
    /// Clip length in seconds.
    pub duration: f32,
    /// Authored frame count; `0` marks a single-pose clip.
    pub frame_count: u32,
    /// Default repetitions; `0` loops forever.
    pub play_times: u32,
    /// Default fade-in in seconds.
    pub fade_in_time: f32,
    /// Authored playback scale; a time scale sentinel resolves to its inverse.
    pub scale: f32,
    /// Transform cache rate; `0` falls back to the armature's rate.
    pub cache_frame_rate: f32,
    pub bone_timelines: Vec<BoneTimeline>,
    pub slot_timelines: Vec<SlotDisplayTimeline>,
    /// Named sub-timelines that expand into blend-node satellites.
    pub blend_timelines: Vec<BlendTimeline>,
}

impl AnimationData {
    #[must_use]
    pub fn new(name: impl Into<String>, duration: f32, frame_count: u32) -> Self {
        Self {
            name: name.into(),
            duration,
            frame_count,
            play_times: 1,
            fade_in_time: 0.0,
            scale: 1.0,
            cache_frame_rate: 0.0,
            bone_timelines: Vec::new(),
            slot_timelines: Vec::new(),
            blend_timelines: Vec::new(),
        }
    }

    /// Number of cache frames needed to cover the clip at its cache rate.
    #[must_use]
    pub fn cache_frame_count(&self) -> usize {
        if self.cache_frame_rate <= 0.0 {
            return 0;
        }
        (self.duration * self.cache_frame_rate).ceil() as usize + 1
    }

    #[must_use]
    pub fn blend_timeline(&self, name: &str) -> Option<&BlendTimeline> {
        self.blend_timelines.iter().find(|t| t.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_timeline_steps() {
        let timeline = SlotDisplayTimeline::new("eye", &[(0.0, 0), (0.5, 1), (0.8, -1)]);
        assert_eq!(timeline.sample(0.2), Some(0));
        assert_eq!(timeline.sample(0.5), Some(1));
        assert_eq!(timeline.sample(1.0), Some(-1));
        assert_eq!(timeline.sample(-0.1), None);
    }

    #[test]
    fn cache_frames_cover_the_end() {
        let mut clip = AnimationData::new("walk", 1.0, 24);
        assert_eq!(clip.cache_frame_count(), 0);
        clip.cache_frame_rate = 24.0;
        assert_eq!(clip.cache_frame_count(), 25);
    }
}
