//! Per-armature transform cache.
//!
//! Resolved global transforms are appended to one flat table. Every bone
//! and slot owns, per clip, a cached-frame-index table mapping a cache
//! frame of that clip to an entry of the flat table. A `-1` entry means
//! the frame has not been resolved yet.
//!
//! The cache belongs to a single armature and is only touched from that
//! armature's update, parents before children.

use glam::Affine2;
use rustc_hash::FxHashMap;

use crate::geom::Transform2D;
use crate::model::AnimationData;

/// Handle to one cached-frame-index table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheTableId(usize);

/// Object a cached-frame-index table belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheTarget {
    Bone(usize),
    Slot(usize),
}

/// One resolved global transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachedTransform {
    pub matrix: Affine2,
    pub global: Transform2D,
}

#[derive(Debug, Default)]
pub struct FrameCache {
    frames: Vec<CachedTransform>,
    tables: Vec<Vec<i32>>,
    lookup: FxHashMap<(String, CacheTarget), CacheTableId>,
}

impl FrameCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the table of `target` for `animation`, creating it sized for
    /// `frame_rate`.
    pub fn table_for(&mut self, animation: &AnimationData, frame_rate: f32, target: CacheTarget) -> CacheTableId {
        if let Some(&id) = self.lookup.get(&(animation.name.clone(), target)) {
            return id;
        }

        let frame_count = if frame_rate > 0.0 {
            (animation.duration * frame_rate).ceil() as usize + 1
        } else {
            0
        };
        let id = CacheTableId(self.tables.len());
        self.tables.push(vec![-1; frame_count]);
        self.lookup.insert((animation.name.clone(), target), id);
        id
    }

    /// Entry recorded for `frame` in `table`; `-1` when unset or out of range.
    #[must_use]
    pub fn cached_index(&self, table: CacheTableId, frame: i32) -> i32 {
        usize::try_from(frame)
            .ok()
            .and_then(|frame| self.tables.get(table.0)?.get(frame))
            .copied()
            .unwrap_or(-1)
    }

    /// Records `entry` for `frame`. Out-of-range frames are ignored.
    pub fn set_cached_index(&mut self, table: CacheTableId, frame: i32, entry: i32) {
        let Ok(frame) = usize::try_from(frame) else {
            return;
        };
        if let Some(slot) = self.tables.get_mut(table.0).and_then(|t| t.get_mut(frame)) {
            *slot = entry;
        }
    }

    /// Appends a resolved transform and returns its entry index.
    pub fn push_frame(&mut self, matrix: Affine2, global: Transform2D) -> i32 {
        self.frames.push(CachedTransform { matrix, global });
        (self.frames.len() - 1) as i32
    }

    #[must_use]
    pub fn frame(&self, entry: i32) -> Option<&CachedTransform> {
        self.frames.get(usize::try_from(entry).ok()?)
    }

    /// Whether `table` already holds an entry for `frame`.
    #[must_use]
    pub fn has_entry(&self, table: Option<CacheTableId>, frame: i32) -> bool {
        frame >= 0 && table.is_some_and(|table| self.cached_index(table, frame) >= 0)
    }

    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Forgets every entry and table. Outstanding [`CacheTableId`]s must be dropped.
    pub fn clear(&mut self) {
        self.frames.clear();
        self.tables.clear();
        self.lookup.clear();
    }
}
