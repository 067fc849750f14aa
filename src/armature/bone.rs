//! Runtime bone.
//!
//! A bone's local transform is its setup pose composed with the blended
//! animation pose and a user offset. The global matrix is resolved once per
//! tick, parents first, and can be served from the armature's
//! [`FrameCache`] while a single cached clip plays.

use glam::Affine2;

use crate::armature::cache::{CacheTableId, FrameCache};
use crate::geom::Transform2D;
use crate::model::{BoneData, BoneKind};

#[derive(Debug, Clone)]
pub struct Bone {
    pub(crate) name: String,
    pub(crate) parent: Option<usize>,
    kind: BoneKind,
    length: f32,
    /// Setup pose relative to the parent.
    origin: Transform2D,

    /// User offset composed on top of the animated pose.
    ///
    /// Call [`Bone::invalidate_update`] after editing it.
    pub offset: Transform2D,
    /// Blended result of every animation state this tick.
    pub(crate) animation_pose: Transform2D,

    global: Transform2D,
    global_matrix: Affine2,
    visible: bool,

    transform_dirty: bool,
    /// Set for the tick in which this bone recomputed its global transform.
    pub(crate) children_transform_dirty: bool,

    cached_frame_index: i32,
    pub(crate) cached_frame_indices: Option<CacheTableId>,
}

impl Bone {
    pub(crate) fn new(data: &BoneData, parent: Option<usize>) -> Self {
        Self {
            name: data.name.clone(),
            parent,
            kind: data.kind,
            length: data.length,
            origin: data.transform,
            offset: Transform2D::IDENTITY,
            animation_pose: Transform2D::IDENTITY,
            global: data.transform,
            global_matrix: data.transform.to_matrix(),
            visible: true,
            transform_dirty: true,
            children_transform_dirty: false,
            cached_frame_index: -1,
            cached_frame_indices: None,
        }
    }

    /// Resolves the global transform for this tick.
    ///
    /// `parent` carries the parent's global matrix and whether it changed
    /// this tick. `cache_frame_index` is `-1` when caching is disabled.
    pub(crate) fn update(
        &mut self,
        cache_frame_index: i32,
        parent: Option<(&Affine2, bool)>,
        cache: &mut FrameCache,
    ) {
        let parent_dirty = parent.is_some_and(|(_, dirty)| dirty);
        let mut cache_frame_index = cache_frame_index;

        match self.cached_frame_indices.filter(|_| cache_frame_index >= 0) {
            Some(table) => {
                let cached = cache.cached_index(table, cache_frame_index);
                if cached >= 0 && cached == self.cached_frame_index {
                    self.transform_dirty = false;
                } else if cached >= 0 {
                    self.transform_dirty = true;
                    self.cached_frame_index = cached;
                } else if self.transform_dirty || parent_dirty {
                    self.transform_dirty = true;
                    self.cached_frame_index = -1;
                } else if self.cached_frame_index >= 0 {
                    // Same pose as an earlier cache frame.
                    self.transform_dirty = false;
                    cache.set_cached_index(table, cache_frame_index, self.cached_frame_index);
                } else {
                    self.transform_dirty = true;
                    self.cached_frame_index = -1;
                }
            }
            None => {
                if self.transform_dirty || parent_dirty {
                    cache_frame_index = -1;
                    self.transform_dirty = true;
                    self.cached_frame_index = -1;
                }
            }
        }

        if self.transform_dirty {
            self.transform_dirty = false;
            self.children_transform_dirty = true;

            if self.cached_frame_index < 0 {
                self.update_global(parent.map(|(matrix, _)| matrix));
                if let Some(table) = self.cached_frame_indices.filter(|_| cache_frame_index >= 0) {
                    self.cached_frame_index = cache.push_frame(self.global_matrix, self.global);
                    cache.set_cached_index(table, cache_frame_index, self.cached_frame_index);
                }
            } else if let Some(frame) = cache.frame(self.cached_frame_index) {
                self.global_matrix = frame.matrix;
                self.global = frame.global;
            }
        } else if self.children_transform_dirty {
            self.children_transform_dirty = false;
        }
    }

    fn update_global(&mut self, parent: Option<&Affine2>) {
        let mut local = self.origin;
        local.add(&self.animation_pose).add(&self.offset);
        let local_matrix = local.to_matrix();

        self.global_matrix = match parent {
            Some(parent) => *parent * local_matrix,
            None => local_matrix,
        };
        self.global = Transform2D::from_matrix(&self.global_matrix);
    }

    /// Forces the global transform to be recomputed on the next update.
    pub fn invalidate_update(&mut self) {
        self.transform_dirty = true;
    }

    /// Drops any cache binding; used when the cache itself is rebuilt.
    pub(crate) fn reset_cache(&mut self) {
        self.cached_frame_index = -1;
        self.cached_frame_indices = None;
        self.transform_dirty = true;
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    #[must_use]
    pub fn kind(&self) -> BoneKind {
        self.kind
    }

    #[must_use]
    pub fn length(&self) -> f32 {
        self.length
    }

    #[must_use]
    pub fn origin(&self) -> &Transform2D {
        &self.origin
    }

    #[must_use]
    pub fn animation_pose(&self) -> &Transform2D {
        &self.animation_pose
    }

    /// Decomposed global transform.
    #[must_use]
    pub fn global(&self) -> &Transform2D {
        &self.global
    }

    #[must_use]
    pub fn global_transform_matrix(&self) -> &Affine2 {
        &self.global_matrix
    }

    #[must_use]
    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    #[must_use]
    pub fn cached_frame_index(&self) -> i32 {
        self.cached_frame_index
    }
}
