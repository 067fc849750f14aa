//! Authored display data: what a slot can show.

use std::sync::Arc;

use glam::Vec2;
use smallvec::SmallVec;

use crate::geom::{Rect, Transform2D};
use crate::model::bounding_box::BoundingBoxData;

/// One sub-texture inside an atlas page.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    pub name: String,
    /// Packed region inside the atlas page.
    pub region: Rect,
    /// Original untrimmed frame, when the packer trimmed transparent pixels.
    pub frame: Option<Rect>,
    /// Whether the packer rotated the region by 90 degrees.
    pub rotated: bool,
    /// Scale of the atlas page the texture belongs to.
    pub atlas_scale: f32,
}

impl TextureData {
    #[must_use]
    pub fn new(name: impl Into<String>, region: Rect) -> Self {
        Self {
            name: name.into(),
            region,
            frame: None,
            rotated: false,
            atlas_scale: 1.0,
        }
    }
}

/// Influence of one bone over one skinned vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneInfluence {
    /// Index into [`WeightData::bones`].
    pub bone: usize,
    pub weight: f32,
    /// Vertex position in the bone's bind space.
    pub offset: Vec2,
}

/// Skinning weights for a mesh.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WeightData {
    /// Names of the bones referenced by the influences.
    pub bones: Vec<String>,
    /// Per-vertex influences, parallel to [`GeometryData::vertices`].
    pub influences: Vec<SmallVec<[BoneInfluence; 4]>>,
}

/// Vertex data for meshes and paths.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeometryData {
    pub vertices: Vec<Vec2>,
    pub uvs: Vec<Vec2>,
    pub indices: Vec<u16>,
    pub weight: Option<WeightData>,
}

impl GeometryData {
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[must_use]
    pub fn is_skinned(&self) -> bool {
        self.weight.is_some()
    }
}

/// Action fired when a child armature is attached to a slot.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionData {
    /// Fade the child armature into the named clip.
    Play(String),
    /// Surface a named event to the host.
    Event(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DisplayKind {
    Image {
        /// Pivot as a fraction of the texture frame size.
        pivot: Vec2,
        texture: Option<Arc<TextureData>>,
    },
    Mesh {
        geometry: Arc<GeometryData>,
        texture: Option<Arc<TextureData>>,
    },
    Armature {
        /// Name of the armature to instantiate for this display.
        path: String,
        actions: Vec<ActionData>,
    },
    BoundingBox(Arc<BoundingBoxData>),
    Path {
        geometry: Arc<GeometryData>,
    },
}

/// One authored display candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayData {
    pub name: String,
    /// Skin the display was authored in.
    pub skin: String,
    pub transform: Transform2D,
    pub kind: DisplayKind,
}

impl DisplayData {
    #[must_use]
    pub fn new(name: impl Into<String>, skin: impl Into<String>, kind: DisplayKind) -> Self {
        Self {
            name: name.into(),
            skin: skin.into(),
            transform: Transform2D::IDENTITY,
            kind,
        }
    }

    #[must_use]
    pub fn with_transform(mut self, transform: Transform2D) -> Self {
        self.transform = transform;
        self
    }

    #[must_use]
    pub fn texture(&self) -> Option<&Arc<TextureData>> {
        match &self.kind {
            DisplayKind::Image { texture, .. } | DisplayKind::Mesh { texture, .. } => texture.as_ref(),
            _ => None,
        }
    }

    #[must_use]
    pub fn geometry(&self) -> Option<&Arc<GeometryData>> {
        match &self.kind {
            DisplayKind::Mesh { geometry, .. } | DisplayKind::Path { geometry } => Some(geometry),
            _ => None,
        }
    }

    #[must_use]
    pub fn bounding_box(&self) -> Option<&Arc<BoundingBoxData>> {
        match &self.kind {
            DisplayKind::BoundingBox(bb) => Some(bb),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_mesh(&self) -> bool {
        matches!(self.kind, DisplayKind::Mesh { .. })
    }

    #[must_use]
    pub fn is_armature(&self) -> bool {
        matches!(self.kind, DisplayKind::Armature { .. })
    }

    #[must_use]
    pub fn actions(&self) -> &[ActionData] {
        match &self.kind {
            DisplayKind::Armature { actions, .. } => actions,
            _ => &[],
        }
    }
}

/// Pointer equality for optional shared data.
#[inline]
pub(crate) fn same_arc<T>(a: Option<&Arc<T>>, b: Option<&Arc<T>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}
