//! Display candidates of a slot.

use std::sync::Arc;

use glam::Vec2;

use crate::armature::ArmatureKey;
use crate::armature::backend::DisplayId;
use crate::model::{BoundingBoxData, DisplayData, DisplayKind, GeometryData, TextureData};
use crate::utils::Poolable;

/// Concrete object a frame shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Display {
    /// A backend display object.
    Object(DisplayId),
    /// A child armature owned by the parent armature.
    Armature(ArmatureKey),
}

/// One indexed display candidate of a slot.
///
/// `display_data` and `texture_data` override what the authored
/// `raw_display_data` provides.
#[derive(Debug, Default)]
pub struct DisplayFrame {
    pub(crate) raw_display_data: Option<Arc<DisplayData>>,
    pub(crate) display_data: Option<Arc<DisplayData>>,
    pub(crate) texture_data: Option<Arc<TextureData>>,
    pub(crate) display: Option<Display>,
    pub(crate) deform_vertices: Vec<Vec2>,
}

impl Poolable for DisplayFrame {
    fn clear(&mut self) {
        self.raw_display_data = None;
        self.display_data = None;
        self.texture_data = None;
        self.display = None;
        self.deform_vertices.clear();
    }
}

impl DisplayFrame {
    /// Sizes the deform buffer for the raw geometry, once.
    pub(crate) fn update_deform_vertices(&mut self) {
        if !self.deform_vertices.is_empty() {
            return;
        }
        let count = self
            .raw_display_data
            .as_ref()
            .and_then(|raw| raw.geometry())
            .map_or(0, |geometry| geometry.vertex_count());
        self.deform_vertices.resize(count, Vec2::ZERO);
    }

    /// Geometry of the override display, else of the raw display.
    #[must_use]
    pub fn geometry_data(&self) -> Option<&Arc<GeometryData>> {
        self.display_data
            .as_ref()
            .and_then(|data| data.geometry())
            .or_else(|| self.raw_display_data.as_ref()?.geometry())
    }

    #[must_use]
    pub fn bounding_box(&self) -> Option<&Arc<BoundingBoxData>> {
        self.display_data
            .as_ref()
            .and_then(|data| data.bounding_box())
            .or_else(|| self.raw_display_data.as_ref()?.bounding_box())
    }

    /// Texture resolution order: override display, texture override, raw display.
    ///
    /// An image or mesh override decides alone, even without a texture.
    #[must_use]
    pub fn texture(&self) -> Option<&Arc<TextureData>> {
        if let Some(data) = &self.display_data {
            if matches!(data.kind, DisplayKind::Image { .. } | DisplayKind::Mesh { .. }) {
                return data.texture();
            }
        }
        if self.texture_data.is_some() {
            return self.texture_data.as_ref();
        }
        self.raw_display_data.as_ref()?.texture()
    }

    #[must_use]
    pub fn raw_display_data(&self) -> Option<&Arc<DisplayData>> {
        self.raw_display_data.as_ref()
    }

    #[must_use]
    pub fn display_data(&self) -> Option<&Arc<DisplayData>> {
        self.display_data.as_ref()
    }

    #[must_use]
    pub fn display(&self) -> Option<Display> {
        self.display
    }

    #[must_use]
    pub fn deform_vertices(&self) -> &[Vec2] {
        &self.deform_vertices
    }
}
