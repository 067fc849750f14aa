//! Rendering backend abstraction.
//!
//! Defines a [`DisplayBackend`] trait that decouples the slot pipeline from
//! any particular rendering engine. The runtime decides *when* a display
//! object must change and *with what data*; the backend decides how that
//! looks on screen.
//!
//! Display objects are opaque [`DisplayId`] handles minted by the backend.
//! The runtime only compares and stores them.

use glam::{Affine2, Vec2};

use crate::geom::ColorTransform;
use crate::model::{BlendMode, GeometryData, SlotData, TextureData};

/// Opaque handle to a backend display object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DisplayId(pub u64);

/// The two display objects every slot owns for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinDisplay {
    /// Shows plain images.
    Raw,
    /// Shows deformable meshes.
    Mesh,
}

/// Texture and geometry a built-in display should show.
#[derive(Debug, Clone, Copy)]
pub struct FrameUpdate<'a> {
    pub texture: Option<&'a TextureData>,
    pub geometry: Option<&'a GeometryData>,
    /// Image pivot in texture pixels, already scaled.
    pub pivot: Vec2,
}

/// Per-engine display hooks.
///
/// Only display creation is mandatory. Every update hook defaults to a
/// no-op so headless hosts can ignore what they do not draw.
pub trait DisplayBackend: std::fmt::Debug {
    /// Creates one of the built-in displays of a slot.
    fn create_display(&mut self, slot: &SlotData, kind: BuiltinDisplay) -> DisplayId;

    /// Creates the root display object of an armature.
    fn create_armature_display(&mut self, armature: &str) -> DisplayId;

    /// A user-supplied display was attached to a slot for the first time.
    #[allow(unused_variables)]
    fn init_display(&mut self, display: DisplayId) {}

    /// A user-supplied display is no longer referenced by any frame.
    #[allow(unused_variables)]
    fn dispose_display(&mut self, display: DisplayId) {}

    /// The slot switched to `current` as its render display.
    #[allow(unused_variables)]
    fn on_update_display(&mut self, current: DisplayId) {}

    /// `current` takes the place of `previous` in the display tree.
    #[allow(unused_variables)]
    fn replace_display(&mut self, previous: DisplayId, current: DisplayId) {}

    #[allow(unused_variables)]
    fn update_visible(&mut self, display: DisplayId, visible: bool) {}

    #[allow(unused_variables)]
    fn update_blend_mode(&mut self, display: DisplayId, mode: BlendMode) {}

    #[allow(unused_variables)]
    fn update_color(&mut self, display: DisplayId, color: &ColorTransform) {}

    #[allow(unused_variables)]
    fn update_z_order(&mut self, display: DisplayId, z_order: i32) {}

    /// The texture or geometry of a built-in display changed.
    #[allow(unused_variables)]
    fn update_frame(&mut self, display: DisplayId, frame: &FrameUpdate<'_>) {}

    /// Deformed vertices of a mesh display, in the space the mesh is drawn in.
    #[allow(unused_variables)]
    fn update_mesh(&mut self, display: DisplayId, vertices: &[Vec2]) {}

    /// New global transform of a display.
    #[allow(unused_variables)]
    fn update_transform(&mut self, display: DisplayId, matrix: &Affine2, pivot: Vec2) {}
}

/// Backend that only hands out ids. Useful for headless playback.
#[derive(Debug, Default)]
pub struct NullBackend {
    next: u64,
}

impl NullBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> DisplayId {
        self.next += 1;
        DisplayId(self.next)
    }
}

impl DisplayBackend for NullBackend {
    fn create_display(&mut self, _slot: &SlotData, _kind: BuiltinDisplay) -> DisplayId {
        self.next_id()
    }

    fn create_armature_display(&mut self, _armature: &str) -> DisplayId {
        self.next_id()
    }
}
