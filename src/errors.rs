//! Error Types
//!
//! This module defines the error types used throughout the runtime.
//!
//! # Overview
//!
//! The main error type [`SinewError`] covers construction-time failures:
//! - Authored armature data that references unknown bones or parents
//! - Bone hierarchies that are not stored parents-first
//! - Degenerate bounding-box geometry
//! - Malformed runtime settings
//!
//! Playback itself never fails hard. Unknown clip names, out-of-range
//! positions and similar designer mistakes are logged and corrected.
//!
//! # Usage
//!
//! ```rust,ignore
//! use sinew::errors::{SinewError, Result};
//!
//! fn build() -> Result<()> {
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// The main error type for the Sinew runtime.
#[derive(Error, Debug)]
pub enum SinewError {
    // ========================================================================
    // Authored Data Errors
    // ========================================================================
    /// A bone names a parent that does not exist in the armature.
    #[error("Bone '{bone}' in armature '{armature}' references unknown parent '{parent}'")]
    UnknownParentBone {
        armature: String,
        bone: String,
        parent: String,
    },

    /// A bone appears before its parent in the bone list.
    #[error("Bone '{bone}' in armature '{armature}' is stored before its parent '{parent}'")]
    BoneOrder {
        armature: String,
        bone: String,
        parent: String,
    },

    /// A slot is attached to a bone that does not exist.
    #[error("Slot '{slot}' in armature '{armature}' references unknown bone '{bone}'")]
    UnknownSlotParent {
        armature: String,
        slot: String,
        bone: String,
    },

    /// Two bones or two slots share the same name.
    #[error("Duplicate {kind} name '{name}' in armature '{armature}'")]
    DuplicateName {
        armature: String,
        kind: &'static str,
        name: String,
    },

    /// The armature declares no skins at all.
    #[error("Armature '{0}' has no default skin")]
    MissingDefaultSkin(String),

    // ========================================================================
    // Geometry Errors
    // ========================================================================
    /// A polygon bounding box needs at least three vertices.
    #[error("Polygon bounding box needs at least 3 vertices, got {0}")]
    DegeneratePolygon(usize),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Runtime settings could not be parsed.
    #[error("Settings parse error: {0}")]
    Settings(#[from] serde_json::Error),
}

/// Alias for `Result<T, SinewError>`.
pub type Result<T> = std::result::Result<T, SinewError>;
