//! Runtime Settings
//!
//! Global knobs that affect how authored data is interpreted at runtime.
//! Settings are plain data and can be loaded from JSON.

use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Runtime-wide configuration shared by every armature built with it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Whether the host coordinate system has Y pointing down.
    ///
    /// When `false`, image pivots are flipped against the texture region
    /// height so that authored pivots keep their visual meaning.
    pub y_down: bool,

    /// Cache frame rate applied to armatures whose authored rate is 0.
    ///
    /// `0` keeps the authored value.
    pub default_cache_frame_rate: u32,
}

impl RuntimeSettings {
    #[must_use]
    pub fn new() -> Self {
        Self {
            y_down: true,
            default_cache_frame_rate: 0,
        }
    }

    /// Parses settings from a JSON document. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self::new()
    }
}
