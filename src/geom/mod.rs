//! 2D geometry primitives shared by authored data and runtime objects.

pub mod color;
pub mod rect;
pub mod transform;

pub use color::ColorTransform;
pub use rect::Rect;
pub use transform::{Transform2D, normalize_radian};
