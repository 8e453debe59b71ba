//! Math utilities and types

pub use nalgebra::{Vector2, Vector4};

/// 2D vector type, used for screen-space positions and sizes
pub type Vec2 = Vector2<f32>;

/// 4D vector type, used for RGBA colors
pub type Vec4 = Vector4<f32>;
