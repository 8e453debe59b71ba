//! Sprite rendering: GPU wrappers, resource caches, per-frame streams and the frame driver

pub mod assets;
pub mod error;
pub mod frame;
pub mod renderer;
pub mod resources;
pub mod vulkan;

pub use assets::{AssetData, AssetId, AssetSource, SpriteSheet, UvRect};
pub use error::{RenderError, RenderResult};
pub use renderer::{FramePhase, FrameTracker, ShaderSource, SpirvFileSource, SpriteRenderer};
