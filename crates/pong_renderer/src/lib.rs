//! # Pong Renderer
//!
//! The rendering resource and batching layer of a 2D Pong game over Vulkan.
//!
//! ## Features
//!
//! - **Read-through GPU caches**: images and descriptor sets are created on first
//!   reference to an asset and reused for the rest of the session
//! - **Instanced sprites**: per-instance transforms and material colors are streamed
//!   into storage buffers once per frame
//! - **Batching**: contiguous runs of instances sharing a descriptor collapse into a
//!   single instanced draw call
//! - **Single frame in flight**: one fence and two semaphores order CPU and GPU work
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pong_renderer::prelude::*;
//!
//! fn run(assets: Box<dyn AssetSource>) -> Result<(), RenderError> {
//!     let config = RendererConfig::default();
//!     let mut window = Window::new(&config.window.title, config.window.width, config.window.height)?;
//!     let mut renderer = SpriteRenderer::new(&window, &config, assets, &SpirvFileSource)?;
//!
//!     let materials = [Material::new(AssetId(0), Vec4::new(1.0, 1.0, 1.0, 1.0))];
//!     let entities = [Entity::new(0, Vec2::new(100.0, 100.0))];
//!     let labels = [Label::text("PONG", Vec2::new(20.0, 20.0))];
//!
//!     while !window.should_close() {
//!         window.poll_events();
//!         if !renderer.render(&entities, &materials, &labels) {
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod render;

/// Common imports for renderer users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, RenderLimits, RendererConfig, ShaderConfig, WindowConfig},
        foundation::math::{Vec2, Vec4},
        render::{
            assets::{AssetData, AssetId, AssetSource, SpriteSheet, UvRect},
            error::{RenderError, RenderResult},
            frame::{Entity, Label, Material, TextStyle},
            renderer::{ShaderSource, SpirvFileSource, SpriteRenderer},
            vulkan::{Window, WindowError},
        },
    };
}
