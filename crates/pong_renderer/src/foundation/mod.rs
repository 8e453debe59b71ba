//! Foundation module - Core utilities and types
//!
//! - Math types used by the sprite pipeline
//! - Logging utilities

pub mod logging;
pub mod math;
