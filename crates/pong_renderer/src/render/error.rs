//! Renderer error types
//!
//! Every failure in this layer is fatal to the frame loop. The variants exist so
//! callers and tests can tell *which* budget or collaborator failed.

use crate::config::ConfigError;
use crate::render::assets::AssetId;
use crate::render::renderer::FramePhase;
use crate::render::vulkan::{VulkanError, WindowError};

/// Result type for renderer operations
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors that can occur while building or drawing a frame
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// A fixed-capacity resource is full
    #[error("{resource} capacity exceeded: {requested} > {capacity}")]
    CapacityExceeded {
        /// Which budget was exceeded
        resource: &'static str,
        /// Amount that was needed
        requested: u64,
        /// Configured capacity
        capacity: u64,
    },

    /// A graphics API call failed
    #[error(transparent)]
    Vulkan(#[from] VulkanError),

    /// The asset collaborator returned no data for an identifier
    #[error("No data available for asset {0}")]
    MissingAsset(AssetId),

    /// The asset collaborator returned unusable data
    #[error("Invalid data for asset {asset}: {reason}")]
    InvalidAsset {
        /// Offending asset
        asset: AssetId,
        /// What is wrong with the data
        reason: String,
    },

    /// An entity or text style referenced a material that does not exist
    #[error("Material index {index} out of range ({count} materials)")]
    MaterialOutOfRange {
        /// Requested material index
        index: u32,
        /// Number of materials supplied this frame
        count: usize,
    },

    /// An instance was pushed to a batch that is no longer the open one
    #[error("Batch {handle} is not the open batch ({open} is)")]
    BatchInterleaved {
        /// Index of the batch the caller pushed to
        handle: usize,
        /// Index of the currently open batch
        open: usize,
    },

    /// An instance was pushed through a handle from an earlier frame or a discarded batch
    #[error("Stale batch handle")]
    StaleBatchHandle,

    /// Shader bytecode could not be loaded
    #[error("Shader error: {0}")]
    Shader(String),

    /// Window creation or surface setup failed
    #[error(transparent)]
    Window(#[from] WindowError),

    /// An earlier frame failed after GPU work was queued; the renderer cannot draw again
    #[error("Renderer unusable after a failure during {phase:?}")]
    Poisoned {
        /// Phase the fatal failure happened in
        phase: FramePhase,
    },

    /// Configuration could not be loaded or is invalid
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl RenderError {
    /// Build a [`RenderError::CapacityExceeded`]
    pub fn capacity(resource: &'static str, requested: impl TryInto<u64>, capacity: impl TryInto<u64>) -> Self {
        Self::CapacityExceeded {
            resource,
            requested: requested.try_into().unwrap_or(u64::MAX),
            capacity: capacity.try_into().unwrap_or(u64::MAX),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_message() {
        let error = RenderError::capacity("image cache", 17usize, 16usize);
        assert_eq!(error.to_string(), "image cache capacity exceeded: 17 > 16");
    }

    #[test]
    fn test_vulkan_error_converts() {
        let error: RenderError = VulkanError::Api(ash::vk::Result::ERROR_DEVICE_LOST).into();
        assert!(matches!(error, RenderError::Vulkan(VulkanError::Api(_))));
    }
}
