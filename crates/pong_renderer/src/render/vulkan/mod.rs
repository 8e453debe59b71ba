//! Vulkan rendering backend
//!
//! RAII wrappers over the handful of Vulkan objects the sprite renderer needs.
//! Each wrapper owns a clone of the logical device and destroys its handle on drop.

pub mod buffer;
pub mod commands;
pub mod context;
pub mod descriptor_set;
pub mod framebuffer;
pub mod image;
pub mod memory;
pub mod render_pass;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod window;

pub use buffer::GpuBuffer;
pub use commands::{ActiveRenderPass, CommandPool, CommandRecorder};
pub use context::{LogicalDevice, PhysicalDeviceInfo, VulkanContext, VulkanError, VulkanInstance, VulkanResult};
pub use descriptor_set::{DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder, DescriptorSetWriter};
pub use framebuffer::Framebuffer;
pub use image::{GpuImage, Sampler};
pub use memory::{find_memory_type_index, MemoryAllocator};
pub use render_pass::RenderPass;
pub use shader::{ShaderModule, SpritePipeline};
pub use swapchain::Swapchain;
pub use sync::{Fence, FrameSync, Semaphore};
pub use window::{Window, WindowError};
