//! Descriptor sets binding the shared sprite buffers to one texture

use ash::{vk, Device};

use super::DescriptorBinder;
use crate::render::assets::AssetId;
use crate::render::error::RenderResult;
use crate::render::vulkan::{DescriptorPool, DescriptorSetWriter, GpuImage, Sampler};

/// Buffers every sprite descriptor set references
#[derive(Debug, Clone, Copy)]
pub struct SharedBuffers {
    /// Global uniform (screen size)
    pub global: vk::Buffer,
    /// Instance transform storage buffer
    pub transforms: vk::Buffer,
    /// Material storage buffer
    pub materials: vk::Buffer,
}

/// Allocates one set per texture from a fixed-size pool
pub struct VulkanDescriptorBinder {
    device: Device,
    pool: DescriptorPool,
    layout: vk::DescriptorSetLayout,
    sampler: Sampler,
    buffers: SharedBuffers,
}

impl VulkanDescriptorBinder {
    /// Create a pool for `max_sets` sets of `layout`
    pub fn new(
        device: Device,
        layout: vk::DescriptorSetLayout,
        buffers: SharedBuffers,
        max_sets: u32,
    ) -> RenderResult<Self> {
        let pool = DescriptorPool::new(device.clone(), max_sets)?;
        let sampler = Sampler::new_pixel_art(device.clone())?;

        Ok(Self {
            device,
            pool,
            layout,
            sampler,
            buffers,
        })
    }
}

impl DescriptorBinder for VulkanDescriptorBinder {
    type Texture = GpuImage;
    type Set = vk::DescriptorSet;

    fn bind(&mut self, asset: AssetId, texture: &GpuImage) -> RenderResult<vk::DescriptorSet> {
        let set = self.pool.allocate(self.layout)?;

        DescriptorSetWriter::new(set)
            .uniform_buffer(0, self.buffers.global)
            .storage_buffer(1, self.buffers.transforms)
            .storage_buffer(2, self.buffers.materials)
            .combined_image_sampler(3, texture.view(), self.sampler.handle())
            .update(&self.device);

        log::trace!("Wrote descriptor set {set:?} for asset {asset}");
        Ok(set)
    }
}
