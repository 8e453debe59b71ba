//! Synchronous texture uploads through one shared staging buffer
//!
//! Every upload waits on its own fence before returning, so the staging buffer
//! is never written while the GPU may still be reading it.

use ash::vk;

use super::TextureUploader;
use crate::render::assets::{AssetData, AssetId};
use crate::render::error::{RenderError, RenderResult};
use crate::render::vulkan::{CommandPool, Fence, GpuBuffer, GpuImage, MemoryAllocator, VulkanError};

/// Format of every sprite texture
pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

/// Uploads RGBA8 pixels into device-local, shader-readable images
pub struct StagingUploader {
    allocator: MemoryAllocator,
    staging: GpuBuffer,
    command_pool: CommandPool,
    fence: Fence,
    queue: vk::Queue,
}

impl StagingUploader {
    /// Create the host-visible staging buffer and a command pool on `queue_family`
    pub fn new(
        allocator: MemoryAllocator,
        queue: vk::Queue,
        queue_family: u32,
        staging_bytes: vk::DeviceSize,
    ) -> RenderResult<Self> {
        let device = allocator.device().clone();

        let staging = allocator.create_buffer(
            staging_bytes,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        let command_pool = CommandPool::new(device.clone(), queue_family)?;
        let fence = Fence::new(device, false)?;

        log::debug!("Created {staging_bytes} byte staging buffer");

        Ok(Self {
            allocator,
            staging,
            command_pool,
            fence,
            queue,
        })
    }

    fn record_and_submit(&self, image: &GpuImage) -> RenderResult<()> {
        let mut recorder = self.command_pool.begin_single_time()?;
        recorder.transition_image_layout(image, vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL)?;
        recorder.copy_buffer_to_image(self.staging.handle(), image)?;
        recorder.transition_image_layout(
            image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )?;
        let command_buffer = recorder.end()?;

        let result = self.submit_and_wait(command_buffer);
        self.command_pool.free_command_buffer(command_buffer);
        result
    }

    fn submit_and_wait(&self, command_buffer: vk::CommandBuffer) -> RenderResult<()> {
        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);

        unsafe {
            self.allocator
                .device()
                .queue_submit(self.queue, &[submit_info.build()], self.fence.handle())
                .map_err(VulkanError::Api)?;
        }

        self.fence.wait(u64::MAX)?;
        self.fence.reset()?;
        Ok(())
    }
}

impl TextureUploader for StagingUploader {
    type Texture = GpuImage;

    fn upload(&mut self, asset: AssetId, data: AssetData) -> RenderResult<GpuImage> {
        let size = data.expected_len();
        if size as vk::DeviceSize > self.staging.size() {
            return Err(RenderError::capacity("staging buffer", size, self.staging.size()));
        }

        self.staging.write(&data.pixels[..size])?;
        // Pixels are in the staging buffer; the decoded copy is no longer needed
        drop(data.pixels);

        let image = self.allocator.create_image(
            vk::Extent2D {
                width: data.width,
                height: data.height,
            },
            TEXTURE_FORMAT,
            vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
        )?;

        self.record_and_submit(&image)?;

        log::debug!("Uploaded asset {asset} ({size} bytes)");
        Ok(image)
    }
}
