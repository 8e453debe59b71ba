//! Buffer management for staging, storage, uniform and index data
//!
//! Host-visible buffers stay mapped for their whole lifetime; writes are copied
//! straight into the mapping and never run past the buffer's capacity.

use ash::{vk, Device};
use std::ptr::NonNull;

use super::memory::MemoryAllocator;
use super::{VulkanError, VulkanResult};

/// Buffer wrapper with memory management
pub struct GpuBuffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
    mapped: Option<NonNull<u8>>,
}

impl GpuBuffer {
    /// Create a new buffer with memory allocation
    pub fn new(
        allocator: &MemoryAllocator,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        let device = allocator.device().clone();

        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.create_buffer(&buffer_info, None).map_err(VulkanError::Api)? };

        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let memory = match allocator.allocate(requirements, properties) {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        // From here on Drop owns both handles.
        let mut gpu_buffer = Self {
            device,
            buffer,
            memory,
            size,
            mapped: None,
        };

        unsafe {
            gpu_buffer
                .device
                .bind_buffer_memory(buffer, memory, 0)
                .map_err(VulkanError::Api)?;
        }

        if properties.contains(vk::MemoryPropertyFlags::HOST_VISIBLE) {
            let ptr = unsafe {
                gpu_buffer
                    .device
                    .map_memory(memory, 0, size, vk::MemoryMapFlags::empty())
                    .map_err(VulkanError::Api)?
            };
            gpu_buffer.mapped = NonNull::new(ptr.cast::<u8>());
        }

        Ok(gpu_buffer)
    }

    /// Copy `bytes` to the start of the buffer
    pub fn write(&mut self, bytes: &[u8]) -> VulkanResult<()> {
        self.write_at(0, bytes)
    }

    /// Copy `bytes` into the buffer at `offset`
    pub fn write_at(&mut self, offset: vk::DeviceSize, bytes: &[u8]) -> VulkanResult<()> {
        let end = offset + bytes.len() as vk::DeviceSize;
        if end > self.size {
            return Err(VulkanError::BufferOverflow {
                requested: end,
                capacity: self.size,
            });
        }

        let mapped = self.mapped.ok_or_else(|| VulkanError::InvalidOperation {
            reason: "Buffer memory is not host visible".to_string(),
        })?;

        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), mapped.as_ptr().add(offset as usize), bytes.len());
        }
        Ok(())
    }

    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Capacity in bytes
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        unsafe {
            if self.mapped.take().is_some() {
                self.device.unmap_memory(self.memory);
            }
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}
