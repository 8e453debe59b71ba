//! Device memory selection and allocation
//!
//! Memory types are chosen by a linear scan: the first type allowed by the
//! resource whose flags contain every required property wins. There is no
//! fallback; an unmet requirement is a startup error.

use ash::{vk, Device};

use super::buffer::GpuBuffer;
use super::image::GpuImage;
use super::{VulkanError, VulkanResult};

/// Index of the first memory type in `type_bits` providing all `required` flags
pub fn find_memory_type_index(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> VulkanResult<u32> {
    let count = memory_properties.memory_type_count.min(vk::MAX_MEMORY_TYPES as u32);

    (0..count)
        .find(|&i| {
            (type_bits & (1 << i)) != 0
                && (memory_properties.memory_types[i as usize].property_flags & required) == required
        })
        .ok_or(VulkanError::NoSuitableMemoryType { type_bits, required })
}

/// Allocates device memory for buffers and images on one physical device
#[derive(Clone)]
pub struct MemoryAllocator {
    device: Device,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
}

impl MemoryAllocator {
    /// Create an allocator for `device` using the memory layout queried at startup
    pub fn new(device: Device, memory_properties: vk::PhysicalDeviceMemoryProperties) -> Self {
        Self { device, memory_properties }
    }

    /// The logical device allocations are made on
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Allocate memory satisfying `requirements` with the `required` properties
    pub fn allocate(
        &self,
        requirements: vk::MemoryRequirements,
        required: vk::MemoryPropertyFlags,
    ) -> VulkanResult<vk::DeviceMemory> {
        let memory_type_index =
            find_memory_type_index(&self.memory_properties, requirements.memory_type_bits, required)?;

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        unsafe { self.device.allocate_memory(&alloc_info, None).map_err(VulkanError::Api) }
    }

    /// Create a bound buffer; host-visible buffers are persistently mapped
    pub fn create_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<GpuBuffer> {
        GpuBuffer::new(self, size, usage, properties)
    }

    /// Create a bound, device-local 2D image with a color view
    pub fn create_image(
        &self,
        extent: vk::Extent2D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
    ) -> VulkanResult<GpuImage> {
        GpuImage::new(self, extent, format, usage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn properties(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties::default();
        props.memory_type_count = types.len() as u32;
        for (slot, flags) in props.memory_types.iter_mut().zip(types) {
            slot.property_flags = *flags;
        }
        props
    }

    const HOST: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::from_raw(
        vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw() | vk::MemoryPropertyFlags::HOST_COHERENT.as_raw(),
    );

    #[test]
    fn test_first_matching_type_wins() {
        let props = properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            HOST,
            HOST | vk::MemoryPropertyFlags::HOST_CACHED,
        ]);

        assert_eq!(find_memory_type_index(&props, 0b111, HOST).unwrap(), 1);
        assert_eq!(
            find_memory_type_index(&props, 0b111, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap(),
            0
        );
    }

    #[test]
    fn test_type_bits_filter_candidates() {
        let props = properties(&[HOST, HOST | vk::MemoryPropertyFlags::HOST_CACHED]);

        assert_eq!(find_memory_type_index(&props, 0b10, HOST).unwrap(), 1);
    }

    #[test]
    fn test_superset_flags_match() {
        let props = properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL | HOST]);

        assert_eq!(find_memory_type_index(&props, 0b1, HOST).unwrap(), 0);
    }

    #[test]
    fn test_unmet_requirement_is_an_error() {
        let props = properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);

        match find_memory_type_index(&props, 0b1, HOST) {
            Err(VulkanError::NoSuitableMemoryType { type_bits, required }) => {
                assert_eq!(type_bits, 0b1);
                assert_eq!(required, HOST);
            }
            other => panic!("expected NoSuitableMemoryType, got {other:?}"),
        }
    }

    #[test]
    fn test_types_beyond_count_are_ignored() {
        let mut props = properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        props.memory_types[1].property_flags = HOST;

        assert!(find_memory_type_index(&props, 0b11, HOST).is_err());
    }
}
