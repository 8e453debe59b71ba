//! Descriptor set layouts, pools and writes

use ash::{vk, Device};

use super::{VulkanError, VulkanResult};

/// Descriptor set layout builder for creating reusable layouts
#[derive(Default)]
pub struct DescriptorSetLayoutBuilder {
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayoutBuilder {
    /// Create a new descriptor set layout builder
    pub fn new() -> Self {
        Self::default()
    }

    fn add(mut self, binding: u32, descriptor_type: vk::DescriptorType, stage_flags: vk::ShaderStageFlags) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(descriptor_type)
                .descriptor_count(1)
                .stage_flags(stage_flags)
                .build(),
        );
        self
    }

    /// Add a uniform buffer binding
    #[must_use]
    pub fn add_uniform_buffer(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.add(binding, vk::DescriptorType::UNIFORM_BUFFER, stage_flags)
    }

    /// Add a storage buffer binding
    #[must_use]
    pub fn add_storage_buffer(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.add(binding, vk::DescriptorType::STORAGE_BUFFER, stage_flags)
    }

    /// Add a combined image sampler binding
    #[must_use]
    pub fn add_combined_image_sampler(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.add(binding, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, stage_flags)
    }

    /// Build the descriptor set layout
    pub fn build(self, device: &Device) -> VulkanResult<DescriptorSetLayout> {
        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&self.bindings);

        let layout = unsafe { device.create_descriptor_set_layout(&layout_info, None) }.map_err(VulkanError::Api)?;

        Ok(DescriptorSetLayout {
            layout,
            device: device.clone(),
        })
    }
}

/// Descriptor set layout wrapper with automatic cleanup
pub struct DescriptorSetLayout {
    layout: vk::DescriptorSetLayout,
    device: Device,
}

impl DescriptorSetLayout {
    /// The sprite layout: global uniform, transform and material storage buffers, sprite texture
    pub fn sprite(device: &Device) -> VulkanResult<Self> {
        DescriptorSetLayoutBuilder::new()
            .add_uniform_buffer(0, vk::ShaderStageFlags::VERTEX)
            .add_storage_buffer(1, vk::ShaderStageFlags::VERTEX)
            .add_storage_buffer(2, vk::ShaderStageFlags::FRAGMENT)
            .add_combined_image_sampler(3, vk::ShaderStageFlags::FRAGMENT)
            .build(device)
    }

    /// Get the Vulkan descriptor set layout handle
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Descriptor pool sized for a fixed number of sprite sets
pub struct DescriptorPool {
    pool: vk::DescriptorPool,
    device: Device,
}

impl DescriptorPool {
    /// Create a pool holding `max_sets` sprite descriptor sets
    pub fn new(device: Device, max_sets: u32) -> VulkanResult<Self> {
        let pool_sizes = [
            vk::DescriptorPoolSize::builder()
                .ty(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(max_sets)
                .build(),
            vk::DescriptorPoolSize::builder()
                .ty(vk::DescriptorType::STORAGE_BUFFER)
                .descriptor_count(max_sets * 2)
                .build(),
            vk::DescriptorPoolSize::builder()
                .ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count(max_sets)
                .build(),
        ];

        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(max_sets)
            .pool_sizes(&pool_sizes);

        let pool = unsafe { device.create_descriptor_pool(&pool_info, None) }.map_err(VulkanError::Api)?;

        Ok(Self { pool, device })
    }

    /// Allocate one descriptor set with `layout`
    pub fn allocate(&self, layout: vk::DescriptorSetLayout) -> VulkanResult<vk::DescriptorSet> {
        let layouts = [layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);

        let sets = unsafe { self.device.allocate_descriptor_sets(&alloc_info) }.map_err(VulkanError::Api)?;

        sets.into_iter().next().ok_or_else(|| VulkanError::InvalidOperation {
            reason: "Driver returned no descriptor set".to_string(),
        })
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

enum PendingWrite {
    Buffer {
        binding: u32,
        descriptor_type: vk::DescriptorType,
        info: vk::DescriptorBufferInfo,
    },
    Image {
        binding: u32,
        info: vk::DescriptorImageInfo,
    },
}

/// Collects writes for one descriptor set and applies them together.
///
/// Buffer and image infos are kept by value until [`DescriptorSetWriter::update`],
/// which builds the `WriteDescriptorSet`s pointing into them.
pub struct DescriptorSetWriter {
    descriptor_set: vk::DescriptorSet,
    writes: Vec<PendingWrite>,
}

impl DescriptorSetWriter {
    /// Start collecting writes for `descriptor_set`
    pub fn new(descriptor_set: vk::DescriptorSet) -> Self {
        Self {
            descriptor_set,
            writes: Vec::new(),
        }
    }

    fn buffer(mut self, binding: u32, descriptor_type: vk::DescriptorType, buffer: vk::Buffer) -> Self {
        let info = vk::DescriptorBufferInfo {
            buffer,
            offset: 0,
            range: vk::WHOLE_SIZE,
        };
        self.writes.push(PendingWrite::Buffer {
            binding,
            descriptor_type,
            info,
        });
        self
    }

    /// Bind a whole uniform buffer
    #[must_use]
    pub fn uniform_buffer(self, binding: u32, buffer: vk::Buffer) -> Self {
        self.buffer(binding, vk::DescriptorType::UNIFORM_BUFFER, buffer)
    }

    /// Bind a whole storage buffer
    #[must_use]
    pub fn storage_buffer(self, binding: u32, buffer: vk::Buffer) -> Self {
        self.buffer(binding, vk::DescriptorType::STORAGE_BUFFER, buffer)
    }

    /// Bind a sampled image in shader-read-only layout
    #[must_use]
    pub fn combined_image_sampler(mut self, binding: u32, image_view: vk::ImageView, sampler: vk::Sampler) -> Self {
        let info = vk::DescriptorImageInfo {
            sampler,
            image_view,
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        };
        self.writes.push(PendingWrite::Image { binding, info });
        self
    }

    /// Execute all write operations
    pub fn update(self, device: &Device) {
        let writes: Vec<vk::WriteDescriptorSet> = self
            .writes
            .iter()
            .map(|write| {
                let builder = vk::WriteDescriptorSet::builder()
                    .dst_set(self.descriptor_set)
                    .dst_array_element(0);

                match write {
                    PendingWrite::Buffer {
                        binding,
                        descriptor_type,
                        info,
                    } => builder
                        .dst_binding(*binding)
                        .descriptor_type(*descriptor_type)
                        .buffer_info(std::slice::from_ref(info))
                        .build(),
                    PendingWrite::Image { binding, info } => builder
                        .dst_binding(*binding)
                        .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                        .image_info(std::slice::from_ref(info))
                        .build(),
                }
            })
            .collect();

        unsafe {
            device.update_descriptor_sets(&writes, &[]);
        }
    }
}
