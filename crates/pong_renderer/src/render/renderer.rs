//! Sprite renderer: the per-frame driver
//!
//! Owns every GPU object of the session and runs one frame at a time through
//! [`FramePhase`]s. There is a single frame in flight: the CPU does not touch
//! the instance buffers again until the previous frame's fence has signaled.

use ash::{vk, Device};
use bytemuck::{Pod, Zeroable};

use crate::config::{RendererConfig, ShaderConfig};
use crate::render::assets::{AssetSource, SpriteSheets};
use crate::render::error::{RenderError, RenderResult};
use crate::render::frame::{Entity, FrameContext, Label, Material, RenderBatch, TextStyle};
use crate::render::resources::{ResourceCaches, SharedBuffers, StagingUploader, VulkanDescriptorBinder};
use crate::render::vulkan::{
    CommandPool, CommandRecorder, DescriptorSetLayout, FrameSync, Framebuffer, GpuBuffer, MemoryAllocator,
    RenderPass, ShaderModule, SpritePipeline, Swapchain, VulkanContext, VulkanError, Window,
};

/// Two triangles covering one quad; corners are numbered clockwise from the top left
pub const QUAD_INDICES: [u16; 6] = [0, 1, 2, 2, 3, 0];

/// Uniform data shared by every draw
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct GlobalData {
    /// Swapchain width in pixels
    pub screen_size_x: i32,
    /// Swapchain height in pixels
    pub screen_size_y: i32,
}

/// Per-draw push constant
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct PushData {
    /// First transform of the batch being drawn
    pub transform_index: u32,
}

/// Steps of one frame, always taken in this order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    /// Block on the previous frame's fence
    WaitGpu,
    /// Resolve descriptors and fill the instance streams
    RecordInstances,
    /// Copy the streams into their GPU buffers
    FlushStreams,
    /// Acquire the next swapchain image
    AcquireImage,
    /// Record the render pass with one draw per batch
    RecordCommands,
    /// Submit the command buffer
    Submit,
    /// Present the image
    Present,
    /// Clear per-frame batching state
    Reset,
}

impl FramePhase {
    /// The phase that follows this one; `Reset` wraps to `WaitGpu`
    pub fn next(self) -> Self {
        match self {
            Self::WaitGpu => Self::RecordInstances,
            Self::RecordInstances => Self::FlushStreams,
            Self::FlushStreams => Self::AcquireImage,
            Self::AcquireImage => Self::RecordCommands,
            Self::RecordCommands => Self::Submit,
            Self::Submit => Self::Present,
            Self::Present => Self::Reset,
            Self::Reset => Self::WaitGpu,
        }
    }

    /// Whether a failure in this phase leaves the device as the last frame left it.
    ///
    /// Up to `AcquireImage` nothing has been signaled or submitted, so the next
    /// frame can start over. From `RecordCommands` on, a semaphore or the
    /// frame fence is in use and the renderer cannot draw again.
    pub fn can_retry(self) -> bool {
        matches!(
            self,
            Self::WaitGpu | Self::RecordInstances | Self::FlushStreams | Self::AcquireImage
        )
    }
}

/// Tracks the phase of the current frame and whether a failure poisoned the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTracker {
    phase: FramePhase,
    poisoned_at: Option<FramePhase>,
}

impl Default for FrameTracker {
    fn default() -> Self {
        Self {
            phase: FramePhase::Reset,
            poisoned_at: None,
        }
    }
}

impl FrameTracker {
    /// Tracker positioned between frames
    pub fn new() -> Self {
        Self::default()
    }

    /// Phase the last frame reached
    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    /// Fail with [`RenderError::Poisoned`] if an earlier frame failed beyond recovery
    pub fn check_usable(&self) -> RenderResult<()> {
        match self.poisoned_at {
            Some(phase) => Err(RenderError::Poisoned { phase }),
            None => Ok(()),
        }
    }

    /// Move to `phase`, which must follow the current one
    pub fn enter(&mut self, phase: FramePhase) {
        debug_assert_eq!(self.phase.next(), phase, "frame phases out of order");
        log::trace!("{:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    /// Record a failure in the current phase and return to `Reset`.
    ///
    /// Returns the phase that failed.
    pub fn fail(&mut self) -> FramePhase {
        let failed = self.phase;
        if !failed.can_retry() {
            self.poisoned_at = Some(failed);
        }
        self.phase = FramePhase::Reset;
        failed
    }
}

/// Shader compilation collaborator: yields SPIR-V for a configured path
pub trait ShaderSource {
    /// Check that `shaders` can be loaded before any GPU object is created
    fn check(&self, _shaders: &ShaderConfig) -> RenderResult<()> {
        Ok(())
    }

    /// Load the compiled bytecode at `path`
    fn load_spirv(&self, path: &str) -> RenderResult<Vec<u8>>;
}

/// Reads precompiled SPIR-V files from disk
#[derive(Debug, Clone, Copy, Default)]
pub struct SpirvFileSource;

impl ShaderSource for SpirvFileSource {
    fn check(&self, shaders: &ShaderConfig) -> RenderResult<()> {
        shaders.validate()?;
        Ok(())
    }

    fn load_spirv(&self, path: &str) -> RenderResult<Vec<u8>> {
        std::fs::read(path).map_err(|e| RenderError::Shader(format!("Failed to read {path}: {e}")))
    }
}

/// Instanced sprite renderer over Vulkan.
///
/// Create it once with [`SpriteRenderer::new`] and call [`SpriteRenderer::render`]
/// every frame with the game's entities, materials and labels.
pub struct SpriteRenderer {
    // Plain per-frame state
    frame: FrameContext<vk::DescriptorSet>,
    sheets: SpriteSheets,
    assets: Box<dyn AssetSource>,
    text_style: TextStyle,
    clear_color: [f32; 4],
    frame_timeout_ns: u64,
    tracker: FrameTracker,

    // Cached images and descriptor sets, plus the staging uploader and descriptor pool
    resources: ResourceCaches<StagingUploader, VulkanDescriptorBinder>,

    framebuffers: Vec<Framebuffer>,
    pipeline: SpritePipeline,
    // Layout of every set in the descriptor cache
    #[allow(dead_code)]
    set_layout: DescriptorSetLayout,
    render_pass: RenderPass,

    sync: FrameSync,
    command_buffer: vk::CommandBuffer,
    command_pool: CommandPool,

    index_buffer: GpuBuffer,
    material_buffer: GpuBuffer,
    transform_buffer: GpuBuffer,
    global_buffer: GpuBuffer,

    swapchain: Swapchain,
    device: Device,

    // VulkanContext LAST - owns the device every resource above is destroyed with
    context: VulkanContext,
}

impl SpriteRenderer {
    /// Create the device, swapchain, pipeline and fixed-size buffers.
    ///
    /// Images and descriptor sets are not created here; they are built the first
    /// time an asset is drawn.
    pub fn new(
        window: &Window,
        config: &RendererConfig,
        assets: Box<dyn AssetSource>,
        shaders: &dyn ShaderSource,
    ) -> RenderResult<Self> {
        config.validate()?;
        shaders.check(&config.shaders)?;

        log::debug!("Creating VulkanContext...");
        let context = VulkanContext::new(window, &config.application_name, config.validation_enabled())?;
        let device = context.raw_device();

        let (width, height) = window.framebuffer_size();
        let swapchain = Swapchain::new(
            device.clone(),
            context.swapchain_loader().clone(),
            context.surface(),
            context.surface_loader(),
            context.physical_device(),
            vk::Extent2D { width, height },
        )?;

        let allocator = MemoryAllocator::new(device.clone(), context.physical_device().memory_properties);
        let host_visible = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        let limits = &config.limits;
        let frame = FrameContext::new(limits);

        let global_buffer = allocator.create_buffer(
            std::mem::size_of::<GlobalData>() as vk::DeviceSize,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            host_visible,
        )?;
        let transform_buffer = allocator.create_buffer(
            frame.transforms().byte_capacity(),
            vk::BufferUsageFlags::STORAGE_BUFFER,
            host_visible,
        )?;
        let material_buffer = allocator.create_buffer(
            frame.materials().byte_capacity(),
            vk::BufferUsageFlags::STORAGE_BUFFER,
            host_visible,
        )?;
        let mut index_buffer = allocator.create_buffer(
            std::mem::size_of_val(&QUAD_INDICES) as vk::DeviceSize,
            vk::BufferUsageFlags::INDEX_BUFFER,
            host_visible,
        )?;
        index_buffer.write(bytemuck::cast_slice(&QUAD_INDICES))?;
        log::debug!(
            "Created instance buffers: {} transforms, {} materials",
            limits.max_instances,
            limits.max_materials
        );

        let command_pool = CommandPool::new(device.clone(), context.graphics_queue_family())?;
        let command_buffer = command_pool.allocate_command_buffer()?;
        let sync = FrameSync::new(device.clone())?;

        log::debug!("Creating RenderPass...");
        let render_pass = RenderPass::new_sprite_pass(device.clone(), swapchain.format())?;

        log::debug!("Loading sprite shaders...");
        let vertex_code = shaders.load_spirv(&config.shaders.vertex_shader_path)?;
        let fragment_code = shaders.load_spirv(&config.shaders.fragment_shader_path)?;
        let vertex_shader = ShaderModule::from_bytes(device.clone(), &vertex_code)?;
        let fragment_shader = ShaderModule::from_bytes(device.clone(), &fragment_code)?;

        let set_layout = DescriptorSetLayout::sprite(&device)?;
        let pipeline = SpritePipeline::new(
            device.clone(),
            render_pass.handle(),
            &vertex_shader,
            &fragment_shader,
            set_layout.handle(),
        )?;
        let framebuffers = Framebuffer::for_views(
            &device,
            render_pass.handle(),
            swapchain.image_views(),
            swapchain.extent(),
        )?;

        let uploader = StagingUploader::new(
            allocator,
            context.graphics_queue(),
            context.graphics_queue_family(),
            limits.staging_bytes,
        )?;
        let binder = VulkanDescriptorBinder::new(
            device.clone(),
            set_layout.handle(),
            SharedBuffers {
                global: global_buffer.handle(),
                transforms: transform_buffer.handle(),
                materials: material_buffer.handle(),
            },
            u32::try_from(limits.max_descriptors).unwrap_or(u32::MAX),
        )?;
        let resources = ResourceCaches::new(uploader, binder, limits);

        log::info!("SpriteRenderer initialization complete");

        Ok(Self {
            frame,
            sheets: SpriteSheets::new(),
            assets,
            text_style: config.text,
            clear_color: config.clear_color,
            frame_timeout_ns: config.fence_timeout(),
            tracker: FrameTracker::new(),
            resources,
            framebuffers,
            pipeline,
            set_layout,
            render_pass,
            sync,
            command_buffer,
            command_pool,
            index_buffer,
            material_buffer,
            transform_buffer,
            global_buffer,
            swapchain,
            device,
            context,
        })
    }

    /// Draw one frame; on failure the error is logged and `false` returned.
    ///
    /// Every failure is fatal: the caller should stop its loop.
    pub fn render(&mut self, entities: &[Entity], materials: &[Material], labels: &[Label]) -> bool {
        self.try_render(entities, materials, labels).is_ok()
    }

    /// Draw one frame, reporting the error of the phase that failed.
    ///
    /// After a failure from `RecordCommands` on, every later call returns
    /// [`RenderError::Poisoned`] without touching the device.
    pub fn try_render(&mut self, entities: &[Entity], materials: &[Material], labels: &[Label]) -> RenderResult<()> {
        if let Err(e) = self.tracker.check_usable() {
            log::error!("{e}");
            return Err(e);
        }

        let result = self.draw_frame(entities, materials, labels);

        if let Err(e) = &result {
            let failed = self.tracker.fail();
            log::error!("Frame failed during {failed:?}: {e}");
            self.frame.discard();
        }
        result
    }

    fn enter(&mut self, phase: FramePhase) {
        self.tracker.enter(phase);
    }

    fn draw_frame(&mut self, entities: &[Entity], materials: &[Material], labels: &[Label]) -> RenderResult<()> {
        self.enter(FramePhase::WaitGpu);
        // The fence is reset in `Submit`, so a frame abandoned before then
        // leaves it signaled for the next wait.
        self.sync.in_flight.wait(self.frame_timeout_ns)?;

        self.enter(FramePhase::RecordInstances);
        self.record_instances(entities, materials, labels)?;

        self.enter(FramePhase::FlushStreams);
        self.write_globals()?;
        self.frame.flush(&mut self.transform_buffer, &mut self.material_buffer)?;

        self.enter(FramePhase::AcquireImage);
        let image_index = self.swapchain.acquire_next_image(self.sync.image_available.handle())?;

        self.enter(FramePhase::RecordCommands);
        self.record_commands(image_index)?;

        self.enter(FramePhase::Submit);
        self.submit()?;

        self.enter(FramePhase::Present);
        self.swapchain.present(
            self.context.present_queue(),
            image_index,
            self.sync.render_finished.handle(),
        )?;

        self.enter(FramePhase::Reset);
        self.frame.reset();
        Ok(())
    }

    fn record_instances(&mut self, entities: &[Entity], materials: &[Material], labels: &[Label]) -> RenderResult<()> {
        self.frame.mirror_materials(materials)?;

        for entity in entities {
            let material = materials
                .get(entity.material_index as usize)
                .ok_or(RenderError::MaterialOutOfRange {
                    index: entity.material_index,
                    count: materials.len(),
                })?;

            let descriptor = self.resources.descriptor_set(material.asset, self.assets.as_ref())?;
            let sheet = self.sheets.get(material.asset, self.assets.as_ref());
            self.frame.record_entity(descriptor, &sheet, entity)?;
        }

        if !labels.is_empty() {
            let style = self.text_style;
            let font = self.resources.descriptor_set(style.font, self.assets.as_ref())?;
            let sheet = self.sheets.get(style.font, self.assets.as_ref());

            for label in labels {
                self.frame.record_label(font, &sheet, label, &style)?;
            }
        }

        log::trace!(
            "Recorded {} instances in {} batches",
            self.frame.instance_count(),
            self.frame.batches().len()
        );
        Ok(())
    }

    fn write_globals(&mut self) -> RenderResult<()> {
        let extent = self.swapchain.extent();
        let globals = GlobalData {
            screen_size_x: i32::try_from(extent.width).unwrap_or(i32::MAX),
            screen_size_y: i32::try_from(extent.height).unwrap_or(i32::MAX),
        };
        self.global_buffer.write(bytemuck::bytes_of(&globals))?;
        Ok(())
    }

    fn record_commands(&self, image_index: u32) -> RenderResult<()> {
        let framebuffer = self
            .framebuffers
            .get(image_index as usize)
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!("No framebuffer for swapchain image {image_index}"),
            })?;

        let extent = self.swapchain.extent();
        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: self.clear_color,
            },
        }];
        let viewport = vk::Viewport::builder()
            .x(0.0)
            .y(0.0)
            .width(extent.width as f32)
            .height(extent.height as f32)
            .min_depth(0.0)
            .max_depth(1.0)
            .build();

        let mut recorder = CommandRecorder::new(self.command_buffer, self.device.clone());
        recorder.begin()?;

        {
            let mut pass = recorder.begin_render_pass(
                self.render_pass.handle(),
                framebuffer.handle(),
                render_area,
                &clear_values,
            )?;

            pass.bind_pipeline(self.pipeline.handle());
            pass.set_viewport(&viewport);
            pass.set_scissor(&render_area);
            pass.bind_index_buffer(self.index_buffer.handle(), vk::IndexType::UINT16);

            for batch in self.frame.batches().iter().filter(|batch| batch.instance_count > 0) {
                let push = PushData {
                    transform_index: batch.base_offset,
                };

                pass.bind_descriptor_set(self.pipeline.layout(), batch.descriptor);
                pass.push_constants(self.pipeline.layout(), vk::ShaderStageFlags::VERTEX, bytemuck::bytes_of(&push));
                pass.draw_indexed(QUAD_INDICES.len() as u32, batch.instance_count);
            }
        } // render pass ends here

        recorder.end()?;
        Ok(())
    }

    fn submit(&self) -> RenderResult<()> {
        self.sync.in_flight.reset()?;

        let wait_semaphores = [self.sync.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [self.command_buffer];
        let signal_semaphores = [self.sync.render_finished.handle()];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device
                .queue_submit(
                    self.context.graphics_queue(),
                    &[submit_info.build()],
                    self.sync.in_flight.handle(),
                )
                .map_err(VulkanError::Api)?;
        }
        Ok(())
    }

    /// Phase the last frame reached
    pub fn phase(&self) -> FramePhase {
        self.tracker.phase()
    }

    /// Batches drawn by the last frame
    pub fn batches(&self) -> &[RenderBatch<vk::DescriptorSet>] {
        self.frame.batches()
    }

    /// Swapchain size in pixels
    pub fn extent(&self) -> (u32, u32) {
        let extent = self.swapchain.extent();
        (extent.width, extent.height)
    }

    /// Number of textures uploaded so far
    pub fn image_count(&self) -> usize {
        self.resources.image_count()
    }

    /// Number of descriptor sets created so far
    pub fn descriptor_count(&self) -> usize {
        self.resources.descriptor_count()
    }

    /// Style used for every label
    pub fn text_style(&self) -> &TextStyle {
        &self.text_style
    }

    /// Wait for device to be idle
    pub fn wait_idle(&self) -> RenderResult<()> {
        self.context.wait_idle()?;
        Ok(())
    }
}

impl Drop for SpriteRenderer {
    fn drop(&mut self) {
        log::debug!("Cleaning up SpriteRenderer...");

        if let Err(e) = self.context.wait_idle() {
            log::warn!("Device did not go idle before cleanup: {e}");
        }
        self.command_pool.free_command_buffer(self.command_buffer);

        // Remaining resources are destroyed by their own Drop impls in field
        // order, ending with the context and its device.
        log::debug!("SpriteRenderer cleanup complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::vulkan::shader::PUSH_CONSTANT_SIZE;
    use std::io::Write;

    #[test]
    fn test_phases_cycle_in_order() {
        let mut phase = FramePhase::Reset;
        let mut seen = Vec::new();

        for _ in 0..8 {
            phase = phase.next();
            seen.push(phase);
        }

        assert_eq!(
            seen,
            vec![
                FramePhase::WaitGpu,
                FramePhase::RecordInstances,
                FramePhase::FlushStreams,
                FramePhase::AcquireImage,
                FramePhase::RecordCommands,
                FramePhase::Submit,
                FramePhase::Present,
                FramePhase::Reset,
            ]
        );
    }

    #[test]
    fn test_failure_before_commands_keeps_renderer_usable() {
        let mut tracker = FrameTracker::new();
        tracker.enter(FramePhase::WaitGpu);
        tracker.enter(FramePhase::RecordInstances);

        assert_eq!(tracker.fail(), FramePhase::RecordInstances);
        assert_eq!(tracker.phase(), FramePhase::Reset);
        assert!(tracker.check_usable().is_ok());

        // The next frame starts from the top
        tracker.enter(FramePhase::WaitGpu);
        assert_eq!(tracker.phase(), FramePhase::WaitGpu);
    }

    #[test]
    fn test_failure_after_acquire_poisons_renderer() {
        let mut tracker = FrameTracker::new();
        let mut phase = FramePhase::Reset;
        while phase != FramePhase::Submit {
            phase = phase.next();
            tracker.enter(phase);
        }

        assert_eq!(tracker.fail(), FramePhase::Submit);
        assert!(matches!(
            tracker.check_usable(),
            Err(RenderError::Poisoned {
                phase: FramePhase::Submit
            })
        ));
    }

    #[test]
    fn test_retryable_phases_end_at_acquire() {
        let retryable: Vec<FramePhase> = [
            FramePhase::WaitGpu,
            FramePhase::RecordInstances,
            FramePhase::FlushStreams,
            FramePhase::AcquireImage,
            FramePhase::RecordCommands,
            FramePhase::Submit,
            FramePhase::Present,
            FramePhase::Reset,
        ]
        .into_iter()
        .filter(|phase| phase.can_retry())
        .collect();

        assert_eq!(retryable.last(), Some(&FramePhase::AcquireImage));
        assert_eq!(retryable.len(), 4);
    }

    #[test]
    fn test_push_data_matches_pipeline_range() {
        assert_eq!(std::mem::size_of::<PushData>() as u32, PUSH_CONSTANT_SIZE);
        assert_eq!(std::mem::size_of::<GlobalData>(), 8);
    }

    #[test]
    fn test_quad_is_two_triangles_over_four_corners() {
        let mut corners: Vec<u16> = QUAD_INDICES.to_vec();
        corners.sort_unstable();
        corners.dedup();

        assert_eq!(QUAD_INDICES.len(), 6);
        assert_eq!(corners, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_spirv_file_source_reads_bytes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0x03, 0x02, 0x23, 0x07]).unwrap();

        let path = file.path().to_str().unwrap().to_string();
        assert_eq!(SpirvFileSource.load_spirv(&path).unwrap(), vec![0x03, 0x02, 0x23, 0x07]);
    }

    #[test]
    fn test_spirv_file_source_checks_both_stages() {
        let vertex = tempfile::NamedTempFile::new().unwrap();
        let fragment = tempfile::NamedTempFile::new().unwrap();
        let present = ShaderConfig::new(vertex.path().to_str().unwrap(), fragment.path().to_str().unwrap());
        let missing = ShaderConfig::new(vertex.path().to_str().unwrap(), "no/such/sprite.frag.spv");

        assert!(SpirvFileSource.check(&present).is_ok());
        assert!(matches!(SpirvFileSource.check(&missing), Err(RenderError::Config(_))));
    }

    #[test]
    fn test_spirv_file_source_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.spv");

        assert!(matches!(
            SpirvFileSource.load_spirv(path.to_str().unwrap()),
            Err(RenderError::Shader(_))
        ));
    }
}
