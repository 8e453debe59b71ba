//! Per-frame draw data: instance streams, batches and the frame context
//!
//! Everything in here is plain CPU data. The frame driver owns one
//! [`FrameContext`] and copies its streams into GPU buffers through
//! [`StreamTarget`] once per frame.

pub mod batcher;
pub mod material_stream;
pub mod text;
pub mod transform_stream;

pub use batcher::{BatchHandle, BatchList, RenderBatch};
pub use material_stream::{MaterialData, MaterialStream};
pub use text::{glyph_frame, layout, text_width, Glyph, Label, TextStyle};
pub use transform_stream::{InstanceTransform, TransformStream};

use crate::config::RenderLimits;
use crate::foundation::math::{Vec2, Vec4};
use crate::render::assets::{AssetId, SpriteSheet};
use crate::render::error::{RenderError, RenderResult};
use crate::render::vulkan::GpuBuffer;

/// A game object drawn as one sprite
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Entity {
    /// Index into the frame's material table
    pub material_index: u32,
    /// Top-left corner in screen pixels
    pub position: Vec2,
    /// Cell of the material's sprite sheet
    pub animation_frame: u32,
}

impl Entity {
    /// An entity showing the first cell of its material's sheet
    pub fn new(material_index: u32, position: Vec2) -> Self {
        Self {
            material_index,
            position,
            animation_frame: 0,
        }
    }

    /// Show another cell of the sprite sheet
    #[must_use]
    pub fn with_frame(mut self, animation_frame: u32) -> Self {
        self.animation_frame = animation_frame;
        self
    }
}

/// A sprite sheet paired with a tint
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    /// Texture sampled by entities using this material
    pub asset: AssetId,
    /// RGBA tint
    pub color: Vec4,
}

impl Material {
    /// Create a material
    pub fn new(asset: AssetId, color: Vec4) -> Self {
        Self { asset, color }
    }
}

/// Destination of a per-frame stream copy
pub trait StreamTarget {
    /// Replace the target's contents with `bytes`
    fn write_stream(&mut self, resource: &'static str, bytes: &[u8]) -> RenderResult<()>;
}

impl StreamTarget for GpuBuffer {
    fn write_stream(&mut self, resource: &'static str, bytes: &[u8]) -> RenderResult<()> {
        if bytes.len() as u64 > self.size() {
            return Err(RenderError::capacity(resource, bytes.len(), self.size()));
        }
        self.write(bytes)?;
        Ok(())
    }
}

impl StreamTarget for Vec<u8> {
    fn write_stream(&mut self, _resource: &'static str, bytes: &[u8]) -> RenderResult<()> {
        self.clear();
        self.extend_from_slice(bytes);
        Ok(())
    }
}

/// All mutable per-frame state of the frame driver.
///
/// `D` is whatever identifies a descriptor set; the renderer uses
/// `vk::DescriptorSet`, tests use plain integers.
#[derive(Debug)]
pub struct FrameContext<D> {
    transforms: TransformStream,
    materials: MaterialStream,
    batches: BatchList<D>,
}

impl<D: Copy + PartialEq> FrameContext<D> {
    /// Create empty streams sized by `limits`
    pub fn new(limits: &RenderLimits) -> Self {
        Self {
            transforms: TransformStream::new(limits.max_instances),
            materials: MaterialStream::new(limits.max_materials),
            batches: BatchList::new(),
        }
    }

    /// Mirror the game's material table for this frame
    pub fn mirror_materials(&mut self, materials: &[Material]) -> RenderResult<()> {
        self.materials.mirror(materials)
    }

    fn check_material(&self, index: u32) -> RenderResult<()> {
        if index as usize >= self.materials.len() {
            return Err(RenderError::MaterialOutOfRange {
                index,
                count: self.materials.len(),
            });
        }
        Ok(())
    }

    /// Record one entity drawn with `descriptor` and cut from `sheet`.
    ///
    /// Materials must be mirrored first. Returns the transform index.
    pub fn record_entity(&mut self, descriptor: D, sheet: &SpriteSheet, entity: &Entity) -> RenderResult<u32> {
        self.check_material(entity.material_index)?;

        let handle = self.batches.begin_batch(descriptor, &self.transforms);
        let transform =
            InstanceTransform::from_sheet(entity.material_index, sheet, entity.position, entity.animation_frame);
        self.batches.push_instance(handle, &mut self.transforms, transform)
    }

    /// Record every visible glyph of `label` against the font `descriptor`.
    ///
    /// Returns the number of glyph instances emitted.
    pub fn record_label(
        &mut self,
        descriptor: D,
        font: &SpriteSheet,
        label: &Label,
        style: &TextStyle,
    ) -> RenderResult<usize> {
        self.check_material(style.material_index)?;

        let glyphs = layout(label, style);
        if glyphs.is_empty() {
            return Ok(0);
        }

        let handle = self.batches.begin_batch(descriptor, &self.transforms);
        for glyph in &glyphs {
            let transform = InstanceTransform::from_sheet(style.material_index, font, glyph.position, glyph.frame);
            self.batches.push_instance(handle, &mut self.transforms, transform)?;
        }

        Ok(glyphs.len())
    }

    /// Copy both streams into their GPU buffers and empty them.
    ///
    /// Batch offsets stay valid: they were captured before the reset.
    pub fn flush(
        &mut self,
        transform_target: &mut dyn StreamTarget,
        material_target: &mut dyn StreamTarget,
    ) -> RenderResult<()> {
        self.transforms.flush(transform_target)?;
        self.materials.flush(material_target)
    }

    /// Batches recorded this frame, in draw order
    pub fn batches(&self) -> &[RenderBatch<D>] {
        self.batches.batches()
    }

    /// Instances recorded this frame
    pub fn instance_count(&self) -> u32 {
        self.batches.total_instances()
    }

    /// Transforms waiting to be flushed
    pub fn transforms(&self) -> &TransformStream {
        &self.transforms
    }

    /// Material mirror waiting to be flushed
    pub fn materials(&self) -> &MaterialStream {
        &self.materials
    }

    /// Forget this frame's batches
    pub fn reset(&mut self) {
        self.batches.reset();
    }

    /// Abandon a partially recorded frame: batches and both streams are emptied
    pub fn discard(&mut self) {
        self.batches.reset();
        self.transforms.clear();
        self.materials.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const BALL: SpriteSheet = SpriteSheet::single(50, 50);
    const FONT: SpriteSheet = SpriteSheet::grid(240, 240, 15, 30);

    const ENTITY_SET: u32 = 10;
    const FONT_SET: u32 = 20;

    fn frame() -> FrameContext<u32> {
        let mut frame = FrameContext::new(&RenderLimits::default());
        frame
            .mirror_materials(&[Material::new(AssetId(1), Vec4::new(1.0, 1.0, 1.0, 1.0))])
            .unwrap();
        frame
    }

    fn summary(frame: &FrameContext<u32>) -> Vec<(u32, u32, u32)> {
        frame
            .batches()
            .iter()
            .map(|batch| (batch.descriptor, batch.instance_count, batch.base_offset))
            .collect()
    }

    #[test]
    fn test_entity_then_label() {
        let mut frame = frame();

        frame.record_entity(ENTITY_SET, &BALL, &Entity::new(0, Vec2::zeros())).unwrap();
        let glyphs = frame
            .record_label(FONT_SET, &FONT, &Label::text("HI", Vec2::zeros()), &TextStyle::default())
            .unwrap();

        assert_eq!(glyphs, 2);
        assert_eq!(summary(&frame), vec![(ENTITY_SET, 1, 0), (FONT_SET, 2, 1)]);
    }

    #[test]
    fn test_labels_share_one_font_batch() {
        let mut frame = frame();
        let style = TextStyle::default();

        frame.record_label(FONT_SET, &FONT, &Label::text("A B", Vec2::zeros()), &style).unwrap();
        frame.record_label(FONT_SET, &FONT, &Label::number(42, Vec2::zeros()), &style).unwrap();

        assert_eq!(summary(&frame), vec![(FONT_SET, 4, 0)]);
    }

    #[test]
    fn test_instance_total_matches_entities_and_glyphs() {
        let mut frame = frame();
        let style = TextStyle::default();
        let labels = [
            Label::text("SCORE\n", Vec2::zeros()).with_number(10),
            Label::text("  ", Vec2::zeros()),
            Label::number(-3, Vec2::zeros()),
        ];

        for x in 0..3 {
            frame
                .record_entity(ENTITY_SET + x % 2, &BALL, &Entity::new(0, Vec2::new(x as f32, 0.0)))
                .unwrap();
        }
        for label in &labels {
            frame.record_label(FONT_SET, &FONT, label, &style).unwrap();
        }

        // 3 entities + "SCORE10" + "-3"
        assert_eq!(frame.instance_count(), 3 + 7 + 2);
        assert_eq!(frame.transforms().len(), frame.instance_count());
    }

    #[test]
    fn test_glyph_uses_font_cell() {
        let mut frame = frame();

        frame
            .record_label(FONT_SET, &FONT, &Label::text("!", Vec2::new(5.0, 6.0)), &TextStyle::default())
            .unwrap();

        let glyph = frame.transforms().get(0).unwrap();
        // '!' is 33: row 2, column 1
        assert_relative_eq!(glyph.left_u, 1.0 / 16.0);
        assert_relative_eq!(glyph.top_v, 2.0 / 8.0);
        assert_relative_eq!(glyph.size_x, 15.0);
        assert_relative_eq!(glyph.x, 5.0);
    }

    #[test]
    fn test_entity_animation_frame_selects_cell() {
        let mut frame = frame();

        frame
            .record_entity(FONT_SET, &FONT, &Entity::new(0, Vec2::zeros()).with_frame(17))
            .unwrap();

        let transform = frame.transforms().get(0).unwrap();
        assert_relative_eq!(transform.left_u, 1.0 / 16.0);
        assert_relative_eq!(transform.top_v, 1.0 / 8.0);
        assert_relative_eq!(transform.size_y, 30.0);
    }

    #[test]
    fn test_unknown_material_is_rejected() {
        let mut frame = frame();

        assert!(matches!(
            frame.record_entity(ENTITY_SET, &BALL, &Entity::new(3, Vec2::zeros())),
            Err(RenderError::MaterialOutOfRange { index: 3, count: 1 })
        ));
        assert!(frame.batches().is_empty());
    }

    #[test]
    fn test_flush_then_reset_starts_next_frame_at_zero() {
        let mut frame = frame();
        let mut transforms = Vec::new();
        let mut materials = Vec::new();

        frame.record_entity(ENTITY_SET, &BALL, &Entity::new(0, Vec2::zeros())).unwrap();
        frame.record_entity(ENTITY_SET, &BALL, &Entity::new(0, Vec2::zeros())).unwrap();
        frame.flush(&mut transforms, &mut materials).unwrap();

        assert_eq!(transforms.len(), 2 * std::mem::size_of::<InstanceTransform>());
        assert_eq!(materials.len(), std::mem::size_of::<MaterialData>());
        assert_eq!(summary(&frame), vec![(ENTITY_SET, 2, 0)]);

        frame.reset();
        frame
            .mirror_materials(&[Material::new(AssetId(1), Vec4::zeros())])
            .unwrap();
        let index = frame.record_entity(ENTITY_SET, &BALL, &Entity::new(0, Vec2::zeros())).unwrap();

        assert_eq!(index, 0);
        assert_eq!(summary(&frame), vec![(ENTITY_SET, 1, 0)]);
    }

    #[test]
    fn test_discard_drops_partial_frame() {
        let mut frame = frame();
        frame.record_entity(ENTITY_SET, &BALL, &Entity::new(0, Vec2::zeros())).unwrap();

        frame.discard();

        assert!(frame.batches().is_empty());
        assert!(frame.transforms().is_empty());
        assert!(matches!(
            frame.record_entity(ENTITY_SET, &BALL, &Entity::new(0, Vec2::zeros())),
            Err(RenderError::MaterialOutOfRange { index: 0, count: 0 })
        ));
    }

    #[test]
    fn test_instance_budget() {
        let limits = RenderLimits {
            max_instances: 2,
            ..RenderLimits::default()
        };
        let mut frame = FrameContext::new(&limits);
        frame
            .mirror_materials(&[Material::new(AssetId(1), Vec4::zeros())])
            .unwrap();

        frame.record_entity(ENTITY_SET, &BALL, &Entity::new(0, Vec2::zeros())).unwrap();
        assert!(matches!(
            frame.record_label(FONT_SET, &FONT, &Label::text("AB", Vec2::zeros()), &TextStyle::default()),
            Err(RenderError::CapacityExceeded { resource: "transform stream", .. })
        ));
    }
}
