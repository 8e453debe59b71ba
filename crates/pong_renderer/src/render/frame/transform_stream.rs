//! Per-instance transform stream
//!
//! One [`InstanceTransform`] per sprite drawn this frame. The stream is copied to
//! its storage buffer once per frame and only then emptied, so indices restart at
//! zero every frame.

use bytemuck::{Pod, Zeroable};

use super::StreamTarget;
use crate::foundation::math::Vec2;
use crate::render::assets::{SpriteSheet, UvRect};
use crate::render::error::{RenderError, RenderResult};

/// GPU layout of one sprite instance (std430, 36 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct InstanceTransform {
    /// Left edge in screen pixels
    pub x: f32,
    /// Top edge in screen pixels
    pub y: f32,
    /// Width in pixels
    pub size_x: f32,
    /// Height in pixels
    pub size_y: f32,
    /// V coordinate of the top edge
    pub top_v: f32,
    /// V coordinate of the bottom edge
    pub bottom_v: f32,
    /// U coordinate of the left edge
    pub left_u: f32,
    /// U coordinate of the right edge
    pub right_u: f32,
    /// Index into the material stream
    pub material_index: u32,
}

impl InstanceTransform {
    /// Place a sprite of `size` at `position`, textured with `uv`
    pub fn new(material_index: u32, position: Vec2, size: (f32, f32), uv: UvRect) -> Self {
        Self {
            x: position.x,
            y: position.y,
            size_x: size.0,
            size_y: size.1,
            top_v: uv.top,
            bottom_v: uv.bottom,
            left_u: uv.left,
            right_u: uv.right,
            material_index,
        }
    }

    /// One animation cell of `sheet`, drawn at the cell's pixel size
    pub fn from_sheet(material_index: u32, sheet: &SpriteSheet, position: Vec2, animation_frame: u32) -> Self {
        Self::new(material_index, position, sheet.cell_size(), sheet.uv_rect(animation_frame))
    }
}

/// Frame-scoped, fixed-capacity array of instance transforms
#[derive(Debug)]
pub struct TransformStream {
    transforms: Vec<InstanceTransform>,
    capacity: usize,
}

impl TransformStream {
    /// Create a stream holding at most `capacity` instances per frame
    pub fn new(capacity: usize) -> Self {
        Self {
            transforms: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a transform and return its index
    pub fn push(&mut self, transform: InstanceTransform) -> RenderResult<u32> {
        if self.transforms.len() >= self.capacity {
            return Err(RenderError::capacity(
                "transform stream",
                self.transforms.len() + 1,
                self.capacity,
            ));
        }

        let index = self.len();
        self.transforms.push(transform);
        Ok(index)
    }

    /// Append the transform for `animation_frame` of `sheet` at `position`
    pub fn push_transform(
        &mut self,
        material_index: u32,
        sheet: &SpriteSheet,
        position: Vec2,
        animation_frame: u32,
    ) -> RenderResult<u32> {
        self.push(InstanceTransform::from_sheet(material_index, sheet, position, animation_frame))
    }

    /// Number of transforms pushed since the last flush
    pub fn len(&self) -> u32 {
        // Bounded by `capacity`, which the GPU buffer size already constrains
        u32::try_from(self.transforms.len()).unwrap_or(u32::MAX)
    }

    /// Whether nothing was pushed since the last flush
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Size in bytes of a GPU buffer able to hold a full stream
    pub fn byte_capacity(&self) -> u64 {
        (self.capacity * std::mem::size_of::<InstanceTransform>()) as u64
    }

    /// Transform at `index`
    pub fn get(&self, index: u32) -> Option<&InstanceTransform> {
        self.transforms.get(index as usize)
    }

    /// Raw bytes in GPU layout
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.transforms)
    }

    /// Drop everything pushed since the last flush without copying it
    pub fn clear(&mut self) {
        self.transforms.clear();
    }

    /// Copy the stream into `target`, then empty it.
    ///
    /// The stream is left untouched if the copy fails.
    pub fn flush(&mut self, target: &mut dyn StreamTarget) -> RenderResult<()> {
        target.write_stream("transform buffer", self.as_bytes())?;
        self.transforms.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const PADDLE: SpriteSheet = SpriteSheet::single(50, 100);

    #[test]
    fn test_gpu_layout_size() {
        assert_eq!(std::mem::size_of::<InstanceTransform>(), 36);
    }

    #[test]
    fn test_indices_are_sequential() {
        let mut stream = TransformStream::new(8);

        for expected in 0..3 {
            let index = stream.push_transform(0, &PADDLE, Vec2::new(1.0, 2.0), 0).unwrap();
            assert_eq!(index, expected);
        }
        assert_eq!(stream.len(), 3);
    }

    #[test]
    fn test_sprite_size_comes_from_cell() {
        let mut stream = TransformStream::new(1);
        let atlas = SpriteSheet::grid(240, 240, 15, 30);

        let index = stream.push_transform(4, &atlas, Vec2::new(10.0, 20.0), 17).unwrap();
        let transform = stream.get(index).unwrap();

        assert_relative_eq!(transform.size_x, 15.0);
        assert_relative_eq!(transform.size_y, 30.0);
        assert_relative_eq!(transform.left_u, 1.0 / 16.0);
        assert_relative_eq!(transform.top_v, 1.0 / 8.0);
        assert_eq!(transform.material_index, 4);
    }

    #[test]
    fn test_flush_restarts_indices() {
        let mut stream = TransformStream::new(4);
        let mut target: Vec<u8> = Vec::new();

        stream.push_transform(0, &PADDLE, Vec2::zeros(), 0).unwrap();
        stream.push_transform(0, &PADDLE, Vec2::zeros(), 0).unwrap();
        stream.flush(&mut target).unwrap();

        assert!(stream.is_empty());
        assert_eq!(target.len(), 2 * 36);

        for expected in 0..4 {
            assert_eq!(stream.push_transform(0, &PADDLE, Vec2::zeros(), 0).unwrap(), expected);
        }
    }

    #[test]
    fn test_capacity_is_enforced() {
        let mut stream = TransformStream::new(1);
        stream.push_transform(0, &PADDLE, Vec2::zeros(), 0).unwrap();

        match stream.push_transform(0, &PADDLE, Vec2::zeros(), 0) {
            Err(RenderError::CapacityExceeded { requested, capacity, .. }) => {
                assert_eq!(requested, 2);
                assert_eq!(capacity, 1);
            }
            other => panic!("expected capacity error, got {other:?}"),
        }
    }

    struct FailingTarget;

    impl StreamTarget for FailingTarget {
        fn write_stream(&mut self, resource: &'static str, bytes: &[u8]) -> RenderResult<()> {
            Err(RenderError::capacity(resource, bytes.len(), 0usize))
        }
    }

    #[test]
    fn test_failed_flush_keeps_data() {
        let mut stream = TransformStream::new(2);
        stream.push_transform(0, &PADDLE, Vec2::zeros(), 0).unwrap();

        assert!(stream.flush(&mut FailingTarget).is_err());
        assert_eq!(stream.len(), 1);
    }
}
