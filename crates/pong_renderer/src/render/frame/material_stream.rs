//! GPU mirror of the game's material table

use bytemuck::{Pod, Zeroable};

use super::{Material, StreamTarget};
use crate::foundation::math::Vec4;
use crate::render::error::{RenderError, RenderResult};

/// GPU layout of one material (a `vec4` tint)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct MaterialData {
    /// RGBA tint multiplied with the sampled texel
    pub color: [f32; 4],
}

impl From<Vec4> for MaterialData {
    fn from(color: Vec4) -> Self {
        Self {
            color: [color.x, color.y, color.z, color.w],
        }
    }
}

/// Frame-scoped copy of the material colors, indexed like the game's table
#[derive(Debug)]
pub struct MaterialStream {
    materials: Vec<MaterialData>,
    capacity: usize,
}

impl MaterialStream {
    /// Create a stream holding at most `capacity` materials
    pub fn new(capacity: usize) -> Self {
        Self {
            materials: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Replace the contents with `materials`, verbatim and in order
    pub fn mirror(&mut self, materials: &[Material]) -> RenderResult<()> {
        if materials.len() > self.capacity {
            return Err(RenderError::capacity("material stream", materials.len(), self.capacity));
        }

        self.materials.clear();
        self.materials.extend(materials.iter().map(|material| MaterialData::from(material.color)));
        Ok(())
    }

    /// Append one material color and return its index
    pub fn push_material(&mut self, color: Vec4) -> RenderResult<u32> {
        if self.materials.len() >= self.capacity {
            return Err(RenderError::capacity("material stream", self.materials.len() + 1, self.capacity));
        }

        let index = self.materials.len();
        self.materials.push(color.into());
        Ok(u32::try_from(index).unwrap_or(u32::MAX))
    }

    /// Number of mirrored materials
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    /// Whether no materials are mirrored
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    /// Size in bytes of a GPU buffer able to hold a full table
    pub fn byte_capacity(&self) -> u64 {
        (self.capacity * std::mem::size_of::<MaterialData>()) as u64
    }

    /// Raw bytes in GPU layout
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.materials)
    }

    /// Drop the mirrored table without copying it
    pub fn clear(&mut self) {
        self.materials.clear();
    }

    /// Copy the table into `target`, then empty it
    pub fn flush(&mut self, target: &mut dyn StreamTarget) -> RenderResult<()> {
        target.write_stream("material buffer", self.as_bytes())?;
        self.materials.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::assets::AssetId;

    #[test]
    fn test_mirror_is_verbatim() {
        let mut stream = MaterialStream::new(4);
        let materials = [
            Material::new(AssetId(0), Vec4::new(1.0, 0.0, 0.0, 1.0)),
            Material::new(AssetId(0), Vec4::new(1.0, 0.0, 0.0, 1.0)),
            Material::new(AssetId(1), Vec4::new(0.0, 0.5, 1.0, 0.25)),
        ];

        stream.mirror(&materials).unwrap();

        // Duplicates are the caller's business
        assert_eq!(stream.len(), 3);
        let floats: &[f32] = bytemuck::cast_slice(stream.as_bytes());
        assert_eq!(&floats[8..12], &[0.0, 0.5, 1.0, 0.25]);
    }

    #[test]
    fn test_mirror_replaces_previous_frame() {
        let mut stream = MaterialStream::new(4);
        stream.push_material(Vec4::new(1.0, 1.0, 1.0, 1.0)).unwrap();
        stream.push_material(Vec4::new(1.0, 1.0, 1.0, 1.0)).unwrap();

        stream.mirror(&[Material::new(AssetId(2), Vec4::zeros())]).unwrap();
        assert_eq!(stream.len(), 1);
    }

    #[test]
    fn test_too_many_materials() {
        let mut stream = MaterialStream::new(1);
        let materials = vec![Material::new(AssetId(0), Vec4::zeros()); 2];

        assert!(matches!(
            stream.mirror(&materials),
            Err(RenderError::CapacityExceeded { resource: "material stream", .. })
        ));
    }

    #[test]
    fn test_flush_writes_sixteen_bytes_per_material() {
        let mut stream = MaterialStream::new(2);
        stream.push_material(Vec4::new(0.1, 0.2, 0.3, 0.4)).unwrap();

        let mut target = Vec::new();
        stream.flush(&mut target).unwrap();

        assert_eq!(target.len(), 16);
        assert!(stream.is_empty());
    }
}
