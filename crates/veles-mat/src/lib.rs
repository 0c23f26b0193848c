//! Material resource parser.
//!
//! Materials sit between textures and meshes in the archive: a mesh node
//! resolves its material siblings, and each material layer names the texture
//! it samples. The extractor only caches the parsed material; meshes read it
//! through the driver's cache lookup.

mod error;

use tracing::debug;
use veles_common::BinaryReader;
use veles_wad::{BoxError, ExtractContext, Extracted, Extractor};

pub use error::{Error, Result};

/// Payload format tag of material resources.
pub const MAT_MAGIC: u32 = 0x8;

/// Size of the fixed material header.
const HEADER_SIZE: usize = 0x18;
/// Size of one layer record.
const LAYER_SIZE: usize = 0x40;

/// One texture layer of a material.
#[derive(Debug, Clone)]
pub struct Layer {
    pub flags: u32,
    pub blend: u32,
    /// Name of the texture node this layer samples, if any.
    pub texture: Option<String>,
}

/// A parsed material resource.
#[derive(Debug, Clone)]
pub struct Material {
    /// Base color, RGBA in 0..1.
    pub color: [f32; 4],
    pub layers: Vec<Layer>,
}

impl Material {
    /// Parse a material from its payload bytes.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(data);

        let magic = reader.read_u32()?;
        if magic != MAT_MAGIC {
            return Err(Error::BadMagic(magic));
        }

        let mut color = [0.0f32; 4];
        for channel in &mut color {
            *channel = reader.read_f32()?;
        }

        let layer_count = reader.read_u32()? as usize;
        let mut layers = Vec::with_capacity(layer_count);
        for i in 0..layer_count {
            let mut layer = BinaryReader::new_at(data, HEADER_SIZE + i * LAYER_SIZE);
            let flags = layer.read_u32()?;
            let blend = layer.read_u32()?;
            let name = layer.read_string_in_buffer(24)?;
            layers.push(Layer {
                flags,
                blend,
                texture: (!name.is_empty()).then(|| name.to_owned()),
            });
        }

        Ok(Self { color, layers })
    }

    /// Name of the first layer's texture, if the material has one.
    pub fn primary_texture(&self) -> Option<&str> {
        self.layers.first().and_then(|layer| layer.texture.as_deref())
    }
}

/// Extractor caching parsed materials for dependent meshes.
pub struct MaterialExtractor;

impl Extractor for MaterialExtractor {
    fn extract(&self, ctx: &ExtractContext<'_, '_>) -> std::result::Result<Extracted, BoxError> {
        let material = Material::parse(ctx.payload()?)?;
        debug!(
            "material '{}': {} layer(s)",
            ctx.node().path,
            material.layers.len()
        );
        Ok(Extracted {
            cache: Some(Box::new(material)),
            artifacts: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a material payload with the given layer texture names.
    fn material_payload(textures: &[&str]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend(MAT_MAGIC.to_le_bytes());
        for channel in [1.0f32, 0.5, 0.25, 1.0] {
            data.extend(channel.to_le_bytes());
        }
        data.extend((textures.len() as u32).to_le_bytes());
        assert_eq!(data.len(), HEADER_SIZE);
        for texture in textures {
            let mut layer = vec![0u8; LAYER_SIZE];
            layer[8..8 + texture.len()].copy_from_slice(texture.as_bytes());
            data.extend(layer);
        }
        data
    }

    #[test]
    fn test_parse_layers() {
        let data = material_payload(&["stone", ""]);
        let material = Material::parse(&data).unwrap();

        assert_eq!(material.layers.len(), 2);
        assert_eq!(material.primary_texture(), Some("stone"));
        assert!(material.layers[1].texture.is_none());
        assert_eq!(material.color[1], 0.5);
    }

    #[test]
    fn test_bad_magic() {
        let mut data = material_payload(&[]);
        data[0] = 0xFF;
        assert!(matches!(Material::parse(&data), Err(Error::BadMagic(_))));
    }
}
