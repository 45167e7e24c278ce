use std::collections::HashMap;

use tracing::warn;

use crate::scene::{MaterialId, SourceMaterial};

/// Substituted when a material's combined diffuse color is exactly black.
pub const FALLBACK_DIFFUSE: [f32; 3] = [0.8, 0.8, 0.8];

/// Final render attributes of one material, with intensities multiplied in.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialDescriptor {
    /// File name of the first texture image, without directories.
    pub texture: String,
    pub ambient: f32,
    pub diffuse: [f32; 3],
    pub specular: [f32; 3],
    pub emissive: [f32; 3],
    pub shininess: f32,
    pub transparency: f32,
}

fn scaled(color: [f32; 3], factor: f32) -> [f32; 3] {
    color.map(|c| c * factor)
}

/// Last path component, accepting both `/` and `\` separators.
pub fn texture_base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

impl MaterialDescriptor {
    pub fn from_source(material: &SourceMaterial) -> Self {
        let mut diffuse = scaled(material.diffuse_color, material.diffuse_intensity);
        if diffuse == [0.0; 3] {
            diffuse = FALLBACK_DIFFUSE;
        }

        Self {
            texture: material
                .textures
                .first()
                .map(|path| texture_base_name(path).to_string())
                .unwrap_or_default(),
            ambient: material.ambient,
            diffuse,
            specular: scaled(material.specular_color, material.specular_intensity),
            emissive: scaled(material.diffuse_color, material.emit),
            shininess: material.hardness,
            transparency: 1.0 - material.alpha,
        }
    }
}

/// Scene-wide material list. Each material handle is added once, on first
/// use, and groups refer to it by index.
#[derive(Debug, Default)]
pub struct MaterialTable {
    descriptors: Vec<MaterialDescriptor>,
    indices: HashMap<MaterialId, i32>,
}

impl MaterialTable {
    /// Index of `id` in the table, adding it on first use. Handles the
    /// provider does not know about resolve to -1.
    pub fn resolve(&mut self, id: MaterialId, materials: &[SourceMaterial]) -> i32 {
        if let Some(&index) = self.indices.get(&id) {
            return index;
        }
        let Some(source) = materials.iter().find(|m| m.id == id) else {
            warn!(material = id.0, "material not found in scene, using no material");
            return -1;
        };
        let index = self.descriptors.len() as i32;
        self.descriptors.push(MaterialDescriptor::from_source(source));
        self.indices.insert(id, index);
        index
    }

    pub fn into_descriptors(self) -> Vec<MaterialDescriptor> {
        self.descriptors
    }
}
