use std::path::PathBuf;

use crate::gpu::MaterialParams;

/// Scale from the normalized MTL shininess to the specular exponent.
pub const SHININESS_SCALE: f32 = 128.0;

/// Surface description read from the MTL file. Immutable after import.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub ambient: [f32; 3],
    pub diffuse: [f32; 3],
    pub specular: [f32; 3],
    /// Normalized to [0, 1].
    pub shininess: f32,
    pub alpha: f32,
    /// Color-map path exactly as written in the MTL file; empty when absent.
    pub color_map: String,
    /// Bump/normal-map path exactly as written in the MTL file; empty when absent.
    pub bump_map: String,
    /// Directory of the MTL file that defined this material. Texture paths are relative to it.
    pub texture_dir: Option<PathBuf>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            ambient: [0.2, 0.2, 0.2],
            diffuse: [0.8, 0.8, 0.8],
            specular: [0.0, 0.0, 0.0],
            shininess: 0.0,
            alpha: 1.0,
            color_map: String::new(),
            bump_map: String::new(),
            texture_dir: None,
        }
    }
}

impl Material {
    pub fn has_color_map(&self) -> bool {
        !self.color_map.is_empty()
    }

    pub fn has_bump_map(&self) -> bool {
        !self.bump_map.is_empty()
    }

    /// Lighting parameters as pushed to the device, alpha carried in the diffuse color.
    pub fn params(&self) -> MaterialParams {
        let [ar, ag, ab] = self.ambient;
        let [dr, dg, db] = self.diffuse;
        let [sr, sg, sb] = self.specular;
        MaterialParams {
            ambient: [ar, ag, ab, 1.0],
            diffuse: [dr, dg, db, self.alpha],
            specular: [sr, sg, sb, 1.0],
            shininess: self.shininess.clamp(0.0, 1.0) * SHININESS_SCALE,
        }
    }
}
