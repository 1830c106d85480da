use nalgebra::{Vector2, Vector3, Vector4};
use std::ops::{Add, Mul};

use crate::core::geometry::Vertex;
use crate::core::pipeline::{Interpolatable, Shader};
use crate::gpu::MaterialParams;
use crate::gpu::texture::DeviceTexture;
use crate::pipeline::shaders::{Transforms, blinn_phong, saturate};
use crate::scene::light::DirectionalLight;

/// Lit color computed per vertex, plus the coordinates for texture modulation.
#[derive(Clone, Copy, Debug)]
pub struct GouraudVarying {
    pub color: Vector4<f32>,
    pub uv: Vector2<f32>,
}

impl Add for GouraudVarying {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            color: self.color + other.color,
            uv: self.uv + other.uv,
        }
    }
}

impl Mul<f32> for GouraudVarying {
    type Output = Self;

    fn mul(self, scalar: f32) -> Self {
        Self {
            color: self.color * scalar,
            uv: self.uv * scalar,
        }
    }
}

impl Interpolatable for GouraudVarying {
    fn texcoord(&self) -> Option<Vector2<f32>> {
        Some(self.uv)
    }
}

/// Fixed-function shading: per-vertex lighting with an infinite viewer,
/// modulated by the texture on unit 0 when one is bound.
pub struct FixedFunctionShader<'a> {
    pub transforms: Transforms,
    pub light: DirectionalLight,
    pub material: MaterialParams,
    pub texture: Option<&'a DeviceTexture>,
}

impl Shader for FixedFunctionShader<'_> {
    type Varying = GouraudVarying;

    fn vertex(&self, vertex: &Vertex) -> (Vector4<f32>, Self::Varying) {
        let eye = self.transforms.model_view * vertex.position.to_homogeneous();
        let normal = (self.transforms.normal * vertex.normal)
            .try_normalize(1e-12)
            .unwrap_or_else(Vector3::z);

        let terms = blinn_phong(&self.light, &self.material, &normal, &Vector3::z());
        let rgb = terms.base + terms.specular;
        let color = Vector4::new(rgb.x, rgb.y, rgb.z, self.material.diffuse[3]);

        (
            self.transforms.projection * eye,
            GouraudVarying {
                color: saturate(color),
                uv: vertex.texcoord,
            },
        )
    }

    fn fragment(&self, varying: Self::Varying, uv_density: f32) -> Vector4<f32> {
        match self.texture {
            Some(texture) => saturate(
                varying
                    .color
                    .component_mul(&texture.sample(varying.uv, uv_density)),
            ),
            None => varying.color,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{TextureDesc, TextureFilter, WrapMode};
    use nalgebra::{Matrix4, Point3};

    fn shader(texture: Option<&DeviceTexture>) -> FixedFunctionShader<'_> {
        FixedFunctionShader {
            transforms: Transforms::new(Matrix4::identity(), Matrix4::identity()),
            light: DirectionalLight::headlight(),
            material: MaterialParams {
                ambient: [0.0; 4],
                diffuse: [1.0, 1.0, 1.0, 0.5],
                specular: [0.0; 4],
                shininess: 0.0,
            },
            texture,
        }
    }

    #[test]
    fn untextured_color_is_the_lit_material() {
        let s = shader(None);
        let v = Vertex::new(Point3::origin(), Vector3::z(), Vector2::zeros());
        let (_, varying) = s.vertex(&v);
        let c = s.fragment(varying, 0.0);
        assert!((c.x - 1.0).abs() < 1e-6);
        assert!((c.w - 0.5).abs() < 1e-6);
    }

    #[test]
    fn bound_texture_modulates_the_color() {
        let desc = TextureDesc {
            width: 1,
            height: 1,
            filter: TextureFilter::Nearest,
            wrap: WrapMode::Repeat,
            mipmaps: false,
            anisotropy: 1.0,
        };
        let red = DeviceTexture::new(&desc, &[255, 0, 0, 255]).unwrap();
        let s = shader(Some(&red));
        let v = Vertex::new(Point3::origin(), Vector3::z(), Vector2::zeros());
        let (_, varying) = s.vertex(&v);
        let c = s.fragment(varying, 0.0);
        assert!((c.x - 1.0).abs() < 1e-6);
        assert_eq!(c.y, 0.0);
    }
}
