use nalgebra::{Matrix3, Vector3, Vector4};

use crate::core::geometry::Vertex;
use crate::core::pipeline::Shader;
use crate::gpu::MaterialParams;
use crate::gpu::texture::DeviceTexture;
use crate::pipeline::shaders::blinn_phong::{SurfaceVarying, shade_fragment, surface_vertex};
use crate::pipeline::shaders::{Transforms, UNBOUND_TEXEL};
use crate::scene::light::DirectionalLight;

/// The `normal_mapping` fragment kernel: Blinn-Phong with the surface normal
/// read from a tangent-space normal map.
pub struct NormalMappingShader<'a> {
    pub transforms: Transforms,
    pub light: DirectionalLight,
    pub material: MaterialParams,
    pub color_map: Option<&'a DeviceTexture>,
    pub normal_map: Option<&'a DeviceTexture>,
    pub alpha: f32,
}

impl NormalMappingShader<'_> {
    fn perturbed_normal(&self, varying: &SurfaceVarying, uv_density: f32) -> Vector3<f32> {
        let n = varying.normal.try_normalize(1e-12).unwrap_or_else(Vector3::z);

        let Some(normal_map) = self.normal_map else {
            return n;
        };
        // No usable tangent frame (e.g. the model has no texcoords).
        let Some(t) = varying.tangent.xyz().try_normalize(1e-6) else {
            return n;
        };

        // Interpolation skews the frame; re-orthogonalize against N.
        let Some(t) = (t - n * n.dot(&t)).try_normalize(1e-6) else {
            return n;
        };
        let handedness = if varying.tangent.w < 0.0 { -1.0 } else { 1.0 };
        let b = n.cross(&t) * handedness;
        let tbn = Matrix3::from_columns(&[t, b, n]);

        let packed = normal_map.sample(varying.uv, uv_density);
        let local = packed.xyz() * 2.0 - Vector3::repeat(1.0);
        (tbn * local).try_normalize(1e-12).unwrap_or(n)
    }
}

impl Shader for NormalMappingShader<'_> {
    type Varying = SurfaceVarying;

    fn vertex(&self, vertex: &Vertex) -> (Vector4<f32>, Self::Varying) {
        surface_vertex(&self.transforms, vertex, true)
    }

    fn fragment(&self, varying: Self::Varying, uv_density: f32) -> Vector4<f32> {
        let normal = self.perturbed_normal(&varying, uv_density);
        let texel = self
            .color_map
            .map_or(UNBOUND_TEXEL, |t| t.sample(varying.uv, uv_density));
        shade_fragment(
            &self.light,
            &self.material,
            &normal,
            &varying.eye_pos,
            texel,
            self.alpha,
        )
    }
}
