use nalgebra::{Vector2, Vector3, Vector4};
use std::ops::{Add, Mul};

use crate::core::geometry::Vertex;
use crate::core::pipeline::{Interpolatable, Shader};
use crate::gpu::MaterialParams;
use crate::gpu::texture::DeviceTexture;
use crate::pipeline::shaders::{Transforms, UNBOUND_TEXEL, blinn_phong, saturate};
use crate::scene::light::DirectionalLight;

/// Eye-space surface attributes shared by the per-fragment kernels.
#[derive(Clone, Copy, Debug)]
pub struct SurfaceVarying {
    pub eye_pos: Vector3<f32>,
    pub normal: Vector3<f32>,
    pub uv: Vector2<f32>,
    /// Eye-space tangent and handedness; zero when the vertex stage does not write it.
    pub tangent: Vector4<f32>,
}

impl Add for SurfaceVarying {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            eye_pos: self.eye_pos + other.eye_pos,
            normal: self.normal + other.normal,
            uv: self.uv + other.uv,
            tangent: self.tangent + other.tangent,
        }
    }
}

impl Mul<f32> for SurfaceVarying {
    type Output = Self;

    fn mul(self, scalar: f32) -> Self {
        Self {
            eye_pos: self.eye_pos * scalar,
            normal: self.normal * scalar,
            uv: self.uv * scalar,
            tangent: self.tangent * scalar,
        }
    }
}

impl Interpolatable for SurfaceVarying {
    fn texcoord(&self) -> Option<Vector2<f32>> {
        Some(self.uv)
    }
}

/// Vertex processing of the `surface` / `tangent_surface` kernels.
pub fn surface_vertex(
    transforms: &Transforms,
    vertex: &Vertex,
    with_tangent: bool,
) -> (Vector4<f32>, SurfaceVarying) {
    let eye = transforms.model_view * vertex.position.to_homogeneous();
    let tangent = if with_tangent {
        let t = transforms.normal * vertex.tangent.xyz();
        Vector4::new(t.x, t.y, t.z, vertex.tangent.w)
    } else {
        Vector4::zeros()
    };

    (
        transforms.projection * eye,
        SurfaceVarying {
            eye_pos: eye.xyz(),
            normal: transforms.normal * vertex.normal,
            uv: vertex.texcoord,
            tangent,
        },
    )
}

/// Per-fragment lighting shared with the normal-mapping kernel.
pub fn shade_fragment(
    light: &DirectionalLight,
    material: &MaterialParams,
    normal: &Vector3<f32>,
    eye_pos: &Vector3<f32>,
    texel: Vector4<f32>,
    alpha: f32,
) -> Vector4<f32> {
    let to_eye = (-eye_pos).try_normalize(1e-12).unwrap_or_else(Vector3::z);
    let terms = blinn_phong(light, material, normal, &to_eye);
    let rgb = terms.base.component_mul(&texel.xyz()) + terms.specular;
    saturate(Vector4::new(rgb.x, rgb.y, rgb.z, alpha * texel.w))
}

/// The `blinn_phong` fragment kernel.
pub struct BlinnPhongShader<'a> {
    pub transforms: Transforms,
    pub light: DirectionalLight,
    pub material: MaterialParams,
    /// Texture bound to the unit named by `colorMap`.
    pub color_map: Option<&'a DeviceTexture>,
    /// `materialAlpha`.
    pub alpha: f32,
    /// Whether the vertex stage writes the tangent frame.
    pub with_tangent: bool,
}

impl Shader for BlinnPhongShader<'_> {
    type Varying = SurfaceVarying;

    fn vertex(&self, vertex: &Vertex) -> (Vector4<f32>, Self::Varying) {
        surface_vertex(&self.transforms, vertex, self.with_tangent)
    }

    fn fragment(&self, varying: Self::Varying, uv_density: f32) -> Vector4<f32> {
        let normal = varying.normal.try_normalize(1e-12).unwrap_or_else(Vector3::z);
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
