//! Shading kernels run by the software device.

pub mod blinn_phong;
pub mod fixed;
pub mod normal_mapping;

use nalgebra::{Matrix3, Matrix4, Vector3, Vector4};

use crate::core::math::transform::normal_matrix;
use crate::gpu::MaterialParams;
use crate::scene::light::{DirectionalLight, GLOBAL_AMBIENT};

/// Matrices shared by every kernel of a draw. The model matrix is identity.
#[derive(Debug, Clone, Copy)]
pub struct Transforms {
    pub model_view: Matrix4<f32>,
    pub projection: Matrix4<f32>,
    pub normal: Matrix3<f32>,
}

impl Transforms {
    pub fn new(view: Matrix4<f32>, projection: Matrix4<f32>) -> Self {
        Self {
            model_view: view,
            projection,
            normal: normal_matrix(&view),
        }
    }
}

/// Blinn-Phong terms for one light, split so callers can decide what the texture modulates.
#[derive(Debug, Clone, Copy)]
pub struct LightTerms {
    /// Ambient plus diffuse.
    pub base: Vector3<f32>,
    pub specular: Vector3<f32>,
}

/// Evaluates the lighting equation in eye space.
///
/// `normal` and `to_eye` must be unit length.
pub fn blinn_phong(
    light: &DirectionalLight,
    material: &MaterialParams,
    normal: &Vector3<f32>,
    to_eye: &Vector3<f32>,
) -> LightTerms {
    let ambient = Vector3::from_column_slice(&material.ambient[..3]);
    let diffuse = Vector3::from_column_slice(&material.diffuse[..3]);
    let specular = Vector3::from_column_slice(&material.specular[..3]);

    let n_dot_l = normal.dot(&light.to_light).max(0.0);
    let spec = if n_dot_l > 0.0 {
        let half = (light.to_light + to_eye).normalize();
        normal.dot(&half).max(0.0).powf(material.shininess)
    } else {
        0.0
    };

    LightTerms {
        base: (GLOBAL_AMBIENT + light.ambient).component_mul(&ambient)
            + light.diffuse.component_mul(&diffuse) * n_dot_l,
        specular: light.specular.component_mul(&specular) * spec,
    }
}

#[inline]
pub(crate) fn saturate(c: Vector4<f32>) -> Vector4<f32> {
    c.map(|v| v.clamp(0.0, 1.0))
}

/// Result of sampling a unit with nothing bound.
pub(crate) const UNBOUND_TEXEL: Vector4<f32> = Vector4::new(0.0, 0.0, 0.0, 1.0);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_facing_the_light_gets_full_diffuse() {
        let material = MaterialParams {
            ambient: [0.0; 4],
            diffuse: [0.5, 0.5, 0.5, 1.0],
            specular: [1.0, 1.0, 1.0, 1.0],
            shininess: 16.0,
        };
        let terms = blinn_phong(
            &DirectionalLight::headlight(),
            &material,
            &Vector3::z(),
            &Vector3::z(),
        );
        assert!((terms.base.x - 0.5).abs() < 1e-6);
        assert!((terms.specular.x - 1.0).abs() < 1e-6);
    }

    #[test]
    fn surface_facing_away_is_ambient_only() {
        let terms = blinn_phong(
            &DirectionalLight::headlight(),
            &MaterialParams::default(),
            &-Vector3::z(),
            &Vector3::z(),
        );
        assert!((terms.base.x - 0.04).abs() < 1e-6);
        assert_eq!(terms.specular, Vector3::zeros());
    }
}
