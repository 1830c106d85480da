use nalgebra::Vector3;

/// Scene-wide ambient term added to every surface.
pub const GLOBAL_AMBIENT: Vector3<f32> = Vector3::new(0.2, 0.2, 0.2);

/// The viewer's single directional light, defined in eye space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    /// Unit vector from the surface towards the light.
    pub to_light: Vector3<f32>,
    pub ambient: Vector3<f32>,
    pub diffuse: Vector3<f32>,
    pub specular: Vector3<f32>,
}

impl DirectionalLight {
    /// White light shining along the view direction.
    pub fn headlight() -> Self {
        Self {
            to_light: Vector3::z(),
            ambient: Vector3::zeros(),
            diffuse: Vector3::repeat(1.0),
            specular: Vector3::repeat(1.0),
        }
    }
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self::headlight()
    }
}
