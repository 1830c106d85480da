use nalgebra::{Point3, Vector2, Vector3, Vector4};

/// A single vertex of the model's shared vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    /// Position in model space.
    pub position: Point3<f32>,
    pub normal: Vector3<f32>,
    /// Texture coordinates (UV), origin at the bottom-left of the image.
    pub texcoord: Vector2<f32>,
    /// Tangent (xyz) and bitangent handedness (w, either 1 or -1).
    pub tangent: Vector4<f32>,
}

impl Vertex {
    pub fn new(position: Point3<f32>, normal: Vector3<f32>, texcoord: Vector2<f32>) -> Self {
        Self {
            position,
            normal,
            texcoord,
            tangent: Vector4::zeros(),
        }
    }
}

impl Default for Vertex {
    fn default() -> Self {
        Self::new(Point3::origin(), Vector3::z(), Vector2::zeros())
    }
}
