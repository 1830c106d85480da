use crate::core::geometry::Vertex;
use nalgebra::{Vector2, Vector4};
use std::ops::{Add, Mul};

/// Per-vertex shader outputs that can be blended across a triangle.
///
/// Clipping and barycentric interpolation both rely on the linear combination
/// `a * s + b * t`, and fragments are shaded from several rayon workers at once.
pub trait Interpolatable:
    Copy + Clone + Add<Output = Self> + Mul<f32, Output = Self> + Send + Sync
{
    /// Texture coordinates carried by the varying, used for mip level selection.
    fn texcoord(&self) -> Option<Vector2<f32>> {
        None
    }
}

/// A shading kernel executed by the software device for every draw call.
pub trait Shader: Send + Sync {
    type Varying: Interpolatable;

    /// Returns the clip-space position and the varying for one vertex.
    fn vertex(&self, vertex: &Vertex) -> (Vector4<f32>, Self::Varying);

    /// Returns the straight (non-premultiplied) RGBA color of one fragment.
    ///
    /// `uv_density` estimates texture-space extent per raster sample over the
    /// whole triangle (`sqrt(area_uv / area_screen)`); zero when unknown.
    fn fragment(&self, varying: Self::Varying, uv_density: f32) -> Vector4<f32>;
}
