//! Handle-based graphics device abstraction.
//!
//! The viewer never touches pixels directly: it creates resources, sets
//! per-draw state and issues indexed draws through [`GraphicsDevice`], the same
//! way a fixed-function / programmable GPU API is driven. [`SoftwareDevice`]
//! is the backend shipped with the viewer.

pub mod program;
pub mod software;
pub mod texture;

#[cfg(test)]
pub mod recording;

use std::fmt;

use nalgebra::Matrix4;

use crate::core::geometry::Vertex;
use crate::error::DeviceError;

pub use software::{DeviceSettings, SoftwareDevice};

/// Number of texture units a device exposes.
pub const MAX_TEXTURE_UNITS: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StageId(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub(crate) u32);

/// Program-local uniform slot returned by [`GraphicsDevice::uniform_location`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Vertex attribute streams that can be enabled per draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexStream {
    Position,
    TexCoord,
    Normal,
    /// Four components: tangent direction plus handedness.
    Tangent,
}

impl VertexStream {
    pub(crate) fn bit(self) -> u8 {
        match self {
            VertexStream::Position => 1,
            VertexStream::TexCoord => 1 << 1,
            VertexStream::Normal => 1 << 2,
            VertexStream::Tangent => 1 << 3,
        }
    }
}

/// Features detected once at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Capabilities {
    /// Whether linked shader programs can replace fixed-function shading.
    pub programmable_pipeline: bool,
    /// Highest anisotropy the sampler supports, `None` when anisotropic filtering is missing.
    pub max_anisotropy: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFilter {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapMode {
    Repeat,
    ClampToEdge,
}

/// Creation parameters for a 2D RGBA8 texture. Pixel rows are supplied bottom-up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub filter: TextureFilter,
    pub wrap: WrapMode,
    /// Build and sample a full mip chain.
    pub mipmaps: bool,
    /// 1.0 disables anisotropic filtering.
    pub anisotropy: f32,
}

impl TextureDesc {
    /// Mipmapped, linearly filtered, repeating texture.
    pub fn material_map(width: u32, height: u32, anisotropy: Option<f32>) -> Self {
        Self {
            width,
            height,
            filter: TextureFilter::Linear,
            wrap: WrapMode::Repeat,
            mipmaps: true,
            anisotropy: anisotropy.unwrap_or(1.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
}

/// Fixed lighting parameters of the surface being drawn. Alpha rides in `diffuse[3]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialParams {
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    /// Specular exponent in [0, 128].
    pub shininess: f32,
}

impl Default for MaterialParams {
    fn default() -> Self {
        Self {
            ambient: [0.2, 0.2, 0.2, 1.0],
            diffuse: [0.8, 0.8, 0.8, 1.0],
            specular: [0.0, 0.0, 0.0, 1.0],
            shininess: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

/// The device seam between the viewer and whatever executes draw calls.
///
/// Resource handles stay valid until explicitly deleted. Compile and link
/// failures return the diagnostic log as text. Per-draw state persists until
/// changed, and `set_uniform` applies to the program bound by `use_program`.
pub trait GraphicsDevice {
    fn capabilities(&self) -> Capabilities;

    fn create_texture(&mut self, desc: &TextureDesc, pixels: &[u8]) -> Result<TextureId, DeviceError>;
    fn delete_texture(&mut self, texture: TextureId);

    fn compile_stage(&mut self, stage: ShaderStage, source: &str) -> Result<StageId, String>;
    fn delete_stage(&mut self, stage: StageId);
    fn link_program(&mut self, stages: &[StageId]) -> Result<ProgramId, String>;
    fn delete_program(&mut self, program: ProgramId);
    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation>;

    fn create_geometry(&mut self, vertices: &[Vertex], indices: &[u32]) -> Result<BufferId, DeviceError>;
    fn delete_geometry(&mut self, geometry: BufferId);

    /// Sizes the render target and clears color and depth.
    fn begin_frame(&mut self, viewport: Viewport, clear_color: [f32; 4]);
    fn set_projection(&mut self, projection: Matrix4<f32>);
    fn set_view(&mut self, view: Matrix4<f32>);
    fn set_culling(&mut self, cull_back_faces: bool);
    fn set_wireframe(&mut self, wireframe: bool);
    fn set_blending(&mut self, enabled: bool);
    fn set_material(&mut self, material: &MaterialParams);
    fn use_program(&mut self, program: Option<ProgramId>);
    /// `None` unbinds the unit, which disables texturing on the fixed-function path.
    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>);
    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue);
    fn enable_stream(&mut self, stream: VertexStream);
    fn disable_stream(&mut self, stream: VertexStream);
    fn draw_indexed(&mut self, geometry: BufferId, first_index: usize, index_count: usize);
}
