use std::collections::HashMap;

use log::{debug, warn};
use nalgebra::{Matrix4, Vector2, Vector3, Vector4};

use crate::core::framebuffer::FrameBuffer;
use crate::core::geometry::Vertex;
use crate::core::pipeline::Shader;
use crate::core::rasterizer::{RasterState, Rasterizer};
use crate::error::DeviceError;
use crate::gpu::program::{CompiledStage, FragmentKernel, LinkedProgram, VertexKernel, compile_stage};
use crate::gpu::texture::DeviceTexture;
use crate::gpu::{
    BufferId, Capabilities, GraphicsDevice, MAX_TEXTURE_UNITS, MaterialParams, ProgramId,
    ShaderStage, StageId, TextureDesc, TextureId, UniformLocation, UniformValue, VertexStream,
    Viewport,
};
use crate::pipeline::shaders::Transforms;
use crate::pipeline::shaders::blinn_phong::BlinnPhongShader;
use crate::pipeline::shaders::fixed::FixedFunctionShader;
use crate::pipeline::shaders::normal_mapping::NormalMappingShader;
use crate::scene::light::DirectionalLight;

/// Construction options for [`SoftwareDevice`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceSettings {
    /// Supersampling factor per axis (1 = off).
    pub samples: usize,
    /// Report support for linked shader programs.
    pub programmable: bool,
    /// Anisotropy limit advertised to callers, `None` to report no support.
    pub max_anisotropy: Option<f32>,
    pub max_texture_size: u32,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            samples: 1,
            programmable: true,
            max_anisotropy: Some(16.0),
            max_texture_size: 8192,
        }
    }
}

/// Live resource counts, used for leak checks and diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceCounts {
    pub textures: usize,
    pub stages: usize,
    pub programs: usize,
    pub geometries: usize,
}

struct Geometry {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
}

/// A [`GraphicsDevice`] that rasterizes on the CPU with rayon.
pub struct SoftwareDevice {
    settings: DeviceSettings,
    framebuffer: FrameBuffer,
    next_handle: u32,

    textures: HashMap<TextureId, DeviceTexture>,
    stages: HashMap<StageId, CompiledStage>,
    programs: HashMap<ProgramId, LinkedProgram>,
    geometries: HashMap<BufferId, Geometry>,

    raster: RasterState,
    projection: Matrix4<f32>,
    view: Matrix4<f32>,
    light: DirectionalLight,
    material: MaterialParams,
    program: Option<ProgramId>,
    units: [Option<TextureId>; MAX_TEXTURE_UNITS as usize],
    streams: u8,
}

impl SoftwareDevice {
    pub fn new(settings: DeviceSettings) -> Result<Self, DeviceError> {
        if !(1..=4).contains(&settings.samples) {
            return Err(DeviceError::InvalidSampleCount(settings.samples));
        }
        debug!(
            "Software device: {}x SSAA, programmable={}, anisotropy={:?}",
            settings.samples, settings.programmable, settings.max_anisotropy
        );

        Ok(Self {
            settings,
            framebuffer: FrameBuffer::new(1, 1, settings.samples),
            next_handle: 1,
            textures: HashMap::new(),
            stages: HashMap::new(),
            programs: HashMap::new(),
            geometries: HashMap::new(),
            raster: RasterState::default(),
            projection: Matrix4::identity(),
            view: Matrix4::identity(),
            light: DirectionalLight::headlight(),
            material: MaterialParams::default(),
            program: None,
            units: [None; MAX_TEXTURE_UNITS as usize],
            streams: 0,
        })
    }

    pub fn framebuffer(&self) -> &FrameBuffer {
        &self.framebuffer
    }

    /// Copies the last frame out as top-down RGBA8, returning its size in pixels.
    pub fn read_pixels(&self, out: &mut Vec<u8>) -> [usize; 2] {
        self.framebuffer.resolve_rgba8(out);
        [self.framebuffer.width, self.framebuffer.height]
    }

    pub fn resource_counts(&self) -> ResourceCounts {
        ResourceCounts {
            textures: self.textures.len(),
            stages: self.stages.len(),
            programs: self.programs.len(),
            geometries: self.geometries.len(),
        }
    }

    fn allocate(&mut self) -> u32 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn stream_enabled(&self, stream: VertexStream) -> bool {
        self.streams & stream.bit() != 0
    }

    /// Vertex attributes as seen by the shader; disabled streams read defaults.
    fn fetch(&self, v: &Vertex) -> Vertex {
        Vertex {
            position: v.position,
            normal: if self.stream_enabled(VertexStream::Normal) {
                v.normal
            } else {
                Vector3::z()
            },
            texcoord: if self.stream_enabled(VertexStream::TexCoord) {
                v.texcoord
            } else {
                Vector2::zeros()
            },
            tangent: if self.stream_enabled(VertexStream::Tangent) {
                v.tangent
            } else {
                Vector4::zeros()
            },
        }
    }

    fn bound(&self, unit: usize) -> Option<&DeviceTexture> {
        self.units
            .get(unit)
            .copied()
            .flatten()
            .and_then(|id| self.textures.get(&id))
    }

    fn sampler(&self, program: &LinkedProgram, name: &str) -> Option<&DeviceTexture> {
        program
            .int(name)
            .and_then(|unit| usize::try_from(unit).ok())
            .and_then(|unit| self.bound(unit))
    }

    fn rasterize<S: Shader>(&self, shader: &S, geometry: &Geometry, indices: &[u32]) {
        let rasterizer = Rasterizer::new(self.raster);
        for triangle in indices.chunks_exact(3) {
            let [a, b, c] = [triangle[0], triangle[1], triangle[2]]
                .map(|i| shader.vertex(&self.fetch(&geometry.vertices[i as usize])));
            rasterizer.draw_triangle(&self.framebuffer, shader, &[a.0, b.0, c.0], &[a.1, b.1, c.1]);
        }
    }
}

impl GraphicsDevice for SoftwareDevice {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            programmable_pipeline: self.settings.programmable,
            max_anisotropy: self.settings.max_anisotropy,
        }
    }

    fn create_texture(&mut self, desc: &TextureDesc, pixels: &[u8]) -> Result<TextureId, DeviceError> {
        let limit = self.settings.max_texture_size;
        if desc.width > limit || desc.height > limit {
            return Err(DeviceError::TextureTooLarge {
                width: desc.width,
                height: desc.height,
                limit,
            });
        }
        let mut desc = *desc;
        desc.anisotropy = desc
            .anisotropy
            .min(self.settings.max_anisotropy.unwrap_or(1.0));

        let texture = DeviceTexture::new(&desc, pixels)?;
        let id = TextureId(self.allocate());
        debug!(
            "Created texture {id:?}: {}x{}, {} mip levels",
            texture.width(),
            texture.height(),
            texture.mip_levels()
        );
        self.textures.insert(id, texture);
        Ok(id)
    }

    fn delete_texture(&mut self, texture: TextureId) {
        if self.textures.remove(&texture).is_none() {
            warn!("Deleting unknown texture {texture:?}");
        }
        for unit in self.units.iter_mut().filter(|u| **u == Some(texture)) {
            *unit = None;
        }
    }

    fn compile_stage(&mut self, stage: ShaderStage, source: &str) -> Result<StageId, String> {
        let compiled = compile_stage(stage, source)?;
        let id = StageId(self.allocate());
        self.stages.insert(id, compiled);
        Ok(id)
    }

    fn delete_stage(&mut self, stage: StageId) {
        if self.stages.remove(&stage).is_none() {
            warn!("Deleting unknown shader stage {stage:?}");
        }
    }

    fn link_program(&mut self, stages: &[StageId]) -> Result<ProgramId, String> {
        let attached = stages
            .iter()
            .map(|id| {
                self.stages
                    .get(id)
                    .ok_or_else(|| format!("ERROR: {id:?} is not a compiled shader"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let linked = LinkedProgram::link(&attached)?;
        let id = ProgramId(self.allocate());
        self.programs.insert(id, linked);
        Ok(id)
    }

    fn delete_program(&mut self, program: ProgramId) {
        if self.programs.remove(&program).is_none() {
            warn!("Deleting unknown program {program:?}");
        }
        if self.program == Some(program) {
            self.program = None;
        }
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        self.programs.get(&program)?.location(name)
    }

    fn create_geometry(&mut self, vertices: &[Vertex], indices: &[u32]) -> Result<BufferId, DeviceError> {
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(DeviceError::IndexOutOfRange {
                index,
                vertex_count: vertices.len(),
            });
        }
        let id = BufferId(self.allocate());
        self.geometries.insert(
            id,
            Geometry {
                vertices: vertices.to_vec(),
                indices: indices.to_vec(),
            },
        );
        debug!(
            "Uploaded geometry {id:?}: {} vertices, {} indices",
            vertices.len(),
            indices.len()
        );
        Ok(id)
    }

    fn delete_geometry(&mut self, geometry: BufferId) {
        if self.geometries.remove(&geometry).is_none() {
            warn!("Deleting unknown geometry {geometry:?}");
        }
    }

    fn begin_frame(&mut self, viewport: Viewport, clear_color: [f32; 4]) {
        self.framebuffer
            .resize(viewport.width.max(1) as usize, viewport.height.max(1) as usize);
        self.framebuffer.clear(Vector4::from(clear_color));
    }

    fn set_projection(&mut self, projection: Matrix4<f32>) {
        self.projection = projection;
    }

    fn set_view(&mut self, view: Matrix4<f32>) {
        self.view = view;
    }

    fn set_culling(&mut self, cull_back_faces: bool) {
        self.raster.cull_back_faces = cull_back_faces;
    }

    fn set_wireframe(&mut self, wireframe: bool) {
        self.raster.wireframe = wireframe;
    }

    fn set_blending(&mut self, enabled: bool) {
        self.raster.blend = enabled;
    }

    fn set_material(&mut self, material: &MaterialParams) {
        self.material = *material;
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        if let Some(id) = program
            && !self.programs.contains_key(&id)
        {
            warn!("Binding unknown program {id:?}");
            return;
        }
        self.program = program;
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>) {
        match self.units.get_mut(unit as usize) {
            Some(slot) => *slot = texture,
            None => warn!("Texture unit {unit} out of range"),
        }
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        let Some(program) = self.program.and_then(|id| self.programs.get_mut(&id)) else {
            warn!("set_uniform with no program bound");
            return;
        };
        if !program.set(location, value) {
            warn!("Rejected uniform {value:?} for location {location:?}");
        }
    }

    fn enable_stream(&mut self, stream: VertexStream) {
        self.streams |= stream.bit();
    }

    fn disable_stream(&mut self, stream: VertexStream) {
        self.streams &= !stream.bit();
    }

    fn draw_indexed(&mut self, geometry: BufferId, first_index: usize, index_count: usize) {
        let Some(geo) = self.geometries.get(&geometry) else {
            warn!("Draw with unknown geometry {geometry:?}");
            return;
        };
        if !self.stream_enabled(VertexStream::Position) {
            debug!("Draw skipped: position stream disabled");
            return;
        }
        let end = first_index.saturating_add(index_count).min(geo.indices.len());
        if first_index >= end {
            return;
        }
        let indices = &geo.indices[first_index..end];

        let transforms = Transforms::new(self.view, self.projection);
        let program = self.program.and_then(|id| self.programs.get(&id));

        match program.and_then(|p| p.fragment.map(|kernel| (p, kernel))) {
            None => {
                let shader = FixedFunctionShader {
                    transforms,
                    light: self.light,
                    material: self.material,
                    texture: self.bound(0),
                };
                self.rasterize(&shader, geo, indices);
            }
            Some((p, FragmentKernel::BlinnPhong)) => {
                let shader = BlinnPhongShader {
                    transforms,
                    light: self.light,
                    material: self.material,
                    color_map: self.sampler(p, "colorMap"),
                    alpha: p.float("materialAlpha").unwrap_or(1.0),
                    with_tangent: p.vertex == Some(VertexKernel::TangentSurface),
                };
                self.rasterize(&shader, geo, indices);
            }
            Some((p, FragmentKernel::NormalMapping)) => {
                let shader = NormalMappingShader {
                    transforms,
                    light: self.light,
                    material: self.material,
                    color_map: self.sampler(p, "colorMap"),
                    normal_map: self.sampler(p, "normalMap"),
                    alpha: p.float("materialAlpha").unwrap_or(1.0),
                };
                self.rasterize(&shader, geo, indices);
            }
        }
    }
}
