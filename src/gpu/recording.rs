//! A [`GraphicsDevice`] double that records every call.

use std::collections::{HashMap, HashSet};

use nalgebra::Matrix4;

use crate::core::geometry::Vertex;
use crate::error::DeviceError;
use crate::gpu::{
    BufferId, Capabilities, GraphicsDevice, MaterialParams, ProgramId, ShaderStage, StageId,
    TextureDesc, TextureId, UniformLocation, UniformValue, VertexStream, Viewport,
};

const UNIFORM_NAMES: [&str; 3] = ["colorMap", "normalMap", "materialAlpha"];

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateTexture(TextureId, TextureDesc),
    DeleteTexture(TextureId),
    CompileStage(ShaderStage, String),
    DeleteStage(StageId),
    LinkProgram(Vec<StageId>),
    DeleteProgram(ProgramId),
    CreateGeometry(BufferId),
    DeleteGeometry(BufferId),
    BeginFrame(Viewport),
    SetProjection,
    SetView(Matrix4<f32>),
    SetCulling(bool),
    SetWireframe(bool),
    SetBlending(bool),
    SetMaterial(MaterialParams),
    UseProgram(Option<ProgramId>),
    BindTexture(u32, Option<TextureId>),
    SetUniform(&'static str, UniformValue),
    EnableStream(VertexStream),
    DisableStream(VertexStream),
    Draw(BufferId, usize, usize),
}

pub struct RecordingDevice {
    pub calls: Vec<Call>,
    pub capabilities: Capabilities,
    /// Compile failure injected for one stage kind.
    pub compile_error: Option<(ShaderStage, String)>,
    pub link_error: Option<String>,
    pub fail_geometry: bool,
    pub textures: HashSet<TextureId>,
    pub stages: HashSet<StageId>,
    pub programs: HashSet<ProgramId>,
    pub geometries: HashSet<BufferId>,
    pub pixels: HashMap<TextureId, Vec<u8>>,
    next: u32,
}

impl RecordingDevice {
    pub fn new(programmable: bool) -> Self {
        Self {
            calls: Vec::new(),
            capabilities: Capabilities {
                programmable_pipeline: programmable,
                max_anisotropy: Some(8.0),
            },
            compile_error: None,
            link_error: None,
            fail_geometry: false,
            textures: HashSet::new(),
            stages: HashSet::new(),
            programs: HashSet::new(),
            geometries: HashSet::new(),
            pixels: HashMap::new(),
            next: 1,
        }
    }

    fn allocate(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }

    pub fn textures_created(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::CreateTexture(..)))
            .count()
    }

    pub fn draws(&self) -> Vec<(BufferId, usize, usize)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Draw(g, first, count) => Some((*g, *first, *count)),
                _ => None,
            })
            .collect()
    }

    /// Calls issued after the previous draw and up to the draw at `n`.
    pub fn state_for_draw(&self, n: usize) -> Vec<Call> {
        let mut start = 0;
        let mut seen = 0;
        for (i, call) in self.calls.iter().enumerate() {
            if let Call::Draw(..) = call {
                if seen == n {
                    return self.calls[start..i].to_vec();
                }
                seen += 1;
                start = i + 1;
            }
        }
        Vec::new()
    }

    pub fn live_resources(&self) -> usize {
        self.textures.len() + self.stages.len() + self.programs.len() + self.geometries.len()
    }
}

impl GraphicsDevice for RecordingDevice {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn create_texture(&mut self, desc: &TextureDesc, pixels: &[u8]) -> Result<TextureId, DeviceError> {
        let id = TextureId(self.allocate());
        self.textures.insert(id);
        self.pixels.insert(id, pixels.to_vec());
        self.calls.push(Call::CreateTexture(id, *desc));
        Ok(id)
    }

    fn delete_texture(&mut self, texture: TextureId) {
        assert!(self.textures.remove(&texture), "double delete of {texture:?}");
        self.calls.push(Call::DeleteTexture(texture));
    }

    fn compile_stage(&mut self, stage: ShaderStage, source: &str) -> Result<StageId, String> {
        self.calls.push(Call::CompileStage(stage, source.to_string()));
        if let Some((failing, log)) = &self.compile_error
            && *failing == stage
        {
            return Err(log.clone());
        }
        let id = StageId(self.allocate());
        self.stages.insert(id);
        Ok(id)
    }

    fn delete_stage(&mut self, stage: StageId) {
        assert!(self.stages.remove(&stage), "double delete of {stage:?}");
        self.calls.push(Call::DeleteStage(stage));
    }

    fn link_program(&mut self, stages: &[StageId]) -> Result<ProgramId, String> {
        self.calls.push(Call::LinkProgram(stages.to_vec()));
        if let Some(log) = &self.link_error {
            return Err(log.clone());
        }
        let id = ProgramId(self.allocate());
        self.programs.insert(id);
        Ok(id)
    }

    fn delete_program(&mut self, program: ProgramId) {
        assert!(self.programs.remove(&program), "double delete of {program:?}");
        self.calls.push(Call::DeleteProgram(program));
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        if !self.programs.contains(&program) {
            return None;
        }
        UNIFORM_NAMES
            .iter()
            .position(|n| *n == name)
            .map(UniformLocation)
    }

    fn create_geometry(&mut self, _vertices: &[Vertex], _indices: &[u32]) -> Result<BufferId, DeviceError> {
        if self.fail_geometry {
            return Err(DeviceError::InvalidSampleCount(0));
        }
        let id = BufferId(self.allocate());
        self.geometries.insert(id);
        self.calls.push(Call::CreateGeometry(id));
        Ok(id)
    }

    fn delete_geometry(&mut self, geometry: BufferId) {
        assert!(self.geometries.remove(&geometry), "double delete of {geometry:?}");
        self.calls.push(Call::DeleteGeometry(geometry));
    }

    fn begin_frame(&mut self, viewport: Viewport, _clear_color: [f32; 4]) {
        self.calls.push(Call::BeginFrame(viewport));
    }

    fn set_projection(&mut self, _projection: Matrix4<f32>) {
        self.calls.push(Call::SetProjection);
    }

    fn set_view(&mut self, view: Matrix4<f32>) {
        self.calls.push(Call::SetView(view));
    }

    fn set_culling(&mut self, cull_back_faces: bool) {
        self.calls.push(Call::SetCulling(cull_back_faces));
    }

    fn set_wireframe(&mut self, wireframe: bool) {
        self.calls.push(Call::SetWireframe(wireframe));
    }

    fn set_blending(&mut self, enabled: bool) {
        self.calls.push(Call::SetBlending(enabled));
    }

    fn set_material(&mut self, material: &MaterialParams) {
        self.calls.push(Call::SetMaterial(*material));
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        self.calls.push(Call::UseProgram(program));
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>) {
        self.calls.push(Call::BindTexture(unit, texture));
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        self.calls
            .push(Call::SetUniform(UNIFORM_NAMES[location.0], value));
    }

    fn enable_stream(&mut self, stream: VertexStream) {
        self.calls.push(Call::EnableStream(stream));
    }

    fn disable_stream(&mut self, stream: VertexStream) {
        self.calls.push(Call::DisableStream(stream));
    }

    fn draw_indexed(&mut self, geometry: BufferId, first_index: usize, index_count: usize) {
        self.calls.push(Call::Draw(geometry, first_index, index_count));
    }
}
