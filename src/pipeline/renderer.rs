use crate::gpu::{BufferId, GraphicsDevice, TextureId, UniformLocation, UniformValue, VertexStream, Viewport};
use crate::pipeline::programs::{ShaderProgram, ShaderPrograms};
use crate::pipeline::textures::TextureCache;
use crate::scene::camera::{CameraSettings, CameraState};
use crate::scene::material::Material;
use crate::scene::mesh::Mesh;
use crate::scene::model::Model;

/// How meshes are shaded. Chosen once at startup from the device capabilities.
#[derive(Debug)]
pub enum Pipeline {
    FixedFunction,
    Programmable(ShaderPrograms),
}

impl Pipeline {
    pub fn name(&self) -> &'static str {
        match self {
            Pipeline::FixedFunction => "fixed-function",
            Pipeline::Programmable(_) => "programmable",
        }
    }

    /// Deletes the programs, if any.
    pub fn release<D: GraphicsDevice + ?Sized>(self, device: &mut D) {
        if let Pipeline::Programmable(programs) = self {
            programs.release(device);
        }
    }
}

/// User-toggled view state applied every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderFlags {
    pub textures: bool,
    pub wireframe: bool,
    pub cull_back_faces: bool,
}

impl Default for RenderFlags {
    fn default() -> Self {
        Self {
            textures: true,
            wireframe: false,
            cull_back_faces: true,
        }
    }
}

/// The current model together with its device resources.
#[derive(Clone, Copy)]
pub struct LoadedScene<'a> {
    pub model: &'a Model,
    pub geometry: BufferId,
    pub textures: &'a TextureCache,
}

/// Per-mesh shading decision and the textures it binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshShading {
    /// Fixed-function lighting; `None` disables texturing for the mesh.
    Fixed { color_map: Option<TextureId> },
    BlinnPhong { color_map: TextureId },
    /// `normal_map` is `None` when the bump map did not resolve; the shader then keeps the
    /// interpolated normal.
    NormalMapping {
        color_map: TextureId,
        normal_map: Option<TextureId>,
    },
}

impl MeshShading {
    pub fn select(
        pipeline: &Pipeline,
        material: &Material,
        textures: &TextureCache,
        textures_enabled: bool,
        fallback: TextureId,
    ) -> Self {
        let color_map = enabled_color_map(material, textures, textures_enabled);

        match pipeline {
            Pipeline::FixedFunction => MeshShading::Fixed { color_map },
            Pipeline::Programmable(_) if material.has_bump_map() => MeshShading::NormalMapping {
                color_map: color_map.unwrap_or(fallback),
                normal_map: textures.get(&material.bump_map),
            },
            Pipeline::Programmable(_) => MeshShading::BlinnPhong {
                color_map: color_map.unwrap_or(fallback),
            },
        }
    }
}

fn enabled_color_map(
    material: &Material,
    textures: &TextureCache,
    textures_enabled: bool,
) -> Option<TextureId> {
    if textures_enabled && material.has_color_map() {
        textures.get(&material.color_map)
    } else {
        None
    }
}

/// Issues the draw calls for one frame.
#[derive(Debug, Clone, Copy)]
pub struct RenderDispatcher {
    camera: CameraSettings,
    clear_color: [f32; 4],
    fallback: TextureId,
}

impl RenderDispatcher {
    pub fn new(camera: CameraSettings, clear_color: [f32; 4], fallback: TextureId) -> Self {
        Self {
            camera,
            clear_color,
            fallback,
        }
    }

    pub fn draw_frame<D: GraphicsDevice + ?Sized>(
        &self,
        device: &mut D,
        pipeline: &Pipeline,
        viewport: Viewport,
        camera: &CameraState,
        flags: RenderFlags,
        scene: Option<LoadedScene<'_>>,
    ) {
        device.begin_frame(viewport, self.clear_color);
        device.set_culling(flags.cull_back_faces);
        device.set_wireframe(flags.wireframe);
        device.set_projection(self.camera.projection(viewport.aspect_ratio()));
        device.set_view(camera.view_matrix());

        let Some(scene) = scene else {
            return;
        };

        match pipeline {
            Pipeline::FixedFunction => self.draw_fixed(device, flags, scene),
            Pipeline::Programmable(programs) => {
                self.draw_programmable(device, pipeline, programs, flags, scene)
            }
        }
    }

    fn draw_fixed<D: GraphicsDevice + ?Sized>(
        &self,
        device: &mut D,
        flags: RenderFlags,
        scene: LoadedScene<'_>,
    ) {
        for mesh in scene.model.meshes() {
            let material = scene.model.material(mesh);
            device.set_material(&material.params());
            device.bind_texture(0, enabled_color_map(material, scene.textures, flags.textures));

            draw_mesh(device, scene, mesh, false);
        }
    }

    fn draw_programmable<D: GraphicsDevice + ?Sized>(
        &self,
        device: &mut D,
        pipeline: &Pipeline,
        programs: &ShaderPrograms,
        flags: RenderFlags,
        scene: LoadedScene<'_>,
    ) {
        device.set_blending(true);

        for mesh in scene.model.meshes() {
            let material = scene.model.material(mesh);
            device.set_material(&material.params());

            let shading =
                MeshShading::select(pipeline, material, scene.textures, flags.textures, self.fallback);
            let with_tangents = match shading {
                MeshShading::NormalMapping {
                    color_map,
                    normal_map,
                } => {
                    let program = &programs.normal_mapping;
                    device.use_program(Some(program.id));
                    device.bind_texture(1, normal_map);
                    device.bind_texture(0, Some(color_map));
                    set_uniform(device, program.color_map, UniformValue::Int(0));
                    set_uniform(device, program.normal_map, UniformValue::Int(1));
                    set_alpha(device, program, material);
                    true
                }
                MeshShading::BlinnPhong { color_map } => {
                    let program = &programs.blinn_phong;
                    device.use_program(Some(program.id));
                    device.bind_texture(0, Some(color_map));
                    set_uniform(device, program.color_map, UniformValue::Int(0));
                    set_alpha(device, program, material);
                    false
                }
                MeshShading::Fixed { color_map } => {
                    device.use_program(None);
                    device.bind_texture(0, color_map);
                    false
                }
            };

            draw_mesh(device, scene, mesh, with_tangents);
        }

        device.use_program(None);
        device.bind_texture(1, None);
        device.bind_texture(0, None);
        device.set_blending(false);
    }
}

fn set_uniform<D: GraphicsDevice + ?Sized>(device: &mut D, location: Option<UniformLocation>, value: UniformValue) {
    if let Some(location) = location {
        device.set_uniform(location, value);
    }
}

fn set_alpha<D: GraphicsDevice + ?Sized>(device: &mut D, program: &ShaderProgram, material: &Material) {
    set_uniform(device, program.material_alpha, UniformValue::Float(material.alpha));
}

/// Enables the streams the model provides, draws the mesh's index range, disables them again.
fn draw_mesh<D: GraphicsDevice + ?Sized>(device: &mut D, scene: LoadedScene<'_>, mesh: &Mesh, with_tangents: bool) {
    let provided = scene.model.streams();
    let streams: Vec<VertexStream> = [
        (VertexStream::Position, provided.positions),
        (VertexStream::TexCoord, provided.texcoords),
        (VertexStream::Normal, provided.normals),
        (VertexStream::Tangent, provided.tangents && with_tangents),
    ]
    .into_iter()
    .filter_map(|(stream, enabled)| enabled.then_some(stream))
    .collect();

    for &stream in &streams {
        device.enable_stream(stream);
    }
    device.draw_indexed(scene.geometry, mesh.start_index, mesh.index_count());
    for &stream in streams.iter().rev() {
        device.disable_stream(stream);
    }
}
