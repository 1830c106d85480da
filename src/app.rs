//! The viewer context: device, pipeline, camera and the current model.

use std::path::Path;

use log::{debug, info};
use nalgebra::Point2;

use crate::error::{InitError, ModelLoadError};
use crate::gpu::{BufferId, GraphicsDevice, TextureId, Viewport};
use crate::io::image::ImageDecoder;
use crate::io::obj_loader::ModelImporter;
use crate::io::shader_source::ShaderSource;
use crate::pipeline::programs::ShaderPrograms;
use crate::pipeline::renderer::{LoadedScene, Pipeline, RenderDispatcher, RenderFlags};
use crate::pipeline::textures::{TextureCache, TextureResolver, create_fallback_texture};
use crate::scene::camera::{CameraSettings, CameraState};
use crate::scene::model::Model;
use crate::ui::input::{CameraController, MouseButton};

pub const APP_TITLE: &str = "OBJ Viewer";

/// Startup options of a [`Viewer`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewerSettings {
    pub camera: CameraSettings,
    pub clear_color: [f32; 4],
    pub textures: bool,
    pub wireframe: bool,
    pub cull_back_faces: bool,
    /// Use the fixed-function pipeline even when programs are supported.
    pub force_fixed_function: bool,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            camera: CameraSettings::default(),
            clear_color: [0.3, 0.5, 0.9, 0.0],
            textures: true,
            wireframe: false,
            cull_back_faces: true,
            force_fixed_function: false,
        }
    }
}

/// A model together with the device resources created for it.
struct LoadedModel {
    model: Model,
    geometry: BufferId,
    textures: TextureCache,
}

/// Everything the viewer owns, driven by the host shell.
///
/// Device resources are released in [`Viewer::shutdown`], which also runs on drop.
pub struct Viewer<D: GraphicsDevice> {
    device: D,
    settings: ViewerSettings,
    importer: Box<dyn ModelImporter>,
    resolver: TextureResolver,
    pipeline: Pipeline,
    dispatcher: RenderDispatcher,
    fallback: TextureId,
    camera: CameraState,
    controller: CameraController,
    flags: RenderFlags,
    current: Option<LoadedModel>,
    shut_down: bool,
}

impl<D: GraphicsDevice> Viewer<D> {
    /// Creates the fallback texture and, when the device supports it, both shader programs.
    pub fn new(
        mut device: D,
        settings: ViewerSettings,
        shaders: &dyn ShaderSource,
        importer: Box<dyn ModelImporter>,
        decoder: Box<dyn ImageDecoder>,
    ) -> Result<Self, InitError> {
        let capabilities = device.capabilities();
        let fallback = create_fallback_texture(&mut device).map_err(InitError::FallbackTexture)?;

        let pipeline = if capabilities.programmable_pipeline && !settings.force_fixed_function {
            match ShaderPrograms::load(&mut device, shaders) {
                Ok(programs) => Pipeline::Programmable(programs),
                Err(e) => {
                    device.delete_texture(fallback);
                    return Err(e);
                }
            }
        } else {
            Pipeline::FixedFunction
        };
        info!(
            "Using the {} pipeline (anisotropy: {:?})",
            pipeline.name(),
            capabilities.max_anisotropy
        );

        Ok(Self {
            device,
            settings,
            importer,
            resolver: TextureResolver::new(decoder, capabilities.max_anisotropy),
            pipeline,
            dispatcher: RenderDispatcher::new(settings.camera, settings.clear_color, fallback),
            fallback,
            camera: CameraState::default(),
            controller: CameraController::new(settings.camera),
            flags: RenderFlags {
                textures: settings.textures,
                wireframe: settings.wireframe,
                cull_back_faces: settings.cull_back_faces,
            },
            current: None,
            shut_down: false,
        })
    }

    /// Imports `path` and makes it the current model.
    ///
    /// The new model is fully uploaded before the old one is released, so on
    /// error the previous model is still loaded and untouched.
    pub fn load_model(&mut self, path: &Path) -> Result<(), ModelLoadError> {
        let mut model = self.importer.import(path)?;
        model.normalize();

        let geometry = self.device.create_geometry(model.vertices(), model.indices())?;

        let mut textures = TextureCache::new();
        for material in model.materials() {
            let material_dir = material.texture_dir.as_deref().unwrap_or(model.base_dir());
            let maps = [
                material.has_color_map().then_some(&material.color_map),
                material.has_bump_map().then_some(&material.bump_map),
            ];
            for texture_path in maps.into_iter().flatten() {
                self.resolver.resolve(
                    &mut self.device,
                    &mut textures,
                    texture_path,
                    material_dir,
                    model.base_dir(),
                );
            }
        }

        self.unload_model();
        info!(
            "Loaded {:?}: {} meshes, {} triangles, {} textures",
            model.file_name(),
            model.meshes().len(),
            model.triangle_count(),
            textures.len()
        );
        self.current = Some(LoadedModel {
            model,
            geometry,
            textures,
        });
        self.reset_view();
        Ok(())
    }

    /// Releases the current model's geometry and textures. No-op without a model.
    pub fn unload_model(&mut self) {
        if let Some(mut loaded) = self.current.take() {
            loaded.textures.release_all(&mut self.device);
            self.device.delete_geometry(loaded.geometry);
            debug!("Unloaded {:?}", loaded.model.file_name());
        }
    }

    pub fn model(&self) -> Option<&Model> {
        self.current.as_ref().map(|loaded| &loaded.model)
    }

    pub fn textures(&self) -> Option<&TextureCache> {
        self.current.as_ref().map(|loaded| &loaded.textures)
    }

    /// Frames the current model, or returns to the default view without one.
    pub fn reset_view(&mut self) {
        match self.model() {
            Some(model) => {
                let bounds = model.bounds();
                self.camera
                    .reset(bounds.center, bounds.radius, self.settings.camera.z_near);
            }
            None => self.camera = CameraState::default(),
        }
    }

    pub fn camera(&self) -> &CameraState {
        &self.camera
    }

    pub fn controller(&self) -> &CameraController {
        &self.controller
    }

    pub fn flags(&self) -> RenderFlags {
        self.flags
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn fallback_texture(&self) -> TextureId {
        self.fallback
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn toggle_textures(&mut self) -> bool {
        self.flags.textures = !self.flags.textures;
        self.flags.textures
    }

    pub fn toggle_wireframe(&mut self) -> bool {
        self.flags.wireframe = !self.flags.wireframe;
        self.flags.wireframe
    }

    pub fn toggle_culling(&mut self) -> bool {
        self.flags.cull_back_faces = !self.flags.cull_back_faces;
        self.flags.cull_back_faces
    }

    pub fn pointer_pressed(&mut self, button: MouseButton, pos: Point2<f32>) {
        self.controller.press(button, pos);
    }

    pub fn pointer_released(&mut self, button: MouseButton) {
        self.controller.release(button);
    }

    pub fn pointer_moved(&mut self, pos: Point2<f32>) {
        let radius = self.model().map_or(0.0, |m| m.bounds().radius);
        self.controller.motion(pos, &mut self.camera, radius);
    }

    pub fn cancel_drag(&mut self) {
        self.controller.cancel();
    }

    /// Draws one frame into the device's render target.
    pub fn render(&mut self, viewport: Viewport) {
        let scene = self.current.as_ref().map(|loaded| LoadedScene {
            model: &loaded.model,
            geometry: loaded.geometry,
            textures: &loaded.textures,
        });
        self.dispatcher.draw_frame(
            &mut self.device,
            &self.pipeline,
            viewport,
            &self.camera,
            self.flags,
            scene,
        );
    }

    /// Window caption for the current model and frame rate.
    pub fn title(&self, fps: Option<u32>) -> String {
        let mut title = match self.model() {
            Some(model) => format!("{APP_TITLE} - {}", model.file_name()),
            None => APP_TITLE.to_string(),
        };
        if let Some(fps) = fps {
            title.push_str(&format!(" [{fps} FPS]"));
        }
        title
    }

    /// Releases the model, the fallback texture and the programs. Safe to call twice.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        self.unload_model();
        self.device.delete_texture(self.fallback);
        std::mem::replace(&mut self.pipeline, Pipeline::FixedFunction).release(&mut self.device);
        info!("Viewer shut down");
    }
}

impl<D: GraphicsDevice> Drop for Viewer<D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
