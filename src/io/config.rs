use crate::app::ViewerSettings;
use crate::gpu::DeviceSettings;
use crate::scene::camera::CameraSettings;
use log::{info, warn};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "obj_viewer.toml";
/// Environment variable overriding [`DEFAULT_CONFIG_FILE`].
pub const CONFIG_ENV: &str = "OBJ_VIEWER_CONFIG";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub shaders: ShaderConfig,
}

#[derive(Debug, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_width")]
    pub width: f32,
    #[serde(default = "default_height")]
    pub height: f32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
        }
    }
}

fn default_width() -> f32 {
    800.0
}
fn default_height() -> f32 {
    600.0
}

#[derive(Debug, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "default_fov")]
    pub fov_y: f32,
    #[serde(default = "default_near")]
    pub z_near: f32,
    #[serde(default = "default_far")]
    pub z_far: f32,
    #[serde(default = "default_orbit_speed")]
    pub orbit_speed: f32,
    #[serde(default = "default_dolly_speed")]
    pub dolly_speed: f32,
    #[serde(default = "default_track_speed")]
    pub track_speed: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_y: default_fov(),
            z_near: default_near(),
            z_far: default_far(),
            orbit_speed: default_orbit_speed(),
            dolly_speed: default_dolly_speed(),
            track_speed: default_track_speed(),
        }
    }
}

fn default_fov() -> f32 {
    CameraSettings::default().fov_y
}
fn default_near() -> f32 {
    CameraSettings::default().z_near
}
fn default_far() -> f32 {
    CameraSettings::default().z_far
}
fn default_orbit_speed() -> f32 {
    CameraSettings::default().orbit_speed
}
fn default_dolly_speed() -> f32 {
    CameraSettings::default().dolly_speed
}
fn default_track_speed() -> f32 {
    CameraSettings::default().track_speed
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineChoice {
    /// Programmable when the device supports it.
    #[default]
    Auto,
    Fixed,
}

#[derive(Debug, Deserialize)]
pub struct RenderConfig {
    /// Supersampling factor per axis, 1 to 4.
    #[serde(default = "default_samples")]
    pub samples: usize,
    /// Render-target size relative to the viewport.
    #[serde(default = "default_resolution_scale")]
    pub resolution_scale: f32,
    #[serde(default)]
    pub pipeline: PipelineChoice,
    #[serde(default = "default_true")]
    pub textures: bool,
    #[serde(default)]
    pub wireframe: bool,
    #[serde(default = "default_true")]
    pub cull_back_faces: bool,
    #[serde(default = "default_clear_color")]
    pub clear_color: [f32; 4],
    #[serde(default = "default_true")]
    pub anisotropy: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            samples: default_samples(),
            resolution_scale: default_resolution_scale(),
            pipeline: PipelineChoice::Auto,
            textures: true,
            wireframe: false,
            cull_back_faces: true,
            clear_color: default_clear_color(),
            anisotropy: true,
        }
    }
}

fn default_samples() -> usize {
    1
}
fn default_resolution_scale() -> f32 {
    1.0
}
fn default_true() -> bool {
    true
}
fn default_clear_color() -> [f32; 4] {
    [0.3, 0.5, 0.9, 0.0]
}

#[derive(Debug, Default, Deserialize)]
pub struct ShaderConfig {
    /// Read `<directory>/<variant>.shader` instead of the embedded shaders.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let content =
            fs::read_to_string(path).map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Loads the config from `$OBJ_VIEWER_CONFIG` or `./obj_viewer.toml`.
    /// A missing file means defaults; an invalid one is logged and ignored.
    pub fn discover() -> Self {
        let (path, explicit) = match std::env::var_os(CONFIG_ENV) {
            Some(path) => (PathBuf::from(path), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        if !explicit && !path.exists() {
            return Self::default();
        }

        match Self::load(&path) {
            Ok(config) => {
                info!("Loaded config from {path:?}");
                config
            }
            Err(e) => {
                warn!("Ignoring config {path:?}: {e}");
                Self::default()
            }
        }
    }

    pub fn camera_settings(&self) -> CameraSettings {
        let c = &self.camera;
        CameraSettings {
            fov_y: c.fov_y,
            z_near: c.z_near,
            z_far: c.z_far,
            orbit_speed: c.orbit_speed,
            dolly_speed: c.dolly_speed,
            track_speed: c.track_speed,
        }
    }

    pub fn device_settings(&self) -> DeviceSettings {
        let defaults = DeviceSettings::default();
        DeviceSettings {
            samples: self.render.samples,
            max_anisotropy: defaults.max_anisotropy.filter(|_| self.render.anisotropy),
            ..defaults
        }
    }

    pub fn viewer_settings(&self) -> ViewerSettings {
        ViewerSettings {
            camera: self.camera_settings(),
            clear_color: self.render.clear_color,
            textures: self.render.textures,
            wireframe: self.render.wireframe,
            cull_back_faces: self.render.cull_back_faces,
            force_fixed_function: self.render.pipeline == PipelineChoice::Fixed,
        }
    }
}
