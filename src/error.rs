use std::path::PathBuf;

use crate::gpu::ShaderStage;
use crate::io::shader_source::ShaderVariant;

/// Failures reported by a [`crate::gpu::GraphicsDevice`].
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("invalid texture dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("texture of {width}x{height} exceeds the device limit of {limit}")]
    TextureTooLarge { width: u32, height: u32, limit: u32 },
    #[error("pixel data has {actual} bytes, expected {expected}")]
    PixelDataSize { expected: usize, actual: usize },
    #[error("geometry index {index} is out of range for {vertex_count} vertices")]
    IndexOutOfRange { index: u32, vertex_count: usize },
    #[error("unsupported sample count {0}")]
    InvalidSampleCount(usize),
}

/// Fatal startup failures. The host reports these once and never enters its run loop.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("failed to create the graphics device: {0}")]
    Device(#[source] DeviceError),
    #[error("failed to build the {variant} shader program: {source}")]
    Shader {
        variant: ShaderVariant,
        #[source]
        source: ShaderError,
    },
    #[error("failed to create the fallback texture: {0}")]
    FallbackTexture(#[source] DeviceError),
}

#[derive(Debug, thiserror::Error)]
pub enum ShaderError {
    #[error("shader source contains neither a [vert] nor a [frag] section")]
    Malformed,
    #[error("{stage} shader failed to compile:\n{log}")]
    Compile { stage: ShaderStage, log: String },
    #[error("shader program failed to link:\n{log}")]
    Link { log: String },
    #[error("could not read shader source '{variant}': {reason}")]
    Source {
        variant: ShaderVariant,
        reason: String,
    },
}

/// Recoverable model load failures. The previously loaded model is left untouched.
#[derive(Debug, thiserror::Error)]
pub enum ModelLoadError {
    #[error("File is not a valid .OBJ file: {0:?}")]
    UnsupportedFormat(PathBuf),
    #[error("model file not found: {0:?}")]
    NotFound(PathBuf),
    #[error("failed to import {path:?}: {reason}")]
    Import { path: PathBuf, reason: String },
    #[error("{0:?} contains no triangles")]
    Empty(PathBuf),
    #[error("failed to upload model geometry: {0}")]
    Device(#[from] DeviceError),
}

/// Texture failures never reach the user; the fallback texture is used instead.
#[derive(Debug, thiserror::Error)]
pub enum TextureLoadError {
    #[error("failed to decode {path:?}: {reason}")]
    Decode { path: PathBuf, reason: String },
    #[error("failed to create texture: {0}")]
    Device(#[from] DeviceError),
}
