//! Material texture resolution and the per-model texture cache.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::error::{DeviceError, TextureLoadError};
use crate::gpu::{GraphicsDevice, TextureDesc, TextureFilter, TextureId, WrapMode};
use crate::io::image::ImageDecoder;

/// Device textures of the current model, keyed by the path string written in the MTL file.
#[derive(Debug, Default)]
pub struct TextureCache {
    entries: HashMap<String, TextureId>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<TextureId> {
        self.entries.get(path).copied()
    }

    /// Takes ownership of `texture` under the original MTL path string.
    pub fn insert(&mut self, path: String, texture: TextureId) {
        self.entries.insert(path, texture);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Deletes every cached texture and empties the cache.
    pub fn release_all<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D) {
        for (path, texture) in self.entries.drain() {
            debug!("Releasing texture {texture:?} ({path})");
            device.delete_texture(texture);
        }
    }
}

/// The 1x1 opaque white texture substituted for missing maps.
pub fn create_fallback_texture<D: GraphicsDevice + ?Sized>(device: &mut D) -> Result<TextureId, DeviceError> {
    let desc = TextureDesc {
        width: 1,
        height: 1,
        filter: TextureFilter::Nearest,
        wrap: WrapMode::Repeat,
        mipmaps: false,
        anisotropy: 1.0,
    };
    device.create_texture(&desc, &[255, 255, 255, 255])
}

/// Turns material texture paths into device textures.
pub struct TextureResolver {
    decoder: Box<dyn ImageDecoder>,
    anisotropy: Option<f32>,
}

impl TextureResolver {
    /// `anisotropy` is the device maximum, `None` when the capability is missing.
    pub fn new(decoder: Box<dyn ImageDecoder>, anisotropy: Option<f32>) -> Self {
        Self {
            decoder,
            anisotropy,
        }
    }

    /// Returns the texture for `texture_path`, loading it into `cache` on first use.
    ///
    /// The path is tried relative to `material_dir` (the MTL file's
    /// directory), then relative to `model_dir`, then as a bare file name
    /// inside `model_dir`. Absolute paths are used as written. `None` means
    /// the caller should use the fallback texture.
    pub fn resolve<D: GraphicsDevice + ?Sized>(
        &self,
        device: &mut D,
        cache: &mut TextureCache,
        texture_path: &str,
        material_dir: &Path,
        model_dir: &Path,
    ) -> Option<TextureId> {
        if let Some(texture) = cache.get(texture_path) {
            return Some(texture);
        }

        for candidate in candidates(texture_path, material_dir, model_dir) {
            match self.load(device, &candidate) {
                Ok(texture) => {
                    debug!("Loaded texture {candidate:?} as {texture:?}");
                    cache.insert(texture_path.to_string(), texture);
                    return Some(texture);
                }
                Err(e) => debug!("Texture candidate rejected: {e}"),
            }
        }

        warn!("Could not load texture '{texture_path}', using fallback");
        None
    }

    fn load<D: GraphicsDevice + ?Sized>(&self, device: &mut D, path: &Path) -> Result<TextureId, TextureLoadError> {
        let mut image = self.decoder.decode(path)?;
        image.flip_vertical();
        let desc = TextureDesc::material_map(image.width, image.height, self.anisotropy);
        Ok(device.create_texture(&desc, &image.pixels)?)
    }
}

/// Load order for a texture path, without repeats.
fn candidates(texture_path: &str, material_dir: &Path, model_dir: &Path) -> Vec<PathBuf> {
    let bare_name = texture_path
        .rfind(['/', '\\'])
        .map_or(texture_path, |i| &texture_path[i + 1..]);

    let mut paths = vec![material_dir.join(texture_path), model_dir.join(texture_path)];
    if !bare_name.is_empty() {
        paths.push(model_dir.join(bare_name));
    }

    let mut unique = Vec::with_capacity(paths.len());
    for path in paths {
        if !unique.contains(&path) {
            unique.push(path);
        }
    }
    unique
}
