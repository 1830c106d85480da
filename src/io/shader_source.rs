use crate::error::ShaderError;
use std::fmt;
use std::fs;
use std::path::PathBuf;

/// The two shader programs the programmable pipeline is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderVariant {
    BlinnPhong,
    NormalMapping,
}

impl ShaderVariant {
    pub const ALL: [ShaderVariant; 2] = [ShaderVariant::BlinnPhong, ShaderVariant::NormalMapping];

    pub fn name(self) -> &'static str {
        match self {
            ShaderVariant::BlinnPhong => "blinn_phong",
            ShaderVariant::NormalMapping => "normal_mapping",
        }
    }

    pub fn file_name(self) -> String {
        format!("{}.shader", self.name())
    }
}

impl fmt::Display for ShaderVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where `[vert]`/`[frag]` shader blobs come from.
pub trait ShaderSource {
    fn read(&self, variant: ShaderVariant) -> Result<String, ShaderError>;
}

/// Shader blobs compiled into the binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddedShaders;

impl ShaderSource for EmbeddedShaders {
    fn read(&self, variant: ShaderVariant) -> Result<String, ShaderError> {
        let text = match variant {
            ShaderVariant::BlinnPhong => include_str!("../../assets/shaders/blinn_phong.shader"),
            ShaderVariant::NormalMapping => {
                include_str!("../../assets/shaders/normal_mapping.shader")
            }
        };
        Ok(text.to_string())
    }
}

/// Reads `<dir>/<variant>.shader` at startup, so shaders can be edited without a rebuild.
#[derive(Debug, Clone)]
pub struct ShaderDirectory {
    dir: PathBuf,
}

impl ShaderDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ShaderSource for ShaderDirectory {
    fn read(&self, variant: ShaderVariant) -> Result<String, ShaderError> {
        let path = self.dir.join(variant.file_name());
        fs::read_to_string(&path).map_err(|e| ShaderError::Source {
            variant,
            reason: format!("{}: {e}", path.display()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn embedded_blobs_carry_both_stages() {
        for variant in ShaderVariant::ALL {
            let blob = EmbeddedShaders.read(variant).expect("embedded shader");
            assert!(blob.contains("[vert]"), "{variant} lacks a vertex stage");
            assert!(blob.contains("[frag]"), "{variant} lacks a fragment stage");
        }
    }

    #[test]
    fn directory_reads_by_variant_name() {
        let dir = TempDir::new().expect("temp dir");
        std::fs::write(dir.path().join("normal_mapping.shader"), "[frag]x").expect("write");
        let source = ShaderDirectory::new(dir.path());

        assert_eq!(source.read(ShaderVariant::NormalMapping).expect("read"), "[frag]x");
        assert!(matches!(
            source.read(ShaderVariant::BlinnPhong),
            Err(ShaderError::Source { variant: ShaderVariant::BlinnPhong, .. })
        ));
    }
}
