//! Shader program lifecycle: split a `[vert]`/`[frag]` blob, compile, link, release.

use log::{debug, info};

use crate::error::{InitError, ShaderError};
use crate::gpu::{GraphicsDevice, ProgramId, ShaderStage, StageId, UniformLocation};
use crate::io::shader_source::{ShaderSource, ShaderVariant};

const VERTEX_TAG: &str = "[vert]";
const FRAGMENT_TAG: &str = "[frag]";

/// Stage bodies found in a shader blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageSources<'a> {
    pub vertex: Option<&'a str>,
    pub fragment: Option<&'a str>,
}

/// Splits a blob on its `[vert]` and `[frag]` tags.
///
/// The vertex body ends at `[frag]` when that tag follows it, else at the
/// end of the blob. The fragment body always runs to the end of the blob.
pub fn split_stages(blob: &str) -> StageSources<'_> {
    let vert = blob.find(VERTEX_TAG);
    let frag = blob.find(FRAGMENT_TAG);

    let vertex = vert.map(|start| {
        let body = start + VERTEX_TAG.len();
        match frag {
            Some(end) if end >= body => &blob[body..end],
            _ => &blob[body..],
        }
    });
    let fragment = frag.map(|start| &blob[start + FRAGMENT_TAG.len()..]);

    StageSources { vertex, fragment }
}

/// A linked program and the uniform locations the dispatcher sets per mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderProgram {
    pub id: ProgramId,
    pub color_map: Option<UniformLocation>,
    pub normal_map: Option<UniformLocation>,
    pub material_alpha: Option<UniformLocation>,
}

/// Compiles every stage in `blob` and links them into one program.
///
/// Stage objects never outlive this call: they are released after linking,
/// and on any failure everything created so far is released.
pub fn compile_variant<D: GraphicsDevice + ?Sized>(
    device: &mut D,
    blob: &str,
) -> Result<ShaderProgram, ShaderError> {
    let sources = split_stages(blob);
    let stages: Vec<(ShaderStage, &str)> = [
        (ShaderStage::Vertex, sources.vertex),
        (ShaderStage::Fragment, sources.fragment),
    ]
    .into_iter()
    .filter_map(|(stage, body)| body.map(|b| (stage, b)))
    .collect();

    if stages.is_empty() {
        return Err(ShaderError::Malformed);
    }

    let mut compiled: Vec<StageId> = Vec::with_capacity(stages.len());
    for (stage, body) in stages {
        match device.compile_stage(stage, body) {
            Ok(id) => compiled.push(id),
            Err(log) => {
                release_stages(device, &compiled);
                return Err(ShaderError::Compile { stage, log });
            }
        }
    }

    let linked = device.link_program(&compiled);
    release_stages(device, &compiled);
    let id = linked.map_err(|log| ShaderError::Link { log })?;

    Ok(ShaderProgram {
        id,
        color_map: device.uniform_location(id, "colorMap"),
        normal_map: device.uniform_location(id, "normalMap"),
        material_alpha: device.uniform_location(id, "materialAlpha"),
    })
}

fn release_stages<D: GraphicsDevice + ?Sized>(device: &mut D, stages: &[StageId]) {
    for &stage in stages {
        device.delete_stage(stage);
    }
}

/// The two programs of the programmable pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderPrograms {
    pub blinn_phong: ShaderProgram,
    pub normal_mapping: ShaderProgram,
}

impl ShaderPrograms {
    /// Builds both variants. If the second fails, the first is released before returning.
    pub fn load<D: GraphicsDevice + ?Sized>(
        device: &mut D,
        source: &dyn ShaderSource,
    ) -> Result<Self, InitError> {
        let blinn_phong = Self::build(device, source, ShaderVariant::BlinnPhong)?;
        let normal_mapping = match Self::build(device, source, ShaderVariant::NormalMapping) {
            Ok(program) => program,
            Err(e) => {
                device.delete_program(blinn_phong.id);
                return Err(e);
            }
        };

        info!("Shader programs ready");
        Ok(Self {
            blinn_phong,
            normal_mapping,
        })
    }

    fn build<D: GraphicsDevice + ?Sized>(
        device: &mut D,
        source: &dyn ShaderSource,
        variant: ShaderVariant,
    ) -> Result<ShaderProgram, InitError> {
        let blob = source
            .read(variant)
            .map_err(|source| InitError::Shader { variant, source })?;
        let program = compile_variant(device, &blob)
            .map_err(|source| InitError::Shader { variant, source })?;
        debug!("Linked {variant} program {:?}", program.id);
        Ok(program)
    }

    pub fn release<D: GraphicsDevice + ?Sized>(self, device: &mut D) {
        device.delete_program(self.blinn_phong.id);
        device.delete_program(self.normal_mapping.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::recording::{Call, RecordingDevice};
    use crate::io::shader_source::EmbeddedShaders;
    use crate::gpu::{SoftwareDevice, DeviceSettings};

    #[test]
    fn splits_both_stages() {
        let s = split_stages("[vert]AAA[frag]BBB");
        assert_eq!(s.vertex, Some("AAA"));
        assert_eq!(s.fragment, Some("BBB"));
    }

    #[test]
    fn splits_vertex_only() {
        let s = split_stages("[vert]AAA");
        assert_eq!(s.vertex, Some("AAA"));
        assert_eq!(s.fragment, None);
    }

    #[test]
    fn fragment_before_vertex_leaves_vertex_running_to_the_end() {
        let s = split_stages("[frag]BBB[vert]AAA");
        assert_eq!(s.vertex, Some("AAA"));
        assert_eq!(s.fragment, Some("BBB[vert]AAA"));
    }

    #[test]
    fn blob_without_tags_is_malformed() {
        let mut device = RecordingDevice::new(true);
        assert_eq!(split_stages("kernel = \"surface\""), StageSources { vertex: None, fragment: None });
        assert!(matches!(
            compile_variant(&mut device, "kernel = \"surface\""),
            Err(ShaderError::Malformed)
        ));
        assert!(device.calls.is_empty());
    }

    #[test]
    fn success_keeps_only_the_program() {
        let mut device = RecordingDevice::new(true);
        let program = compile_variant(&mut device, "[vert]v[frag]f").expect("compile");

        assert!(device.stages.is_empty());
        assert_eq!(device.programs.len(), 1);
        assert!(program.color_map.is_some());
        assert!(program.material_alpha.is_some());
    }

    #[test]
    fn fragment_compile_failure_releases_the_vertex_stage() {
        let mut device = RecordingDevice::new(true);
        device.compile_error = Some((ShaderStage::Fragment, "ERROR: 0:3: bad".into()));

        match compile_variant(&mut device, "[vert]v[frag]f") {
            Err(ShaderError::Compile { stage, log }) => {
                assert_eq!(stage, ShaderStage::Fragment);
                assert_eq!(log, "ERROR: 0:3: bad");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(device.live_resources(), 0);
    }

    #[test]
    fn link_failure_releases_every_stage() {
        let mut device = RecordingDevice::new(true);
        device.link_error = Some("varying mismatch".into());

        assert!(matches!(
            compile_variant(&mut device, "[vert]v[frag]f"),
            Err(ShaderError::Link { log }) if log == "varying mismatch"
        ));
        assert_eq!(device.live_resources(), 0);
        assert_eq!(
            device.calls.iter().filter(|c| matches!(c, Call::DeleteStage(_))).count(),
            2
        );
    }

    #[test]
    fn second_variant_failure_releases_the_first_program() {
        struct HalfBroken;
        impl ShaderSource for HalfBroken {
            fn read(&self, variant: ShaderVariant) -> Result<String, ShaderError> {
                match variant {
                    ShaderVariant::BlinnPhong => Ok("[vert]v[frag]f".into()),
                    ShaderVariant::NormalMapping => Ok("no tags here".into()),
                }
            }
        }

        let mut device = RecordingDevice::new(true);
        let err = ShaderPrograms::load(&mut device, &HalfBroken).expect_err("must fail");
        assert!(matches!(
            err,
            InitError::Shader { variant: ShaderVariant::NormalMapping, source: ShaderError::Malformed }
        ));
        assert_eq!(device.live_resources(), 0);
    }

    #[test]
    fn embedded_shaders_build_on_the_software_device() {
        let mut device = SoftwareDevice::new(DeviceSettings::default()).expect("device");
        let programs = ShaderPrograms::load(&mut device, &EmbeddedShaders).expect("load");

        assert!(programs.normal_mapping.normal_map.is_some());
        assert!(programs.blinn_phong.normal_map.is_none());
        assert_eq!(device.resource_counts().stages, 0);

        programs.release(&mut device);
        assert_eq!(device.resource_counts().programs, 0);
    }

    #[test]
    fn software_compile_errors_carry_the_driver_log() {
        let mut device = SoftwareDevice::new(DeviceSettings::default()).expect("device");
        let result = compile_variant(&mut device, "[vert]\nkernel = \"surface\"\n[frag]\nkernel = \"phong\"\n");
        assert!(matches!(
            result,
            Err(ShaderError::Compile { stage: ShaderStage::Fragment, ref log }) if log.contains("phong")
        ));
        assert_eq!(device.resource_counts().stages, 0);
    }
}
