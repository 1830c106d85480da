//! Stage compiler and program linker of the software device.
//!
//! A stage body is a small TOML document naming one of the built-in shading
//! kernels and the uniforms the program exposes:
//!
//! ```toml
//! kernel = "blinn_phong"
//! uniforms = ["colorMap", "materialAlpha"]
//! ```

use serde::Deserialize;
use std::fmt;

use crate::gpu::{ShaderStage, UniformLocation, UniformValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexKernel {
    /// Eye-space position, normal and texcoord.
    Surface,
    /// `Surface` plus the eye-space tangent frame.
    TangentSurface,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKernel {
    /// Per-fragment Blinn-Phong lighting, modulated by `colorMap`.
    BlinnPhong,
    /// Blinn-Phong with the normal perturbed by `normalMap`.
    NormalMapping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kernel {
    Vertex(VertexKernel),
    Fragment(FragmentKernel),
}

impl Kernel {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "surface" => Some(Kernel::Vertex(VertexKernel::Surface)),
            "tangent_surface" => Some(Kernel::Vertex(VertexKernel::TangentSurface)),
            "blinn_phong" => Some(Kernel::Fragment(FragmentKernel::BlinnPhong)),
            "normal_mapping" => Some(Kernel::Fragment(FragmentKernel::NormalMapping)),
            _ => None,
        }
    }

    fn stage(self) -> ShaderStage {
        match self {
            Kernel::Vertex(_) => ShaderStage::Vertex,
            Kernel::Fragment(_) => ShaderStage::Fragment,
        }
    }
}

/// Values passed from vertex to fragment processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interface {
    Position,
    Normal,
    TexCoord,
    Tangent,
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Interface::Position => "position",
            Interface::Normal => "normal",
            Interface::TexCoord => "texcoord",
            Interface::Tangent => "tangent",
        };
        f.write_str(name)
    }
}

/// What fixed-function vertex processing hands to a fragment-only program.
const FIXED_VERTEX_OUTPUTS: &[Interface] = &[Interface::Position, Interface::Normal, Interface::TexCoord];

impl VertexKernel {
    fn outputs(self) -> &'static [Interface] {
        match self {
            VertexKernel::Surface => FIXED_VERTEX_OUTPUTS,
            VertexKernel::TangentSurface => &[
                Interface::Position,
                Interface::Normal,
                Interface::TexCoord,
                Interface::Tangent,
            ],
        }
    }
}

impl FragmentKernel {
    fn inputs(self) -> &'static [Interface] {
        match self {
            FragmentKernel::BlinnPhong => &[Interface::Normal, Interface::TexCoord],
            FragmentKernel::NormalMapping => {
                &[Interface::Normal, Interface::TexCoord, Interface::Tangent]
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StageDecl {
    kernel: String,
    #[serde(default)]
    uniforms: Vec<String>,
}

/// A successfully compiled stage object.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStage {
    pub stage: ShaderStage,
    pub kernel: Kernel,
    pub uniforms: Vec<String>,
}

/// Compiles one stage body, returning the compiler log on failure.
pub fn compile_stage(stage: ShaderStage, source: &str) -> Result<CompiledStage, String> {
    let decl: StageDecl = toml::from_str(source).map_err(|e| {
        let line = e
            .span()
            .map(|span| source[..span.start.min(source.len())].lines().count().max(1))
            .unwrap_or(0);
        format!("ERROR: 0:{line}: {}", e.message().trim())
    })?;

    let kernel = Kernel::parse(decl.kernel.trim())
        .ok_or_else(|| format!("ERROR: unknown kernel '{}'", decl.kernel))?;
    if kernel.stage() != stage {
        return Err(format!(
            "ERROR: '{}' is a {} kernel and cannot be used in a {stage} shader",
            decl.kernel,
            kernel.stage()
        ));
    }

    let mut uniforms: Vec<String> = Vec::with_capacity(decl.uniforms.len());
    for name in decl.uniforms {
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(format!("ERROR: '{name}' is not a valid uniform name"));
        }
        if uniforms.contains(&name) {
            return Err(format!("ERROR: uniform '{name}' redeclared"));
        }
        uniforms.push(name);
    }

    Ok(CompiledStage {
        stage,
        kernel,
        uniforms,
    })
}

/// A linked program: its kernels and uniform storage.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedProgram {
    pub vertex: Option<VertexKernel>,
    pub fragment: Option<FragmentKernel>,
    uniforms: Vec<(String, UniformValue)>,
}

impl LinkedProgram {
    /// Links compiled stages, returning the linker log on failure.
    pub fn link(stages: &[&CompiledStage]) -> Result<Self, String> {
        if stages.is_empty() {
            return Err("ERROR: no shader stages attached".to_string());
        }

        let mut vertex = None;
        let mut fragment = None;
        let mut uniforms: Vec<(String, UniformValue)> = Vec::new();

        for stage in stages {
            let duplicate = match stage.kernel {
                Kernel::Vertex(k) => vertex.replace(k).is_some(),
                Kernel::Fragment(k) => fragment.replace(k).is_some(),
            };
            if duplicate {
                return Err(format!("ERROR: more than one {} shader attached", stage.stage));
            }
            for name in &stage.uniforms {
                if !uniforms.iter().any(|(n, _)| n == name) {
                    uniforms.push((name.clone(), default_value(name)));
                }
            }
        }

        if let Some(fragment) = fragment {
            let available = vertex.map_or(FIXED_VERTEX_OUTPUTS, VertexKernel::outputs);
            let missing: Vec<String> = fragment
                .inputs()
                .iter()
                .filter(|input| !available.contains(input))
                .map(|input| format!("ERROR: fragment input '{input}' is not written by the vertex stage"))
                .collect();
            if !missing.is_empty() {
                return Err(missing.join("\n"));
            }
        }

        Ok(Self {
            vertex,
            fragment,
            uniforms,
        })
    }

    pub fn location(&self, name: &str) -> Option<UniformLocation> {
        self.uniforms
            .iter()
            .position(|(n, _)| n == name)
            .map(UniformLocation)
    }

    /// Stores a value; a location from another program or a mismatched type is rejected.
    pub fn set(&mut self, location: UniformLocation, value: UniformValue) -> bool {
        match self.uniforms.get_mut(location.0) {
            Some((_, slot)) if std::mem::discriminant(slot) == std::mem::discriminant(&value) => {
                *slot = value;
                true
            }
            _ => false,
        }
    }

    pub fn int(&self, name: &str) -> Option<i32> {
        self.uniforms.iter().find_map(|(n, v)| match v {
            UniformValue::Int(i) if n == name => Some(*i),
            _ => None,
        })
    }

    pub fn float(&self, name: &str) -> Option<f32> {
        self.uniforms.iter().find_map(|(n, v)| match v {
            UniformValue::Float(f) if n == name => Some(*f),
            _ => None,
        })
    }
}

/// Samplers are integer texture units; everything else is a float.
fn default_value(name: &str) -> UniformValue {
    if name.ends_with("Map") {
        UniformValue::Int(0)
    } else {
        UniformValue::Float(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_declared_uniforms() {
        let stage = compile_stage(
            ShaderStage::Fragment,
            "kernel = \"blinn_phong\"\nuniforms = [\"colorMap\", \"materialAlpha\"]\n",
        )
        .unwrap();
        assert_eq!(stage.kernel, Kernel::Fragment(FragmentKernel::BlinnPhong));
        assert_eq!(stage.uniforms, ["colorMap", "materialAlpha"]);
    }

    #[test]
    fn syntax_errors_report_the_line() {
        let log = compile_stage(ShaderStage::Vertex, "\nkernel = surface\n").unwrap_err();
        assert!(log.starts_with("ERROR: 0:2:"), "{log}");
    }

    #[test]
    fn rejects_unknown_and_misplaced_kernels() {
        let unknown = compile_stage(ShaderStage::Vertex, "kernel = \"toon\"").unwrap_err();
        assert!(unknown.contains("unknown kernel 'toon'"));

        let misplaced = compile_stage(ShaderStage::Vertex, "kernel = \"blinn_phong\"").unwrap_err();
        assert!(misplaced.contains("cannot be used in a vertex shader"));
    }

    #[test]
    fn rejects_redeclared_uniform() {
        let log = compile_stage(
            ShaderStage::Fragment,
            "kernel = \"blinn_phong\"\nuniforms = [\"colorMap\", \"colorMap\"]",
        )
        .unwrap_err();
        assert!(log.contains("redeclared"));
    }

    #[test]
    fn link_checks_stage_interface() {
        let vert = compile_stage(ShaderStage::Vertex, "kernel = \"surface\"").unwrap();
        let frag = compile_stage(ShaderStage::Fragment, "kernel = \"normal_mapping\"").unwrap();
        let log = LinkedProgram::link(&[&vert, &frag]).unwrap_err();
        assert!(log.contains("'tangent'"));

        let tangent_vert = compile_stage(ShaderStage::Vertex, "kernel = \"tangent_surface\"").unwrap();
        assert!(LinkedProgram::link(&[&tangent_vert, &frag]).is_ok());
    }

    #[test]
    fn single_stage_programs_link() {
        let frag = compile_stage(ShaderStage::Fragment, "kernel = \"blinn_phong\"").unwrap();
        let program = LinkedProgram::link(&[&frag]).unwrap();
        assert_eq!(program.vertex, None);
        assert_eq!(program.fragment, Some(FragmentKernel::BlinnPhong));

        let vert = compile_stage(ShaderStage::Vertex, "kernel = \"surface\"").unwrap();
        assert!(LinkedProgram::link(&[&vert, &vert]).is_err());
    }

    #[test]
    fn uniform_storage_is_typed() {
        let frag = compile_stage(
            ShaderStage::Fragment,
            "kernel = \"blinn_phong\"\nuniforms = [\"colorMap\", \"materialAlpha\"]",
        )
        .unwrap();
        let mut program = LinkedProgram::link(&[&frag]).unwrap();
        let alpha = program.location("materialAlpha").unwrap();
        assert!(program.set(alpha, UniformValue::Float(0.5)));
        assert!(!program.set(alpha, UniformValue::Int(1)));
        assert_eq!(program.float("materialAlpha"), Some(0.5));
        assert_eq!(program.int("colorMap"), Some(0));
        assert_eq!(program.location("normalMap"), None);
    }
}
