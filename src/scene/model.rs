use std::path::{Path, PathBuf};

use log::debug;
use nalgebra::Point3;

use crate::core::geometry::Vertex;
use crate::scene::material::Material;
use crate::scene::mesh::Mesh;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: Point3<f32>,
    pub radius: f32,
}

impl BoundingSphere {
    /// Sphere around the axis-aligned bounds of `vertices`.
    pub fn enclosing(vertices: &[Vertex]) -> Self {
        let Some(first) = vertices.first() else {
            return Self {
                center: Point3::origin(),
                radius: 0.0,
            };
        };

        let (min, max) = vertices.iter().fold(
            (first.position, first.position),
            |(min, max), v| (min.inf(&v.position), max.sup(&v.position)),
        );
        let center = nalgebra::center(&min, &max);
        let radius = vertices
            .iter()
            .map(|v| (v.position - center).norm())
            .fold(0.0, f32::max);

        Self { center, radius }
    }
}

/// Which vertex attributes the source file actually provided.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VertexStreams {
    pub positions: bool,
    pub texcoords: bool,
    pub normals: bool,
    pub tangents: bool,
}

/// An imported mesh with its materials, shared vertex/index buffers and bounds.
///
/// Geometry is immutable once imported, apart from [`Model::normalize`].
#[derive(Debug, Clone)]
pub struct Model {
    meshes: Vec<Mesh>,
    materials: Vec<Material>,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    streams: VertexStreams,
    bounds: BoundingSphere,
    source: PathBuf,
}

impl Model {
    /// An empty material list gets the default material; mesh material
    /// indices past the end are clamped to the last material.
    pub fn new(
        source: PathBuf,
        mut meshes: Vec<Mesh>,
        mut materials: Vec<Material>,
        vertices: Vec<Vertex>,
        indices: Vec<u32>,
        streams: VertexStreams,
    ) -> Self {
        if materials.is_empty() {
            materials.push(Material::default());
        }
        let last = materials.len() - 1;
        for mesh in &mut meshes {
            mesh.material = mesh.material.min(last);
        }

        let bounds = BoundingSphere::enclosing(&vertices);
        Self {
            meshes,
            materials,
            vertices,
            indices,
            streams,
            bounds,
            source,
        }
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    /// Material of `mesh`. Meshes from another model are clamped like in [`Model::new`].
    pub fn material(&self, mesh: &Mesh) -> &Material {
        &self.materials[mesh.material.min(self.materials.len() - 1)]
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn streams(&self) -> VertexStreams {
        self.streams
    }

    pub fn bounds(&self) -> BoundingSphere {
        self.bounds
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Path the model was imported from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Directory relative texture paths are resolved against.
    pub fn base_dir(&self) -> &Path {
        self.source.parent().unwrap_or_else(|| Path::new(""))
    }

    pub fn file_name(&self) -> String {
        self.source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Re-centers the geometry on the origin and scales it into the unit sphere.
    pub fn normalize(&mut self) {
        let BoundingSphere { center, radius } = self.bounds;
        let scale = if radius > 1e-6 { 1.0 / radius } else { 1.0 };

        for vertex in &mut self.vertices {
            vertex.position = Point3::from((vertex.position - center) * scale);
        }
        self.bounds = BoundingSphere {
            center: Point3::origin(),
            radius: radius * scale,
        };
        debug!("Normalized model: center {center:?}, scale {scale:.4}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Vector2, Vector3};

    fn model() -> Model {
        let v = |x: f32, y: f32, z: f32| Vertex::new(Point3::new(x, y, z), Vector3::z(), Vector2::zeros());
        Model::new(
            PathBuf::from("assets/models/box.obj"),
            vec![Mesh::new(0, 1, 0)],
            vec![Material::default()],
            vec![v(2.0, 2.0, 2.0), v(6.0, 2.0, 2.0), v(4.0, 5.0, 2.0)],
            vec![0, 1, 2],
            VertexStreams {
                positions: true,
                normals: true,
                ..VertexStreams::default()
            },
        )
    }

    #[test]
    fn bounds_enclose_every_vertex() {
        let m = model();
        let b = m.bounds();
        assert_eq!(b.center, Point3::new(4.0, 3.5, 2.0));
        for v in m.vertices() {
            assert!((v.position - b.center).norm() <= b.radius + 1e-5);
        }
    }

    #[test]
    fn normalize_fits_the_unit_sphere() {
        let mut m = model();
        m.normalize();
        assert_eq!(m.bounds().center, Point3::origin());
        assert!((m.bounds().radius - 1.0).abs() < 1e-6);
        let farthest = m.vertices().iter().map(|v| v.position.coords.norm()).fold(0.0, f32::max);
        assert!((farthest - 1.0).abs() < 1e-5);
    }

    #[test]
    fn paths_come_from_the_source_file() {
        let m = model();
        assert_eq!(m.base_dir(), Path::new("assets/models"));
        assert_eq!(m.file_name(), "box.obj");
    }

    #[test]
    fn mesh_material_indices_are_clamped() {
        let red = Material {
            name: "red".into(),
            ..Material::default()
        };
        let m = Model::new(
            PathBuf::from("m/two.obj"),
            vec![Mesh::new(0, 1, 0), Mesh::new(3, 1, 9)],
            vec![Material::default(), red],
            Vec::new(),
            Vec::new(),
            VertexStreams::default(),
        );
        assert_eq!(m.meshes()[1].material, 1);
        assert_eq!(m.material(&m.meshes()[1]).name, "red");
        assert_eq!(m.material(&Mesh::new(0, 1, 42)).name, "red");
    }

    #[test]
    fn models_without_materials_get_the_default() {
        let m = Model::new(
            PathBuf::from("m/bare.obj"),
            vec![Mesh::new(0, 1, 3)],
            Vec::new(),
            Vec::new(),
            Vec::new(),
            VertexStreams::default(),
        );
        assert_eq!(m.materials(), &[Material::default()]);
        assert_eq!(m.material(&m.meshes()[0]), &Material::default());
    }
}
