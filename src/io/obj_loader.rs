use crate::core::geometry::Vertex;
use crate::error::ModelLoadError;
use crate::scene::material::Material;
use crate::scene::mesh::Mesh;
use crate::scene::model::{Model, VertexStreams};
use log::{debug, info, warn};
use nalgebra::{Point3, Vector2, Vector3, Vector4};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::iter;
use std::path::{Path, PathBuf};

/// Turns a model file into a [`Model`]. The viewer only talks to importers through this trait.
pub trait ModelImporter {
    fn import(&self, path: &Path) -> Result<Model, ModelLoadError>;
}

/// True when `path` carries the `.obj` extension (any case).
pub fn is_obj_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("obj"))
}

/// Wavefront OBJ/MTL importer backed by `tobj`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ObjImporter;

impl ModelImporter for ObjImporter {
    fn import(&self, path: &Path) -> Result<Model, ModelLoadError> {
        if !is_obj_path(path) {
            return Err(ModelLoadError::UnsupportedFormat(path.to_path_buf()));
        }
        if !path.is_file() {
            return Err(ModelLoadError::NotFound(path.to_path_buf()));
        }

        info!("Loading OBJ file: {path:?}");

        let load_options = tobj::LoadOptions {
            triangulate: true,
            single_index: false,
            ignore_points: true,
            ignore_lines: true,
        };

        let file = File::open(path).map_err(|e| ModelLoadError::Import {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let mut reader = BufReader::new(file);
        let model_dir = path.parent().unwrap_or_else(|| Path::new(""));

        // (directory, material count) of every MTL file, in load order.
        let mtl_files = RefCell::new(Vec::new());
        let (objects, materials_result) =
            tobj::load_obj_buf(&mut reader, &load_options, |mtl_path| {
                let full_path = model_dir.join(mtl_path);
                let loaded = tobj::load_mtl(&full_path)?;
                let mtl_dir = full_path.parent().map(Path::to_path_buf).unwrap_or_default();
                mtl_files.borrow_mut().push((mtl_dir, loaded.0.len()));
                Ok(loaded)
            })
            .map_err(|e| ModelLoadError::Import {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let mut materials: Vec<Material> = match materials_result {
            Ok(mats) => {
                debug!("Loaded {} materials from MTL", mats.len());
                let dirs = mtl_files
                    .into_inner()
                    .into_iter()
                    .flat_map(|(dir, count)| iter::repeat_n(dir, count))
                    .chain(iter::repeat(model_dir.to_path_buf()));
                mats.into_iter()
                    .zip(dirs)
                    .map(|(mat, dir)| convert_material(mat, dir))
                    .collect()
            }
            Err(e) => {
                warn!("Failed to load materials for {path:?}: {e}");
                Vec::new()
            }
        };
        if materials.is_empty() {
            materials.push(Material::default());
        }

        let mut builder = GeometryBuilder::new(materials.len());
        for object in &objects {
            builder
                .append(object)
                .map_err(|reason| ModelLoadError::Import {
                    path: path.to_path_buf(),
                    reason,
                })?;
        }

        let wants_tangents = materials.iter().any(Material::has_bump_map);
        let (meshes, mut vertices, indices, mut streams) = builder.finish();
        if meshes.is_empty() {
            return Err(ModelLoadError::Empty(path.to_path_buf()));
        }

        if wants_tangents && streams.texcoords {
            generate_tangents(&mut vertices, &indices);
            streams.tangents = true;
        }

        info!(
            "OBJ loaded: {} meshes, {} vertices, {} triangles",
            meshes.len(),
            vertices.len(),
            indices.len() / 3
        );

        Ok(Model::new(
            path.to_path_buf(),
            meshes,
            materials,
            vertices,
            indices,
            streams,
        ))
    }
}

fn convert_material(mat: tobj::Material, texture_dir: PathBuf) -> Material {
    let defaults = Material::default();
    let bump_map = mat
        .normal_texture
        .clone()
        .or_else(|| {
            ["map_bump", "map_Bump", "bump"]
                .iter()
                .find_map(|key| mat.unknown_param.get(*key))
                .and_then(|value| value.split_whitespace().last())
                .map(str::to_string)
        })
        .unwrap_or_default();

    Material {
        name: mat.name,
        ambient: mat.ambient.unwrap_or(defaults.ambient),
        diffuse: mat.diffuse.unwrap_or(defaults.diffuse),
        specular: mat.specular.unwrap_or(defaults.specular),
        // MTL exponents run 0..1000.
        shininess: mat.shininess.map_or(0.0, |ns| (ns / 1000.0).clamp(0.0, 1.0)),
        alpha: mat.dissolve.unwrap_or(1.0).clamp(0.0, 1.0),
        color_map: mat.diffuse_texture.unwrap_or_default(),
        bump_map,
        texture_dir: Some(texture_dir),
    }
}

/// Merges every OBJ object into one vertex buffer and buckets triangles by material.
struct GeometryBuilder {
    vertices: Vec<Vertex>,
    triangles: Vec<Vec<[u32; 3]>>,
    streams: VertexStreams,
}

impl GeometryBuilder {
    fn new(material_count: usize) -> Self {
        Self {
            vertices: Vec::new(),
            triangles: vec![Vec::new(); material_count],
            streams: VertexStreams {
                positions: true,
                normals: true,
                ..VertexStreams::default()
            },
        }
    }

    fn append(&mut self, object: &tobj::Model) -> Result<(), String> {
        let mesh = &object.mesh;
        if mesh.indices.is_empty() {
            debug!("Skipping object '{}' without faces", object.name);
            return Ok(());
        }

        let positions: Vec<Point3<f32>> = mesh
            .positions
            .chunks_exact(3)
            .map(|p| Point3::new(p[0], p[1], p[2]))
            .collect();

        let generated_normals = if mesh.normals.is_empty() {
            warn!("Object '{}' has no normals, generating smooth normals", object.name);
            Some(smooth_normals(&positions, &mesh.indices))
        } else {
            None
        };
        if !mesh.texcoords.is_empty() {
            self.streams.texcoords = true;
        }

        let mut remap: HashMap<(u32, Option<u32>, Option<u32>), u32> = HashMap::new();
        let mut corners = Vec::with_capacity(mesh.indices.len());

        for (i, &pos_idx) in mesh.indices.iter().enumerate() {
            let normal_idx = mesh.normal_indices.get(i).copied();
            let texcoord_idx = mesh.texcoord_indices.get(i).copied();
            let key = (pos_idx, normal_idx, texcoord_idx);

            if let Some(&index) = remap.get(&key) {
                corners.push(index);
                continue;
            }

            let position = *positions
                .get(pos_idx as usize)
                .ok_or_else(|| format!("position index {pos_idx} out of range"))?;

            let normal = match (&generated_normals, normal_idx) {
                (Some(normals), _) => normals[pos_idx as usize],
                (None, Some(idx)) => read_vec3(&mesh.normals, idx)
                    .map(|n| n.try_normalize(1e-12).unwrap_or_else(Vector3::y))
                    .ok_or_else(|| format!("normal index {idx} out of range"))?,
                (None, None) => Vector3::y(),
            };

            let texcoord = match texcoord_idx {
                Some(idx) => {
                    let start = idx as usize * 2;
                    mesh.texcoords
                        .get(start..start + 2)
                        .map(|t| Vector2::new(t[0], t[1]))
                        .ok_or_else(|| format!("texcoord index {idx} out of range"))?
                }
                None => Vector2::zeros(),
            };

            let index = self.vertices.len() as u32;
            self.vertices.push(Vertex::new(position, normal, texcoord));
            remap.insert(key, index);
            corners.push(index);
        }

        let material = mesh
            .material_id
            .filter(|&id| id < self.triangles.len())
            .unwrap_or(0);
        self.triangles[material].extend(corners.chunks_exact(3).map(|t| [t[0], t[1], t[2]]));
        Ok(())
    }

    fn finish(self) -> (Vec<Mesh>, Vec<Vertex>, Vec<u32>, VertexStreams) {
        let mut meshes = Vec::new();
        let mut indices = Vec::new();

        for (material, triangles) in self.triangles.iter().enumerate() {
            if triangles.is_empty() {
                continue;
            }
            meshes.push(Mesh::new(indices.len(), triangles.len(), material));
            indices.extend(triangles.iter().flatten());
        }

        (meshes, self.vertices, indices, self.streams)
    }
}

fn read_vec3(data: &[f32], idx: u32) -> Option<Vector3<f32>> {
    let start = idx as usize * 3;
    data.get(start..start + 3)
        .map(|n| Vector3::new(n[0], n[1], n[2]))
}

/// Area-weighted vertex normals from face connectivity.
fn smooth_normals(positions: &[Point3<f32>], indices: &[u32]) -> Vec<Vector3<f32>> {
    let mut normals = vec![Vector3::zeros(); positions.len()];

    for face in indices.chunks_exact(3) {
        let [a, b, c] = [face[0] as usize, face[1] as usize, face[2] as usize];
        if a >= positions.len() || b >= positions.len() || c >= positions.len() {
            continue;
        }
        let face_normal = (positions[b] - positions[a]).cross(&(positions[c] - positions[a]));
        normals[a] += face_normal;
        normals[b] += face_normal;
        normals[c] += face_normal;
    }

    for normal in &mut normals {
        *normal = normal.try_normalize(1e-12).unwrap_or_else(Vector3::y);
    }
    normals
}

/// Per-vertex tangents from texture-space derivatives, handedness in `w`.
fn generate_tangents(vertices: &mut [Vertex], indices: &[u32]) {
    let mut tangents = vec![Vector3::zeros(); vertices.len()];
    let mut bitangents = vec![Vector3::zeros(); vertices.len()];

    for face in indices.chunks_exact(3) {
        let [a, b, c] = [face[0] as usize, face[1] as usize, face[2] as usize];
        let (v0, v1, v2) = (&vertices[a], &vertices[b], &vertices[c]);

        let e1 = v1.position - v0.position;
        let e2 = v2.position - v0.position;
        let d1 = v1.texcoord - v0.texcoord;
        let d2 = v2.texcoord - v0.texcoord;

        let det = d1.x * d2.y - d2.x * d1.y;
        if det.abs() < 1e-12 {
            continue;
        }
        let r = 1.0 / det;
        let tangent = (e1 * d2.y - e2 * d1.y) * r;
        let bitangent = (e2 * d1.x - e1 * d2.x) * r;

        for i in [a, b, c] {
            tangents[i] += tangent;
            bitangents[i] += bitangent;
        }
    }

    for (i, vertex) in vertices.iter_mut().enumerate() {
        let n = vertex.normal;
        let t = (tangents[i] - n * n.dot(&tangents[i]))
            .try_normalize(1e-12)
            .or_else(|| n.cross(&Vector3::y()).try_normalize(1e-12))
            .unwrap_or_else(Vector3::x);
        let w = if n.cross(&t).dot(&bitangents[i]) < 0.0 { -1.0 } else { 1.0 };
        vertex.tangent = Vector4::new(t.x, t.y, t.z, w);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const QUAD_OBJ: &str = "mtllib quad.mtl
v -1 -1 0
v 1 -1 0
v 1 1 0
v -1 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
usemtl red
f 1/1/1 2/2/1 3/3/1
usemtl blue
f 1/1/1 3/3/1 4/4/1
";

    const QUAD_MTL: &str = "newmtl red
Kd 1 0 0
Ns 250
d 0.5
map_Kd textures/red.png
newmtl blue
Kd 0 0 1
map_bump blue_n.png
";

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).expect("write fixture");
        path
    }

    #[test]
    fn groups_triangles_by_material() {
        let dir = TempDir::new().expect("temp dir");
        write(&dir, "quad.mtl", QUAD_MTL);
        let obj = write(&dir, "quad.obj", QUAD_OBJ);

        let model = ObjImporter.import(&obj).expect("import");

        assert_eq!(model.materials().len(), 2);
        assert_eq!(model.meshes().len(), 2);
        assert_eq!(model.meshes()[0], Mesh::new(0, 1, 0));
        assert_eq!(model.meshes()[1], Mesh::new(3, 1, 1));

        let red = &model.materials()[0];
        assert_eq!(red.name, "red");
        assert!((red.shininess - 0.25).abs() < 1e-6);
        assert!((red.alpha - 0.5).abs() < 1e-6);
        assert_eq!(red.color_map, "textures/red.png");
        assert_eq!(model.materials()[1].bump_map, "blue_n.png");
        assert_eq!(red.texture_dir.as_deref(), Some(dir.path()));
    }

    #[test]
    fn materials_remember_their_mtl_directory() {
        let dir = TempDir::new().expect("temp dir");
        fs::create_dir(dir.path().join("looks")).expect("mtl dir");
        write(&dir, "looks/wood.mtl", "newmtl wood\nmap_Kd tex/wood.png\n");
        let obj = write(
            &dir,
            "table.obj",
            "mtllib looks/wood.mtl\nv 0 0 0\nv 1 0 0\nv 1 1 0\nusemtl wood\nf 1 2 3\n",
        );

        let model = ObjImporter.import(&obj).expect("import");

        let wood = &model.materials()[0];
        assert_eq!(wood.color_map, "tex/wood.png");
        assert_eq!(wood.texture_dir.as_deref(), Some(dir.path().join("looks").as_path()));
    }

    #[test]
    fn bump_mapped_models_get_tangents() {
        let dir = TempDir::new().expect("temp dir");
        write(&dir, "quad.mtl", QUAD_MTL);
        let obj = write(&dir, "quad.obj", QUAD_OBJ);

        let model = ObjImporter.import(&obj).expect("import");

        assert!(model.streams().tangents);
        for v in model.vertices() {
            assert!((v.tangent - Vector4::new(1.0, 0.0, 0.0, 1.0)).norm() < 1e-5);
        }
    }

    #[test]
    fn missing_normals_are_generated_and_mtl_is_optional() {
        let dir = TempDir::new().expect("temp dir");
        let obj = write(
            &dir,
            "plain.obj",
            "mtllib missing.mtl\nv 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3\nf 1 3 4\n",
        );

        let model = ObjImporter.import(&obj).expect("import");

        assert_eq!(model.materials(), &[Material::default()]);
        assert_eq!(model.triangle_count(), 2);
        assert!(!model.streams().texcoords);
        assert!(!model.streams().tangents);
        for v in model.vertices() {
            assert!((v.normal - Vector3::z()).norm() < 1e-6);
        }
    }

    #[test]
    fn rejects_bad_paths_and_empty_files() {
        let dir = TempDir::new().expect("temp dir");
        let txt = write(&dir, "notes.txt", "hello");
        let points = write(&dir, "points.obj", "v 0 0 0\nv 1 0 0\n");

        assert!(matches!(
            ObjImporter.import(&txt),
            Err(ModelLoadError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            ObjImporter.import(&dir.path().join("gone.obj")),
            Err(ModelLoadError::NotFound(_))
        ));
        assert!(matches!(
            ObjImporter.import(&points),
            Err(ModelLoadError::Empty(_))
        ));
    }

    #[test]
    fn obj_extension_check_ignores_case() {
        assert!(is_obj_path(Path::new("a/b/Teapot.OBJ")));
        assert!(!is_obj_path(Path::new("teapot.obj.bak")));
        assert!(!is_obj_path(Path::new("teapot")));
    }
}
