/// A run of triangles in the model's index buffer that share one material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mesh {
    /// First index of the run.
    pub start_index: usize,
    pub triangle_count: usize,
    /// Index into the model's materials.
    pub material: usize,
}

impl Mesh {
    pub fn new(start_index: usize, triangle_count: usize, material: usize) -> Self {
        Self {
            start_index,
            triangle_count,
            material,
        }
    }

    pub fn index_count(&self) -> usize {
        self.triangle_count * 3
    }
}
