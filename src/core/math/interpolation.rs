use nalgebra::{Point2, Vector3};

const EPSILON: f32 = 1e-5;

/// Barycentric weights of `p` relative to the raster-space triangle `tri`.
/// `None` for degenerate triangles.
pub fn barycentric(p: Point2<f32>, tri: &[Point2<f32>; 3]) -> Option<Vector3<f32>> {
    let e1 = tri[1] - tri[0];
    let e2 = tri[2] - tri[0];
    let rel = p - tri[0];

    let area_x2 = e1.x * e2.y - e1.y * e2.x;
    if area_x2.abs() < EPSILON {
        return None;
    }

    let inv = 1.0 / area_x2;
    let beta = (rel.x * e2.y - rel.y * e2.x) * inv;
    let gamma = (e1.x * rel.y - e1.y * rel.x) * inv;

    Some(Vector3::new(1.0 - beta - gamma, beta, gamma))
}

#[inline(always)]
pub fn covers(bary: &Vector3<f32>) -> bool {
    bary.x >= -EPSILON && bary.y >= -EPSILON && bary.z >= -EPSILON
}

/// Re-weights screen-space barycentrics by the per-vertex clip `w` so that
/// attributes interpolate linearly in eye space.
pub fn perspective_correct(bary: &Vector3<f32>, w: &[f32; 3]) -> Option<Vector3<f32>> {
    let recip = |w: f32| if w.abs() > EPSILON { 1.0 / w } else { 1.0 };

    let weighted = Vector3::new(bary.x * recip(w[0]), bary.y * recip(w[1]), bary.z * recip(w[2]));
    let sum = weighted.x + weighted.y + weighted.z;
    if sum.abs() < EPSILON {
        return None;
    }
    Some(weighted / sum)
}
