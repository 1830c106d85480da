use crate::core::framebuffer::FrameBuffer;
use crate::core::math::interpolation::{barycentric, covers, perspective_correct};
use crate::core::math::transform::{apply_perspective_division, ndc_to_screen};
use crate::core::pipeline::{Interpolatable, Shader};
use nalgebra::{Point2, Vector4};
use rayon::prelude::*;

/// Barycentric distance from an edge below which a wireframe sample is lit.
const WIREFRAME_EDGE: f32 = 0.02;

/// Fixed-function raster state applied to every triangle of a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterState {
    /// Discard clockwise (back-facing) triangles.
    pub cull_back_faces: bool,
    /// Shade only samples close to a triangle edge.
    pub wireframe: bool,
    /// Alpha-blend fragments over the color buffer.
    pub blend: bool,
}

impl Default for RasterState {
    fn default() -> Self {
        Self {
            cull_back_faces: true,
            wireframe: false,
            blend: false,
        }
    }
}

type ClipVertex<V> = (Vector4<f32>, V);

/// Scan-converts clip-space triangles into a [`FrameBuffer`].
pub struct Rasterizer {
    pub state: RasterState,
}

impl Rasterizer {
    pub fn new(state: RasterState) -> Self {
        Self { state }
    }

    /// Clips the triangle against the view frustum (Sutherland-Hodgman in
    /// homogeneous space), fans the result and rasterizes every piece.
    pub fn draw_triangle<S: Shader>(
        &self,
        framebuffer: &FrameBuffer,
        shader: &S,
        clip_coords: &[Vector4<f32>; 3],
        varyings: &[S::Varying; 3],
    ) {
        let mut polygon: Vec<ClipVertex<S::Varying>> = Vec::with_capacity(16);
        let mut scratch: Vec<ClipVertex<S::Varying>> = Vec::with_capacity(16);
        polygon.extend(clip_coords.iter().copied().zip(varyings.iter().copied()));

        // (axis, sign) for the plane `sign * p[axis] <= p.w`.
        const PLANES: [(usize, f32); 6] = [
            (0, 1.0),
            (0, -1.0),
            (1, 1.0),
            (1, -1.0),
            (2, 1.0),
            (2, -1.0),
        ];

        for &(axis, sign) in &PLANES {
            if polygon.is_empty() {
                return;
            }
            clip_against_plane(&polygon, &mut scratch, axis, sign);
            std::mem::swap(&mut polygon, &mut scratch);
        }

        if polygon.len() < 3 {
            return;
        }
        let (p0, v0) = polygon[0];
        for pair in polygon[1..].windows(2) {
            let (p1, v1) = pair[0];
            let (p2, v2) = pair[1];
            self.fill_triangle(framebuffer, shader, &[p0, p1, p2], &[v0, v1, v2]);
        }
    }

    fn fill_triangle<S: Shader>(
        &self,
        framebuffer: &FrameBuffer,
        shader: &S,
        clip: &[Vector4<f32>; 3],
        varyings: &[S::Varying; 3],
    ) {
        let width = framebuffer.buffer_width as f32;
        let height = framebuffer.buffer_height as f32;

        let mut screen = [Point2::origin(); 3];
        let mut w = [0.0; 3];
        for i in 0..3 {
            if clip[i].w.abs() < 1e-6 {
                return;
            }
            let ndc = apply_perspective_division(&clip[i]);
            screen[i] = ndc_to_screen(ndc.x, ndc.y, width, height);
            w[i] = clip[i].w;
        }

        // Raster Y points down, so counter-clockwise front faces have negative area.
        let e1 = screen[1] - screen[0];
        let e2 = screen[2] - screen[1];
        let signed_area = e1.x * e2.y - e1.y * e2.x;
        if self.state.cull_back_faces && signed_area >= 0.0 {
            return;
        }

        let uv_density = uv_density(&screen, varyings);

        let min_x = screen.iter().map(|p| p.x).fold(f32::INFINITY, f32::min).floor() as i32;
        let min_y = screen.iter().map(|p| p.y).fold(f32::INFINITY, f32::min).floor() as i32;
        let max_x = screen.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max).ceil() as i32;
        let max_y = screen.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max).ceil() as i32;

        let bw = framebuffer.buffer_width as i32;
        let bh = framebuffer.buffer_height as i32;
        if max_x < 0 || max_y < 0 || min_x >= bw || min_y >= bh {
            return;
        }
        let (x0, x1) = (min_x.max(0) as usize, max_x.min(bw - 1) as usize);
        let (y0, y1) = (min_y.max(0) as usize, max_y.min(bh - 1) as usize);

        let state = self.state;
        (y0..=y1).into_par_iter().for_each(|y| {
            for x in x0..=x1 {
                let center = Point2::new(x as f32 + 0.5, y as f32 + 0.5);
                let Some(bary) = barycentric(center, &screen) else {
                    continue;
                };
                if !covers(&bary) {
                    continue;
                }
                if state.wireframe
                    && bary.x > WIREFRAME_EDGE
                    && bary.y > WIREFRAME_EDGE
                    && bary.z > WIREFRAME_EDGE
                {
                    continue;
                }
                let Some(weights) = perspective_correct(&bary, &w) else {
                    continue;
                };

                // NDC depth is affine in raster space.
                let z_ndc = bary.x * clip[0].z / w[0]
                    + bary.y * clip[1].z / w[1]
                    + bary.z * clip[2].z / w[2];
                let depth = z_ndc * 0.5 + 0.5;

                if framebuffer.depth_test_and_update(x, y, depth) {
                    let varying =
                        varyings[0] * weights.x + varyings[1] * weights.y + varyings[2] * weights.z;
                    let color = shader.fragment(varying, uv_density);
                    framebuffer.write_sample(x, y, color, state.blend);
                }
            }
        });
    }
}

fn clip_against_plane<V: Interpolatable>(
    input: &[ClipVertex<V>],
    output: &mut Vec<ClipVertex<V>>,
    axis: usize,
    sign: f32,
) {
    output.clear();
    let Some(&last) = input.last() else {
        return;
    };

    let inside = |p: &Vector4<f32>| sign * p[axis] <= p.w + 1e-6;
    let mut prev = last;
    let mut prev_inside = inside(&prev.0);

    for &curr in input {
        let curr_inside = inside(&curr.0);
        if curr_inside != prev_inside
            && let Some(hit) = intersect(prev, curr, axis, sign)
        {
            output.push(hit);
        }
        if curr_inside {
            output.push(curr);
        }
        prev = curr;
        prev_inside = curr_inside;
    }
}

/// Point where segment `a-b` crosses `sign * p[axis] = p.w`, with the varying
/// interpolated at the same parameter.
#[inline(always)]
fn intersect<V: Interpolatable>(
    a: ClipVertex<V>,
    b: ClipVertex<V>,
    axis: usize,
    sign: f32,
) -> Option<ClipVertex<V>> {
    let (ac, bc) = (a.0[axis], b.0[axis]);
    let denom = sign * (bc - ac) - (b.0.w - a.0.w);
    if denom.abs() < 1e-9 {
        return None;
    }
    let t = (a.0.w - sign * ac) / denom;
    if !t.is_finite() {
        return None;
    }
    Some((a.0 + (b.0 - a.0) * t, a.1 * (1.0 - t) + b.1 * t))
}

fn uv_density<V: Interpolatable>(screen: &[Point2<f32>; 3], varyings: &[V; 3]) -> f32 {
    let [s0, s1, s2] = screen;
    let area_screen = 0.5 * ((s1.x - s0.x) * (s2.y - s0.y) - (s2.x - s0.x) * (s1.y - s0.y)).abs();
    if area_screen <= 1e-6 {
        return 0.0;
    }
    match (
        varyings[0].texcoord(),
        varyings[1].texcoord(),
        varyings[2].texcoord(),
    ) {
        (Some(t0), Some(t1), Some(t2)) => {
            let area_uv =
                0.5 * ((t1.x - t0.x) * (t2.y - t0.y) - (t2.x - t0.x) * (t1.y - t0.y)).abs();
            (area_uv / area_screen).sqrt()
        }
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::Vertex;
    use std::ops::{Add, Mul};

    #[derive(Clone, Copy)]
    struct Flat(f32);

    impl Add for Flat {
        type Output = Self;
        fn add(self, o: Self) -> Self {
            Flat(self.0 + o.0)
        }
    }

    impl Mul<f32> for Flat {
        type Output = Self;
        fn mul(self, s: f32) -> Self {
            Flat(self.0 * s)
        }
    }

    impl Interpolatable for Flat {}

    struct Solid;

    impl Shader for Solid {
        type Varying = Flat;

        fn vertex(&self, vertex: &Vertex) -> (Vector4<f32>, Flat) {
            (vertex.position.to_homogeneous(), Flat(1.0))
        }

        fn fragment(&self, v: Flat, _: f32) -> Vector4<f32> {
            Vector4::new(v.0, 0.0, 0.0, 1.0)
        }
    }

    fn triangle(counter_clockwise: bool) -> [Vector4<f32>; 3] {
        let a = Vector4::new(-0.9, -0.9, 0.0, 1.0);
        let b = Vector4::new(0.9, -0.9, 0.0, 1.0);
        let c = Vector4::new(0.0, 0.9, 0.0, 1.0);
        if counter_clockwise { [a, b, c] } else { [a, c, b] }
    }

    fn covered(fb: &FrameBuffer) -> usize {
        (0..fb.height)
            .flat_map(|y| (0..fb.width).map(move |x| (x, y)))
            .filter(|&(x, y)| fb.pixel(x, y).is_some_and(|c| c.x > 0.5))
            .count()
    }

    #[test]
    fn front_facing_triangle_is_filled() {
        let mut fb = FrameBuffer::new(32, 32, 1);
        fb.clear(Vector4::zeros());
        let r = Rasterizer::new(RasterState::default());
        r.draw_triangle(&fb, &Solid, &triangle(true), &[Flat(1.0); 3]);
        assert!(fb.pixel(16, 16).unwrap().x > 0.5);
    }

    #[test]
    fn back_faces_are_culled_only_when_enabled() {
        let mut fb = FrameBuffer::new(32, 32, 1);
        fb.clear(Vector4::zeros());
        let culling = Rasterizer::new(RasterState::default());
        culling.draw_triangle(&fb, &Solid, &triangle(false), &[Flat(1.0); 3]);
        assert_eq!(covered(&fb), 0);

        let both_sides = Rasterizer::new(RasterState {
            cull_back_faces: false,
            ..RasterState::default()
        });
        both_sides.draw_triangle(&fb, &Solid, &triangle(false), &[Flat(1.0); 3]);
        assert!(covered(&fb) > 0);
    }

    #[test]
    fn wireframe_leaves_interior_empty() {
        let mut fb = FrameBuffer::new(64, 64, 1);
        fb.clear(Vector4::zeros());
        let r = Rasterizer::new(RasterState {
            wireframe: true,
            ..RasterState::default()
        });
        r.draw_triangle(&fb, &Solid, &triangle(true), &[Flat(1.0); 3]);
        assert!(fb.pixel(32, 40).unwrap().x < 0.5);
        assert!(covered(&fb) > 0);
    }

    #[test]
    fn triangle_behind_the_camera_is_clipped_away() {
        let mut fb = FrameBuffer::new(16, 16, 1);
        fb.clear(Vector4::zeros());
        let r = Rasterizer::new(RasterState::default());
        let mut tri = triangle(true);
        for v in &mut tri {
            v.z = -2.0;
        }
        r.draw_triangle(&fb, &Solid, &tri, &[Flat(1.0); 3]);
        assert_eq!(covered(&fb), 0);
    }
}
