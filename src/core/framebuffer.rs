use nalgebra::Vector4;
use rayon::prelude::*;
use std::cell::UnsafeCell;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

const LOCK_STRIPES: usize = 1024;

/// Color + depth storage at `sample_count`² samples per pixel.
///
/// Rasterization writes from many rayon workers: depth is an atomic CAS on the
/// f32 bits, color writes take one of a fixed pool of striped locks.
pub struct FrameBuffer {
    pub width: usize,
    pub height: usize,
    pub sample_count: usize,
    pub buffer_width: usize,
    pub buffer_height: usize,

    color_buffer: UnsafeCell<Vec<Vector4<f32>>>,
    depth_buffer: Vec<AtomicU32>,
    locks: Vec<Mutex<()>>,
}

// Every color access goes through a stripe lock or happens with `&mut self`.
unsafe impl Sync for FrameBuffer {}

impl FrameBuffer {
    pub fn new(width: usize, height: usize, sample_count: usize) -> Self {
        let buffer_width = width * sample_count;
        let buffer_height = height * sample_count;
        let size = buffer_width * buffer_height;

        let inf_bits = f32::INFINITY.to_bits();
        Self {
            width,
            height,
            sample_count,
            buffer_width,
            buffer_height,
            color_buffer: UnsafeCell::new(vec![Vector4::zeros(); size]),
            depth_buffer: (0..size).map(|_| AtomicU32::new(inf_bits)).collect(),
            locks: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Reallocates only when the pixel dimensions change.
    pub fn resize(&mut self, width: usize, height: usize) {
        if width != self.width || height != self.height {
            *self = Self::new(width, height, self.sample_count);
        }
    }

    pub fn clear(&mut self, color: Vector4<f32>) {
        let inf_bits = f32::INFINITY.to_bits();
        self.color_buffer.get_mut().par_iter_mut().for_each(|c| *c = color);
        self.depth_buffer
            .par_iter()
            .for_each(|d| d.store(inf_bits, Ordering::Relaxed));
    }

    #[inline(always)]
    pub fn in_bounds(&self, x: usize, y: usize) -> bool {
        x < self.buffer_width && y < self.buffer_height
    }

    #[inline(always)]
    fn index(&self, x: usize, y: usize) -> usize {
        y * self.buffer_width + x
    }

    /// Less-than depth test. On success the new depth is already stored.
    #[inline]
    pub fn depth_test_and_update(&self, x: usize, y: usize, new_depth: f32) -> bool {
        if !self.in_bounds(x, y) {
            return false;
        }
        let slot = &self.depth_buffer[self.index(x, y)];
        let new_bits = new_depth.to_bits();

        let mut current_bits = slot.load(Ordering::Relaxed);
        loop {
            if new_depth >= f32::from_bits(current_bits) {
                return false;
            }
            match slot.compare_exchange_weak(
                current_bits,
                new_bits,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => current_bits = actual,
            }
        }
    }

    /// Writes one sample, optionally blending `src_alpha, 1 - src_alpha` over
    /// what is stored. Call only after the depth test passed.
    #[inline]
    pub fn write_sample(&self, x: usize, y: usize, color: Vector4<f32>, blend: bool) {
        if !self.in_bounds(x, y) {
            return;
        }
        let idx = self.index(x, y);
        let _guard = self.locks[idx % self.locks.len()]
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // SAFETY: the stripe lock for `idx` is held.
        let buffer = unsafe { &mut *self.color_buffer.get() };
        buffer[idx] = if blend {
            let a = color.w.clamp(0.0, 1.0);
            let dst = buffer[idx];
            let rgb = color.xyz() * a + dst.xyz() * (1.0 - a);
            Vector4::new(rgb.x, rgb.y, rgb.z, a + dst.w * (1.0 - a))
        } else {
            color
        };
    }

    /// Averages the samples of one pixel.
    pub fn pixel(&self, x: usize, y: usize) -> Option<Vector4<f32>> {
        if x >= self.width || y >= self.height {
            return None;
        }
        // SAFETY: read-only access between frames, no writers are active.
        let buffer = unsafe { &*self.color_buffer.get() };

        let n = self.sample_count;
        let mut sum = Vector4::zeros();
        for dy in 0..n {
            for dx in 0..n {
                sum += buffer[self.index(x * n + dx, y * n + dy)];
            }
        }
        Some(sum / (n * n) as f32)
    }

    /// Resolves the samples into tightly packed, top-down RGBA8 rows.
    pub fn resolve_rgba8(&self, out: &mut Vec<u8>) {
        out.resize(self.width * self.height * 4, 0);
        if self.width == 0 {
            return;
        }
        out.par_chunks_mut(self.width * 4)
            .enumerate()
            .for_each(|(y, row)| {
                for x in 0..self.width {
                    let c = self.pixel(x, y).unwrap_or_else(Vector4::zeros);
                    let texel = &mut row[x * 4..x * 4 + 4];
                    texel[0] = to_unorm8(c.x);
                    texel[1] = to_unorm8(c.y);
                    texel[2] = to_unorm8(c.z);
                    // Presented opaque; destination alpha only matters for blending.
                    texel[3] = 255;
                }
            });
    }
}

#[inline]
fn to_unorm8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearer_depth_wins() {
        let fb = FrameBuffer::new(4, 4, 1);
        assert!(fb.depth_test_and_update(1, 1, 0.5));
        assert!(!fb.depth_test_and_update(1, 1, 0.7));
        assert!(fb.depth_test_and_update(1, 1, 0.2));
        assert!(!fb.depth_test_and_update(9, 9, 0.0));
    }

    #[test]
    fn blending_mixes_with_destination() {
        let mut fb = FrameBuffer::new(1, 1, 1);
        fb.clear(Vector4::new(0.0, 0.0, 1.0, 0.0));
        fb.write_sample(0, 0, Vector4::new(1.0, 0.0, 0.0, 0.25), true);
        let c = fb.pixel(0, 0).unwrap();
        assert!((c.x - 0.25).abs() < 1e-6);
        assert!((c.z - 0.75).abs() < 1e-6);
    }

    #[test]
    fn resolve_averages_supersamples() {
        let mut fb = FrameBuffer::new(1, 1, 2);
        fb.clear(Vector4::zeros());
        fb.write_sample(0, 0, Vector4::new(1.0, 1.0, 1.0, 1.0), false);
        fb.write_sample(1, 0, Vector4::new(1.0, 1.0, 1.0, 1.0), false);
        let mut out = Vec::new();
        fb.resolve_rgba8(&mut out);
        assert_eq!(out, vec![128, 128, 128, 255]);
    }
}
