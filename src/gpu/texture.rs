use nalgebra::{Vector2, Vector4};

use crate::error::DeviceError;
use crate::gpu::{TextureDesc, TextureFilter, WrapMode};

struct MipLevel {
    width: u32,
    height: u32,
    /// Row 0 is the bottom row of the image.
    texels: Vec<[u8; 4]>,
}

impl MipLevel {
    fn fetch(&self, x: i32, y: i32, wrap: WrapMode) -> Vector4<f32> {
        let (w, h) = (self.width as i32, self.height as i32);
        let (x, y) = match wrap {
            WrapMode::Repeat => (x.rem_euclid(w), y.rem_euclid(h)),
            WrapMode::ClampToEdge => (x.clamp(0, w - 1), y.clamp(0, h - 1)),
        };
        let t = self.texels[(y * w + x) as usize];
        Vector4::new(t[0], t[1], t[2], t[3]).map(|c| c as f32 / 255.0)
    }

    fn nearest(&self, uv: Vector2<f32>, wrap: WrapMode) -> Vector4<f32> {
        let x = (uv.x * self.width as f32).floor() as i32;
        let y = (uv.y * self.height as f32).floor() as i32;
        self.fetch(x, y, wrap)
    }

    fn bilinear(&self, uv: Vector2<f32>, wrap: WrapMode) -> Vector4<f32> {
        // Texel centers sit at half-integer coordinates.
        let x = uv.x * self.width as f32 - 0.5;
        let y = uv.y * self.height as f32 - 0.5;
        let (x0, y0) = (x.floor() as i32, y.floor() as i32);
        let (fx, fy) = (x - x.floor(), y - y.floor());

        let bottom = self.fetch(x0, y0, wrap).lerp(&self.fetch(x0 + 1, y0, wrap), fx);
        let top = self.fetch(x0, y0 + 1, wrap).lerp(&self.fetch(x0 + 1, y0 + 1, wrap), fx);
        bottom.lerp(&top, fy)
    }

    /// 2x2 box-filtered half-size level.
    fn downsample(&self) -> MipLevel {
        let width = (self.width / 2).max(1);
        let height = (self.height / 2).max(1);
        let mut texels = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                let sx = (x * 2).min(self.width - 1);
                let sy = (y * 2).min(self.height - 1);
                let sx1 = (sx + 1).min(self.width - 1);
                let sy1 = (sy + 1).min(self.height - 1);
                let taps = [(sx, sy), (sx1, sy), (sx, sy1), (sx1, sy1)];

                let mut sum = [0u32; 4];
                for (tx, ty) in taps {
                    let t = self.texels[(ty * self.width + tx) as usize];
                    for c in 0..4 {
                        sum[c] += t[c] as u32;
                    }
                }
                texels.push(sum.map(|s| ((s + 2) / 4) as u8));
            }
        }
        MipLevel {
            width,
            height,
            texels,
        }
    }
}

/// RGBA8 texture resident in a [`crate::gpu::SoftwareDevice`].
pub struct DeviceTexture {
    levels: Vec<MipLevel>,
    filter: TextureFilter,
    wrap: WrapMode,
    anisotropy: f32,
}

impl DeviceTexture {
    pub fn new(desc: &TextureDesc, pixels: &[u8]) -> Result<Self, DeviceError> {
        if desc.width == 0 || desc.height == 0 {
            return Err(DeviceError::InvalidDimensions {
                width: desc.width,
                height: desc.height,
            });
        }
        let expected = desc.width as usize * desc.height as usize * 4;
        if pixels.len() != expected {
            return Err(DeviceError::PixelDataSize {
                expected,
                actual: pixels.len(),
            });
        }

        let base = MipLevel {
            width: desc.width,
            height: desc.height,
            texels: pixels
                .chunks_exact(4)
                .map(|p| [p[0], p[1], p[2], p[3]])
                .collect(),
        };

        let mut levels = vec![base];
        if desc.mipmaps {
            while let Some(last) = levels.last()
                && (last.width > 1 || last.height > 1)
            {
                let next = last.downsample();
                levels.push(next);
            }
        }

        Ok(Self {
            levels,
            filter: desc.filter,
            wrap: desc.wrap,
            anisotropy: desc.anisotropy.max(1.0),
        })
    }

    pub fn width(&self) -> u32 {
        self.levels[0].width
    }

    pub fn height(&self) -> u32 {
        self.levels[0].height
    }

    pub fn mip_levels(&self) -> usize {
        self.levels.len()
    }

    /// Samples with mipmap selection driven by the triangle's UV density.
    ///
    /// Anisotropic filtering is approximated by biasing the level of detail
    /// towards the sharper level, since only an isotropic footprint is known.
    pub fn sample(&self, uv: Vector2<f32>, uv_density: f32) -> Vector4<f32> {
        let base = &self.levels[0];
        let footprint = uv_density * ((base.width * base.height) as f32).sqrt();
        let lod = if footprint > 0.0 {
            footprint.log2() - self.anisotropy.log2()
        } else {
            0.0
        };

        if lod <= 0.0 || self.levels.len() == 1 {
            return self.filtered(base, uv);
        }

        let max_level = (self.levels.len() - 1) as f32;
        let lod = lod.min(max_level);
        let lower = lod.floor() as usize;
        let upper = (lower + 1).min(self.levels.len() - 1);
        let t = lod - lower as f32;

        let a = self.levels[lower].bilinear(uv, self.wrap);
        let b = self.levels[upper].bilinear(uv, self.wrap);
        a.lerp(&b, t)
    }

    fn filtered(&self, level: &MipLevel, uv: Vector2<f32>) -> Vector4<f32> {
        match self.filter {
            TextureFilter::Nearest => level.nearest(uv, self.wrap),
            TextureFilter::Linear => level.bilinear(uv, self.wrap),
        }
    }
}
