use crate::error::TextureLoadError;
use std::path::Path;

/// RGBA8 pixels, rows stored top-down as image files are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    /// Reverses the row order in place (top-down to bottom-up and back).
    pub fn flip_vertical(&mut self) {
        let row = self.width as usize * 4;
        if row == 0 {
            return;
        }
        let rows = self.pixels.len() / row;
        for y in 0..rows / 2 {
            let (top, bottom) = self.pixels.split_at_mut((rows - 1 - y) * row);
            top[y * row..(y + 1) * row].swap_with_slice(&mut bottom[..row]);
        }
    }
}

pub trait ImageDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedImage, TextureLoadError>;
}

/// Decodes anything the `image` crate understands.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCrateDecoder;

impl ImageDecoder for ImageCrateDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedImage, TextureLoadError> {
        let img = image::open(path).map_err(|e| TextureLoadError::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let rgba = img.into_rgba8();
        Ok(DecodedImage {
            width: rgba.width(),
            height: rgba.height(),
            pixels: rgba.into_raw(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    #[test]
    fn flip_reverses_rows() {
        let mut img = DecodedImage {
            width: 1,
            height: 3,
            pixels: vec![1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3],
        };
        img.flip_vertical();
        assert_eq!(img.pixels, vec![3, 3, 3, 3, 2, 2, 2, 2, 1, 1, 1, 1]);
    }

    #[test]
    fn decodes_png_as_rgba() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("checker.png");
        let mut source = RgbaImage::new(2, 2);
        source.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        source.put_pixel(1, 1, Rgba([0, 0, 255, 128]));
        source.save(&path).expect("save png");

        let decoded = ImageCrateDecoder.decode(&path).expect("decode");
        assert_eq!((decoded.width, decoded.height), (2, 2));
        assert_eq!(&decoded.pixels[0..4], &[255, 0, 0, 255]);
        assert_eq!(&decoded.pixels[12..16], &[0, 0, 255, 128]);
    }

    #[test]
    fn missing_file_is_a_decode_error() {
        let result = ImageCrateDecoder.decode(Path::new("does/not/exist.png"));
        assert!(matches!(result, Err(TextureLoadError::Decode { .. })));
    }
}
