use crate::Result;
use image::RgbaImage;
use std::sync::Arc;

/// Decoded tile raster, cheap to clone and share with the rendering host
#[derive(Debug, Clone, PartialEq)]
pub struct TileImage {
    pixels: Arc<RgbaImage>,
}

impl TileImage {
    /// Decodes PNG or JPEG bytes
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let decoded = image::load_from_memory(bytes)?;
        Ok(Self {
            pixels: Arc::new(decoded.to_rgba8()),
        })
    }

    pub fn from_rgba(pixels: RgbaImage) -> Self {
        Self {
            pixels: Arc::new(pixels),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// True when both handles point at the same decoded raster
    pub fn same_raster(&self, other: &TileImage) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }
}

/// Encodes a solid-color PNG; used by tests and by hosts that need a stand-in raster
pub fn solid_png(width: u32, height: u32, rgba: [u8; 4]) -> Result<Vec<u8>> {
    let image = RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut bytes = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(image).write_to(&mut bytes, image::ImageOutputFormat::Png)?;
    Ok(bytes.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MapError;

    #[test]
    fn test_decode_png() {
        let png = solid_png(4, 2, [10, 20, 30, 255]).unwrap();
        let image = TileImage::decode(&png).unwrap();
        assert_eq!((image.width(), image.height()), (4, 2));
        assert_eq!(image.pixels().get_pixel(3, 1).0, [10, 20, 30, 255]);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let err = TileImage::decode(b"definitely not a png").unwrap_err();
        assert!(matches!(err, MapError::Decode(_)));
    }
}
