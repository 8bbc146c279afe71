//! Rendering pipeline: layout → paint → raster

pub mod layout;
pub mod paint;
pub mod raster;

pub use raster::{RasterOptions, Rasterizer, SoftwareRasterizer};

use crate::Result;
use image::{ImageFormat, RgbaImage};
use sha2::{Digest, Sha256};
use std::io::Cursor;

/// A rasterized capture region.
///
/// Produced once per export and never modified afterwards; the paginator
/// only reads its dimensions and the document embeds its pixels.
#[derive(Debug, Clone)]
pub struct RasterImage {
    pixels: RgbaImage,
}

impl RasterImage {
    pub fn new(pixels: RgbaImage) -> Self {
        Self { pixels }
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

    /// Encode as PNG
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut out = Cursor::new(Vec::new());
        self.pixels.write_to(&mut out, ImageFormat::Png)?;
        Ok(out.into_inner())
    }

    /// Packed 8-bit RGB samples, alpha dropped (the capture is opaque)
    pub fn to_rgb_bytes(&self) -> Vec<u8> {
        self.pixels
            .pixels()
            .flat_map(|p| [p.0[0], p.0[1], p.0[2]])
            .collect()
    }

    /// Hex SHA-256 of the raw pixels, used for golden comparisons
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.width().to_be_bytes());
        hasher.update(self.height().to_be_bytes());
        hasher.update(self.pixels.as_raw());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn png_encoding_has_signature() {
        let img = RasterImage::new(RgbaImage::from_pixel(4, 2, Rgba([255, 255, 255, 255])));
        let png = img.to_png().unwrap();
        assert_eq!(&png[0..8], b"\x89PNG\r\n\x1a\n");
        assert_eq!(img.to_rgb_bytes().len(), 4 * 2 * 3);
    }

    #[test]
    fn digest_depends_on_pixels() {
        let white = RasterImage::new(RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 255])));
        let black = RasterImage::new(RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255])));
        assert_ne!(white.digest(), black.digest());
        assert_eq!(white.digest(), white.clone().digest());
        assert_eq!(white.digest().len(), 64);
    }
}
