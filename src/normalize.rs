//! Flatten captured surfaces onto white and encode them as JPEG.
//!
//! Page canvases are often drawn without a background, so their transparent
//! pixels would come out black once alpha is dropped. Every surface is
//! composited over an opaque white target of the same size before encoding,
//! whether or not it has any transparency.

use crate::Result;
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder, Rgb, RgbImage, RgbaImage};

/// JPEG quality used for page images
pub const JPEG_QUALITY: u8 = 90;

/// An encoded page image with its pixel size
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub width: u32,
    pub height: u32,
    /// Baseline JPEG bytes (DCT)
    pub jpeg: Vec<u8>,
}

/// Composite `surface` over white, dropping the alpha channel
pub fn flatten_on_white(surface: &RgbaImage) -> RgbImage {
    let mut out = RgbImage::from_pixel(surface.width(), surface.height(), Rgb([255, 255, 255]));
    for (dst, src) in out.pixels_mut().zip(surface.pixels()) {
        let [r, g, b, a] = src.0;
        let a = a as u32;
        let blend = |c: u8| ((c as u32 * a + 255 * (255 - a) + 127) / 255) as u8;
        *dst = Rgb([blend(r), blend(g), blend(b)]);
    }
    out
}

/// Flatten and encode a surface at [`JPEG_QUALITY`]
pub fn normalize_surface(surface: &RgbaImage) -> Result<NormalizedImage> {
    normalize_with_quality(surface, JPEG_QUALITY)
}

pub fn normalize_with_quality(surface: &RgbaImage, quality: u8) -> Result<NormalizedImage> {
    let flat = flatten_on_white(surface);
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality).write_image(
        flat.as_raw(),
        flat.width(),
        flat.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(NormalizedImage {
        width: flat.width(),
        height: flat.height(),
        jpeg,
    })
}
