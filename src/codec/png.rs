//! PNG encoding: imaging toolkit encode, then lossless oxipng recompression.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat as ToolkitFormat, RgbImage, RgbaImage};

use crate::buffer::PixelBuffer;
use crate::error::{Error, Result};

/// Encode pixels losslessly as PNG.
///
/// `quality` is the compression effort (0-9); it selects the oxipng preset.
/// Presets above 6 are clamped, matching oxipng's own ceiling.
pub(super) fn encode(buffer: &PixelBuffer, quality: u8) -> Result<Vec<u8>> {
    debug_assert!(quality <= 9, "png effort out of range: {quality}");

    let img = to_dynamic(buffer)?;
    let mut raw = Vec::new();
    img.write_to(&mut Cursor::new(&mut raw), ToolkitFormat::Png)
        .map_err(|e| Error::EncodeFailed {
            format: "png".to_string(),
            reason: format!("toolkit encode: {e}"),
        })?;

    let options = oxipng::Options::from_preset(quality.min(6));
    oxipng::optimize_from_memory(&raw, &options).map_err(|e| Error::EncodeFailed {
        format: "png".to_string(),
        reason: format!("oxipng: {e}"),
    })
}

fn to_dynamic(buffer: &PixelBuffer) -> Result<DynamicImage> {
    let width = buffer.width();
    let height = buffer.height();
    if buffer.has_alpha() {
        RgbaImage::from_raw(width, height, buffer.data().to_vec())
            .map(DynamicImage::ImageRgba8)
            .ok_or_else(|| Error::EncodeFailed {
                format: "png".to_string(),
                reason: "pixel buffer length mismatch".to_string(),
            })
    } else {
        RgbImage::from_raw(width, height, buffer.data().to_vec())
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| Error::EncodeFailed {
                format: "png".to_string(),
                reason: "pixel buffer length mismatch".to_string(),
            })
    }
}
