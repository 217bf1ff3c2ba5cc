//! Format-agnostic encode/decode facade.
//!
//! All per-format behavior lives in the submodules; callers go through
//! [`encode`] and [`decode_bytes`] and dispatch on [`ImageFormat`] only.
//! Every encoder output is verified before it leaves this module: non-empty,
//! under the sanity cap, and carrying the right magic bytes.

mod avif;
mod jpeg;
mod png;
mod webp;

use crate::buffer::PixelBuffer;
use crate::error::{Error, Result};
use crate::format::ImageFormat;
use crate::limits::MAX_ENCODED_BYTES;

/// Encode a pixel buffer into `format` at the given quality.
///
/// For PNG the quality is a compression effort level (0-9); for the lossy
/// formats it is the usual 0-100 scale. An RGBA buffer encoded into a
/// non-alpha format has its alpha dropped (callers are expected to warn).
///
/// # Errors
///
/// `InvalidQuality` when outside the per-format range, `UnsupportedFormat`
/// for non-encode targets, `EncodeFailed` when the encoder errors or its
/// output fails verification.
pub fn encode(buffer: &PixelBuffer, format: ImageFormat, quality: u8) -> Result<Vec<u8>> {
    let (min, max) = format.quality_range();
    if !format.is_encode_target() {
        return Err(Error::UnsupportedFormat(format.to_string()));
    }
    if quality < min || quality > max {
        return Err(Error::InvalidQuality {
            format: format.to_string(),
            quality,
            min,
            max,
        });
    }

    let bytes = match format {
        ImageFormat::Jpeg => jpeg::encode(buffer, quality)?,
        ImageFormat::Png => png::encode(buffer, quality)?,
        ImageFormat::Webp => webp::encode(buffer, quality)?,
        ImageFormat::Avif => avif::encode(buffer, quality)?,
        ImageFormat::Unknown => unreachable!("rejected above"),
    };

    verify_encoded(format, &bytes)?;
    tracing::debug!(
        format = format.as_str(),
        quality,
        size = bytes.len(),
        "encoded candidate"
    );
    Ok(bytes)
}

/// Decode encoded bytes back into a pixel buffer.
///
/// Used to score candidates against the baseline. JPEG, PNG, and WebP go
/// through the imaging toolkit; AVIF requires the `avif-decode` feature.
pub fn decode_bytes(data: &[u8]) -> Result<PixelBuffer> {
    match ImageFormat::from_magic(data) {
        ImageFormat::Avif => avif::decode(data),
        _ => decode_with_toolkit(data),
    }
}

fn decode_with_toolkit(data: &[u8]) -> Result<PixelBuffer> {
    let img = image::load_from_memory(data).map_err(|e| Error::ComputeFailed {
        metric: "decode".to_string(),
        reason: format!("failed to decode candidate: {e}"),
    })?;
    dynamic_to_buffer(&img)
}

/// Materialize a decoded image as a tightly packed [`PixelBuffer`].
///
/// Alpha is kept only when the source actually carries it.
pub(crate) fn dynamic_to_buffer(img: &image::DynamicImage) -> Result<PixelBuffer> {
    let width = img.width();
    let height = img.height();
    if img.color().has_alpha() {
        let rgba = img.to_rgba8();
        PixelBuffer::from_raw(width, height, 4, rgba.into_raw())
    } else {
        let rgb = img.to_rgb8();
        PixelBuffer::from_raw(width, height, 3, rgb.into_raw())
    }
}

/// Post-condition checks on encoder output.
///
/// Aborts in debug builds, trips the error path in release.
fn verify_encoded(format: ImageFormat, bytes: &[u8]) -> Result<()> {
    debug_assert!(!bytes.is_empty(), "{format} encoder returned zero bytes");
    debug_assert!(
        bytes.len() < MAX_ENCODED_BYTES,
        "{format} output implausibly large"
    );

    if bytes.is_empty() {
        return Err(Error::EncodeFailed {
            format: format.to_string(),
            reason: "encoder returned zero bytes".to_string(),
        });
    }
    if bytes.len() >= MAX_ENCODED_BYTES {
        return Err(Error::EncodeFailed {
            format: format.to_string(),
            reason: format!("output of {} bytes exceeds sanity cap", bytes.len()),
        });
    }
    if !format.matches_magic(bytes) {
        return Err(Error::EncodeFailed {
            format: format.to_string(),
            reason: "output missing format signature".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_buffer(width: u32, height: u32, channels: u8) -> PixelBuffer {
        let mut data = Vec::new();
        for y in 0..height {
            for x in 0..width {
                data.push((x * 7 % 256) as u8);
                data.push((y * 11 % 256) as u8);
                data.push(((x + y) * 3 % 256) as u8);
                if channels == 4 {
                    data.push(255);
                }
            }
        }
        PixelBuffer::from_raw(width, height, channels, data).unwrap()
    }

    #[test]
    fn test_encode_jpeg_magic() {
        let buf = gradient_buffer(32, 32, 3);
        let bytes = encode(&buf, ImageFormat::Jpeg, 80).unwrap();
        assert_eq!(&bytes[0..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_encode_png_magic() {
        let buf = gradient_buffer(32, 32, 3);
        let bytes = encode(&buf, ImageFormat::Png, 2).unwrap();
        assert_eq!(&bytes[0..4], &[0x89, 0x50, 0x4E, 0x47]);
    }

    #[test]
    fn test_encode_webp_magic() {
        let buf = gradient_buffer(32, 32, 3);
        let bytes = encode(&buf, ImageFormat::Webp, 80).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WEBP");
    }

    #[test]
    fn test_encode_rgba_to_jpeg_drops_alpha() {
        let buf = gradient_buffer(16, 16, 4);
        let bytes = encode(&buf, ImageFormat::Jpeg, 80).unwrap();
        let decoded = decode_bytes(&bytes).unwrap();
        assert_eq!(decoded.channels(), 3);
        assert_eq!(decoded.width(), 16);
        assert_eq!(decoded.height(), 16);
    }

    #[test]
    fn test_encode_rgba_to_png_keeps_alpha() {
        let mut buf = gradient_buffer(16, 16, 4);
        buf.data_mut()[3] = 128; // non-opaque pixel so the encoder keeps the channel
        let bytes = encode(&buf, ImageFormat::Png, 2).unwrap();
        let decoded = decode_bytes(&bytes).unwrap();
        assert_eq!(decoded.channels(), 4);
        assert_eq!(decoded.pixel(0, 0)[3], 128);
    }

    #[test]
    fn test_encode_rejects_out_of_range_quality() {
        let buf = gradient_buffer(8, 8, 3);
        assert!(matches!(
            encode(&buf, ImageFormat::Png, 10),
            Err(Error::InvalidQuality { .. })
        ));
        assert!(matches!(
            encode(&buf, ImageFormat::Jpeg, 0),
            Err(Error::InvalidQuality { .. })
        ));
    }

    #[test]
    fn test_encode_unknown_format_rejected() {
        let buf = gradient_buffer(8, 8, 3);
        assert!(matches!(
            encode(&buf, ImageFormat::Unknown, 0),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_dimensions_round_trip() {
        let buf = gradient_buffer(33, 17, 3);
        for format in [ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::Webp] {
            let bytes = encode(&buf, format, format.default_quality()).unwrap();
            let decoded = decode_bytes(&bytes).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (33, 17), "{format}");
        }
    }
}
