//! AVIF encoding via ravif (rav1e), optional decoding via avif-decode.

use ravif::{Encoder as AvifEncoder, Img};
use rgb::RGBA8;

use crate::buffer::PixelBuffer;
use crate::error::{Error, Result};

/// rav1e speed by quality band (0 = slowest/best, 10 = fastest).
///
/// Bands follow the usual web-encoder trade-off: spend time only where the
/// requested quality justifies it.
fn speed_for_quality(quality: u8) -> u8 {
    if quality >= 85 {
        6
    } else if quality >= 70 {
        7
    } else if quality >= 50 {
        8
    } else {
        9
    }
}

/// Encode pixels as AVIF at the given quality.
pub(super) fn encode(buffer: &PixelBuffer, quality: u8) -> Result<Vec<u8>> {
    let width = buffer.width() as usize;
    let height = buffer.height() as usize;
    debug_assert!(quality <= 100);

    // ravif consumes RGBA; opaque alpha is synthesized for RGB sources.
    let pixels: Vec<RGBA8> = if buffer.has_alpha() {
        buffer
            .data()
            .chunks_exact(4)
            .map(|p| RGBA8::new(p[0], p[1], p[2], p[3]))
            .collect()
    } else {
        buffer
            .data()
            .chunks_exact(3)
            .map(|p| RGBA8::new(p[0], p[1], p[2], 255))
            .collect()
    };
    debug_assert_eq!(pixels.len(), width * height);
    let img = Img::new(pixels, width, height);

    let encoded = AvifEncoder::new()
        .with_quality(f32::from(quality))
        .with_alpha_quality(f32::from(quality))
        .with_speed(speed_for_quality(quality))
        .encode_rgba(img.as_ref())
        .map_err(|e| Error::EncodeFailed {
            format: "avif".to_string(),
            reason: format!("ravif: {e}"),
        })?;

    Ok(encoded.avif_file)
}

/// Decode AVIF bytes for metric scoring.
#[cfg(feature = "avif-decode")]
pub(super) fn decode(data: &[u8]) -> Result<PixelBuffer> {
    let decoder = avif_decode::Decoder::from_avif(data).map_err(|e| Error::ComputeFailed {
        metric: "decode".to_string(),
        reason: format!("avif parse: {e}"),
    })?;
    let image = decoder.to_image().map_err(|e| Error::ComputeFailed {
        metric: "decode".to_string(),
        reason: format!("avif decode: {e}"),
    })?;

    match image {
        avif_decode::Image::Rgb8(img) => {
            let (width, height) = (img.width() as u32, img.height() as u32);
            let data: Vec<u8> = img.pixels().flat_map(|p| [p.r, p.g, p.b]).collect();
            PixelBuffer::from_raw(width, height, 3, data)
        }
        avif_decode::Image::Rgba8(img) => {
            let (width, height) = (img.width() as u32, img.height() as u32);
            let data: Vec<u8> = img.pixels().flat_map(|p| [p.r, p.g, p.b, p.a]).collect();
            PixelBuffer::from_raw(width, height, 4, data)
        }
        _ => Err(Error::ComputeFailed {
            metric: "decode".to_string(),
            reason: "high-bit-depth AVIF is outside the 8-bit pipeline".to_string(),
        }),
    }
}

/// Decode stub when AVIF decoding is not compiled in.
#[cfg(not(feature = "avif-decode"))]
pub(super) fn decode(_data: &[u8]) -> Result<PixelBuffer> {
    Err(Error::ComputeFailed {
        metric: "decode".to_string(),
        reason: "AVIF decoding not compiled in (enable 'avif-decode' feature)".to_string(),
    })
}
