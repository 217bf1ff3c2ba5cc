//! JPEG encoding via mozjpeg.

use mozjpeg::{ColorSpace, Compress, ScanMode};

use crate::buffer::PixelBuffer;
use crate::error::{Error, Result};

/// Encode RGB pixels as a progressive, scan-optimized JPEG.
///
/// Alpha is dropped before the scanlines are written; mozjpeg only sees RGB.
/// The compressor aborts through a panic on internal failure, so the whole
/// encode runs under `catch_unwind`.
pub(super) fn encode(buffer: &PixelBuffer, quality: u8) -> Result<Vec<u8>> {
    let width = buffer.width() as usize;
    let height = buffer.height() as usize;
    let rgb = buffer.to_rgb8_vec();
    debug_assert_eq!(rgb.len(), width * height * 3);

    std::panic::catch_unwind(|| -> std::io::Result<Vec<u8>> {
        let mut comp = Compress::new(ColorSpace::JCS_RGB);
        comp.set_size(width, height);
        comp.set_quality(f32::from(quality));
        comp.set_progressive_mode();
        comp.set_optimize_coding(true);
        comp.set_optimize_scans(true);
        comp.set_scan_optimization_mode(ScanMode::AllComponentsTogether);

        let mut started = comp.start_compress(Vec::new())?;
        started.write_scanlines(&rgb)?;
        started.finish()
    })
    .map_err(|_| Error::EncodeFailed {
        format: "jpeg".to_string(),
        reason: "mozjpeg compression panicked".to_string(),
    })?
    .map_err(|e| Error::EncodeFailed {
        format: "jpeg".to_string(),
        reason: format!("mozjpeg: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jpeg_ends_with_eoi() {
        let data: Vec<u8> = (0..24 * 24 * 3).map(|i| (i % 251) as u8).collect();
        let buf = PixelBuffer::from_raw(24, 24, 3, data).unwrap();
        let bytes = encode(&buf, 85).unwrap();
        assert_eq!(&bytes[bytes.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_jpeg_quality_monotone_on_noise() {
        // Noise compresses poorly, so quality should dominate size ordering.
        let data: Vec<u8> = (0..64 * 64 * 3)
            .map(|i| ((i * 2_654_435_761_usize) >> 7) as u8)
            .collect();
        let buf = PixelBuffer::from_raw(64, 64, 3, data).unwrap();
        let low = encode(&buf, 20).unwrap();
        let high = encode(&buf, 95).unwrap();
        assert!(high.len() > low.len());
    }
}
