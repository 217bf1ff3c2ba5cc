//! SSIMULACRA2 similarity via fast-ssim2.

use std::num::NonZeroUsize;

use fast_ssim2::compute_frame_ssimulacra2;
use yuvxyb::{ColorPrimaries, Rgb as Ssim2Rgb, TransferCharacteristic};

use crate::buffer::PixelBuffer;
use crate::error::{Error, Result};

/// Calculate the raw SSIMULACRA2 score (0-100, higher is better).
///
/// Callers wanting distance semantics go through
/// [`crate::metric::ssimulacra2_score_to_distance`].
pub fn calculate(baseline: &PixelBuffer, candidate: &PixelBuffer) -> Result<f64> {
    debug_assert_eq!(baseline.width(), candidate.width());
    debug_assert_eq!(baseline.height(), candidate.height());

    let width = baseline.width() as usize;
    let height = baseline.height() as usize;

    let ref_img = to_ssim2_rgb(baseline, width, height)?;
    let test_img = to_ssim2_rgb(candidate, width, height)?;

    compute_frame_ssimulacra2(ref_img, test_img).map_err(|e| Error::ComputeFailed {
        metric: "ssimulacra2".to_string(),
        reason: format!("failed to compute frame score: {e}"),
    })
}

fn to_ssim2_rgb(buffer: &PixelBuffer, width: usize, height: usize) -> Result<Ssim2Rgb> {
    let rgb = buffer.to_rgb8_vec();
    debug_assert_eq!(rgb.len(), width * height * 3);

    let pixels: Vec<[f32; 3]> = rgb
        .chunks_exact(3)
        .map(|c| {
            [
                f32::from(c[0]) / 255.0,
                f32::from(c[1]) / 255.0,
                f32::from(c[2]) / 255.0,
            ]
        })
        .collect();

    let width = NonZeroUsize::new(width).ok_or_else(|| Error::ComputeFailed {
        metric: "ssimulacra2".to_string(),
        reason: "image width must be non-zero".to_string(),
    })?;
    let height = NonZeroUsize::new(height).ok_or_else(|| Error::ComputeFailed {
        metric: "ssimulacra2".to_string(),
        reason: "image height must be non-zero".to_string(),
    })?;

    Ssim2Rgb::new(
        pixels,
        width,
        height,
        TransferCharacteristic::SRGB,
        ColorPrimaries::BT709,
    )
    .map_err(|e| Error::ComputeFailed {
        metric: "ssimulacra2".to_string(),
        reason: format!("failed to create frame: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> PixelBuffer {
        let data: Vec<u8> = (0..width * height * 3).map(|i| (i % 256) as u8).collect();
        PixelBuffer::from_raw(width, height, 3, data).unwrap()
    }

    #[test]
    fn test_identical_scores_high() {
        let img = gradient(64, 64);
        let score = calculate(&img, &img).unwrap();
        assert!(score > 99.0, "identical images scored {score}");
    }

    #[test]
    fn test_heavy_distortion_scores_low() {
        let a = gradient(64, 64);
        let flat = PixelBuffer::from_raw(64, 64, 3, vec![128u8; 64 * 64 * 3]).unwrap();
        let score = calculate(&a, &flat).unwrap();
        assert!(score < 80.0, "flattened image scored {score}");
    }
}
