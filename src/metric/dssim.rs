//! DSSIM (structural dissimilarity) via dssim-core.

use dssim_core::Dssim;
use imgref::ImgVec;
use rgb::RGBA;

use crate::buffer::PixelBuffer;
use crate::error::{Error, Result};

/// Calculate DSSIM between two equal-size buffers.
///
/// 0 = identical; ~0.01 is barely noticeable. Alpha is ignored: both inputs
/// are compared as opaque linear-light RGB.
pub fn calculate(baseline: &PixelBuffer, candidate: &PixelBuffer) -> Result<f64> {
    debug_assert_eq!(baseline.width(), candidate.width());
    debug_assert_eq!(baseline.height(), candidate.height());

    let attr = Dssim::new();
    let ref_img = attr
        .create_image(&to_linear_rgba(baseline))
        .ok_or_else(|| Error::ComputeFailed {
            metric: "dssim".to_string(),
            reason: "failed to create reference image".to_string(),
        })?;
    let test_img = attr
        .create_image(&to_linear_rgba(candidate))
        .ok_or_else(|| Error::ComputeFailed {
            metric: "dssim".to_string(),
            reason: "failed to create test image".to_string(),
        })?;

    let (value, _maps) = attr.compare(&ref_img, test_img);
    Ok(f64::from(value))
}

/// Convert a buffer to linear-light RGBA f32 (alpha forced to 1.0).
fn to_linear_rgba(buffer: &PixelBuffer) -> ImgVec<RGBA<f32>> {
    let rgb = buffer.to_rgb8_vec();
    let pixels: Vec<RGBA<f32>> = rgb
        .chunks_exact(3)
        .map(|p| RGBA {
            r: srgb_to_linear(p[0]),
            g: srgb_to_linear(p[1]),
            b: srgb_to_linear(p[2]),
            a: 1.0,
        })
        .collect();
    ImgVec::new(pixels, buffer.width() as usize, buffer.height() as usize)
}

/// sRGB gamma decode (sRGB u8 -> linear f32).
#[inline]
fn srgb_to_linear(srgb: u8) -> f32 {
    let s = f32::from(srgb) / 255.0;
    if s <= 0.04045 {
        s / 12.92
    } else {
        ((s + 0.055) / 1.055).powf(2.4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32, seed: u8) -> PixelBuffer {
        let data: Vec<u8> = (0..width * height)
            .flat_map(|i| {
                let v = (i as usize + seed as usize) % 256;
                [v as u8, (v + 40) as u8, (v + 90) as u8]
            })
            .collect();
        PixelBuffer::from_raw(width, height, 3, data).unwrap()
    }

    #[test]
    fn test_identical_near_zero() {
        let img = gradient(64, 64, 0);
        let value = calculate(&img, &img).unwrap();
        assert!(value < 1e-4, "identical images scored {value}");
    }

    #[test]
    fn test_single_pixel_change_is_positive() {
        let a = gradient(64, 64, 0);
        let mut b = a.clone();
        b.data_mut()[0] = b.data()[0].wrapping_add(120);
        let value = calculate(&a, &b).unwrap();
        assert!(value > 0.0);
    }

    #[test]
    fn test_srgb_linear_endpoints() {
        assert!((srgb_to_linear(0) - 0.0).abs() < 1e-7);
        assert!((srgb_to_linear(255) - 1.0).abs() < 1e-5);
    }
}
