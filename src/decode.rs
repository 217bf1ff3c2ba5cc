//! Input loading: decode, EXIF auto-orientation, and ICC-aware sRGB
//! normalization.

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageReader};
use img_parts::ImageICC;

use crate::error::{Error, Result};
use crate::format::ImageFormat;
use crate::limits::{MAX_DIMENSION, MAX_ICC_BYTES, MAX_PIXELS, WARN_ICC_BYTES};
use crate::transform::TransformOptions;

/// Facts about an input, captured during decode.
#[derive(Debug, Clone)]
pub struct ImageMetadata {
    /// Detected input format (extension first, magic bytes as fallback).
    pub format: ImageFormat,
    /// Width before orientation was applied.
    pub original_width: u32,
    /// Height before orientation was applied.
    pub original_height: u32,
    /// Whether the decoded image carries an alpha channel.
    pub has_alpha: bool,
    /// EXIF Orientation tag value (1-8; 1 when absent).
    pub exif_orientation: u8,
    /// Embedded ICC profile, kept only when the job asks for it.
    pub icc_profile: Option<Vec<u8>>,
}

/// A decoded input ready for transforms.
#[derive(Debug)]
pub struct DecodedInput {
    /// Decoded pixels, oriented and normalized to sRGB.
    pub image: DynamicImage,
    /// Input facts.
    pub metadata: ImageMetadata,
    /// Non-fatal notes (oversized ICC, unparseable profile).
    pub warnings: Vec<String>,
}

/// Decode raw file bytes into an sRGB image.
///
/// Dimensions are validated from the header before the full decode runs, so
/// decompression bombs are rejected without allocating their pixels.
pub fn load(path: &Path, data: &[u8], options: &TransformOptions) -> Result<DecodedInput> {
    let mut format = ImageFormat::from_path(path);
    if format == ImageFormat::Unknown {
        format = ImageFormat::from_magic(data);
    }

    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| Error::LoadFailed {
            path: path.to_path_buf(),
            reason: format!("failed to read header: {e}"),
        })?;
    let (width, height) = reader.into_dimensions().map_err(|e| Error::LoadFailed {
        path: path.to_path_buf(),
        reason: format!("failed to read dimensions: {e}"),
    })?;
    validate_dimensions(path, width, height)?;

    let mut img = image::load_from_memory(data).map_err(|e| Error::LoadFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    debug_assert_eq!((img.width(), img.height()), (width, height));

    let mut warnings = Vec::new();

    let orientation = if options.auto_orient {
        let o = read_orientation(data);
        if o != 1 {
            img = apply_orientation(img, o);
            tracing::debug!(orientation = o, "applied EXIF orientation");
        }
        o
    } else {
        1
    };

    let icc = extract_icc(format, data)?;
    if let Some(profile) = &icc {
        if profile.len() > WARN_ICC_BYTES {
            warnings.push(format!(
                "ICC profile is {} bytes (above the {WARN_ICC_BYTES} byte warning threshold)",
                profile.len()
            ));
        }
        img = convert_to_srgb(img, profile, &mut warnings);
    }

    let metadata = ImageMetadata {
        format,
        original_width: width,
        original_height: height,
        has_alpha: img.color().has_alpha(),
        exif_orientation: orientation,
        icc_profile: if options.keep_icc { icc } else { None },
    };

    Ok(DecodedInput {
        image: img,
        metadata,
        warnings,
    })
}

/// Reject inputs outside the dimension envelope before pixels are allocated.
fn validate_dimensions(path: &Path, width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(Error::InvalidImage {
            path: path.to_path_buf(),
            reason: format!("dimensions {width}x{height} outside 1..={MAX_DIMENSION}"),
        });
    }
    let pixels = u64::from(width) * u64::from(height);
    if pixels > MAX_PIXELS {
        return Err(Error::InvalidImage {
            path: path.to_path_buf(),
            reason: format!("{pixels} pixels exceeds decompression limit {MAX_PIXELS}"),
        });
    }
    Ok(())
}

/// EXIF Orientation (1-8), defaulting to 1 when absent or malformed.
fn read_orientation(data: &[u8]) -> u8 {
    exif::Reader::new()
        .read_from_container(&mut Cursor::new(data))
        .ok()
        .and_then(|meta| {
            meta.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
                .and_then(|field| field.value.get_uint(0))
        })
        .and_then(|v| u8::try_from(v).ok())
        .filter(|v| (1..=8).contains(v))
        .unwrap_or(1)
}

fn apply_orientation(img: DynamicImage, orientation: u8) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

/// Pull an embedded ICC profile out of the container, enforcing the hard cap.
fn extract_icc(format: ImageFormat, data: &[u8]) -> Result<Option<Vec<u8>>> {
    let bytes = img_parts::Bytes::copy_from_slice(data);
    let profile = match format {
        ImageFormat::Jpeg => img_parts::jpeg::Jpeg::from_bytes(bytes)
            .ok()
            .and_then(|img| img.icc_profile()),
        ImageFormat::Png => img_parts::png::Png::from_bytes(bytes)
            .ok()
            .and_then(|img| img.icc_profile()),
        ImageFormat::Webp => img_parts::webp::WebP::from_bytes(bytes)
            .ok()
            .and_then(|img| img.icc_profile()),
        _ => None,
    };

    match profile {
        Some(p) if p.len() > MAX_ICC_BYTES => Err(Error::IccProfileTooLarge {
            size: p.len(),
            max: MAX_ICC_BYTES,
        }),
        Some(p) if !p.is_empty() => Ok(Some(p.to_vec())),
        _ => Ok(None),
    }
}

/// Transform pixels from an embedded profile to sRGB.
///
/// A profile moxcms cannot parse or apply is downgraded to a warning; the
/// pixels pass through untouched and are treated as sRGB.
#[cfg(feature = "icc")]
fn convert_to_srgb(img: DynamicImage, icc: &[u8], warnings: &mut Vec<String>) -> DynamicImage {
    use moxcms::{ColorProfile, Layout, TransformOptions as CmsOptions};

    let source = match ColorProfile::new_from_slice(icc) {
        Ok(p) => p,
        Err(e) => {
            warnings.push(format!("unparseable ICC profile, assuming sRGB: {e}"));
            return img;
        }
    };
    let srgb = ColorProfile::new_srgb();

    let (width, height) = (img.width(), img.height());
    if img.color().has_alpha() {
        let transform = match source.create_transform_8bit(
            Layout::Rgba,
            &srgb,
            Layout::Rgba,
            CmsOptions::default(),
        ) {
            Ok(t) => t,
            Err(e) => {
                warnings.push(format!("ICC transform unavailable, assuming sRGB: {e}"));
                return img;
            }
        };
        let source_pixels = img.to_rgba8().into_raw();
        let mut converted = vec![0u8; source_pixels.len()];
        if let Err(e) = transform.transform(&source_pixels, &mut converted) {
            warnings.push(format!("ICC transform failed, assuming sRGB: {e}"));
            return img;
        }
        match image::RgbaImage::from_raw(width, height, converted) {
            Some(rgba) => DynamicImage::ImageRgba8(rgba),
            None => img,
        }
    } else {
        let transform = match source.create_transform_8bit(
            Layout::Rgb,
            &srgb,
            Layout::Rgb,
            CmsOptions::default(),
        ) {
            Ok(t) => t,
            Err(e) => {
                warnings.push(format!("ICC transform unavailable, assuming sRGB: {e}"));
                return img;
            }
        };
        let source_pixels = img.to_rgb8().into_raw();
        let mut converted = vec![0u8; source_pixels.len()];
        if let Err(e) = transform.transform(&source_pixels, &mut converted) {
            warnings.push(format!("ICC transform failed, assuming sRGB: {e}"));
            return img;
        }
        match image::RgbImage::from_raw(width, height, converted) {
            Some(rgb) => DynamicImage::ImageRgb8(rgb),
            None => img,
        }
    }
}

#[cfg(not(feature = "icc"))]
fn convert_to_srgb(img: DynamicImage, _icc: &[u8], warnings: &mut Vec<String>) -> DynamicImage {
    warnings.push("ICC profile present but color management not compiled in".to_string());
    img
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 7])
        });
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn test_load_detects_format_and_dimensions() {
        let data = png_bytes(40, 20);
        let decoded = load(Path::new("input.png"), &data, &TransformOptions::default()).unwrap();
        assert_eq!(decoded.metadata.format, ImageFormat::Png);
        assert_eq!(decoded.metadata.original_width, 40);
        assert_eq!(decoded.metadata.original_height, 20);
        assert_eq!(decoded.metadata.exif_orientation, 1);
        assert!(decoded.metadata.icc_profile.is_none());
    }

    #[test]
    fn test_load_falls_back_to_magic_for_unknown_extension() {
        let data = png_bytes(8, 8);
        let decoded = load(Path::new("input.dat"), &data, &TransformOptions::default()).unwrap();
        assert_eq!(decoded.metadata.format, ImageFormat::Png);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let err = load(
            Path::new("junk.png"),
            b"not an image at all",
            &TransformOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::LoadFailed { .. }));
    }

    #[test]
    fn test_orientation_mapping_swaps_dimensions() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(30, 10));
        let rotated = apply_orientation(img, 6);
        assert_eq!((rotated.width(), rotated.height()), (10, 30));
    }

    #[test]
    fn test_orientation_default_for_missing_exif() {
        assert_eq!(read_orientation(&png_bytes(4, 4)), 1);
    }
}
