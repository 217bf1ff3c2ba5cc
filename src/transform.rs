//! Pre-encode pixel transforms: resize-to-fit and sharpening.

use image::DynamicImage;
use image::imageops::FilterType;

/// Transform parameters carried by a [`crate::job::Job`].
#[derive(Debug, Clone)]
pub struct TransformOptions {
    /// Fit within this width, preserving aspect ratio. Never upscales.
    pub max_width: Option<u32>,
    /// Fit within this height, preserving aspect ratio. Never upscales.
    pub max_height: Option<u32>,
    /// Unsharp-mask sigma; applied after any resize.
    pub sharpen: Option<f32>,
    /// Apply the EXIF Orientation tag during decode.
    pub auto_orient: bool,
    /// Keep the embedded ICC profile attached to the metadata instead of
    /// discarding it after the sRGB conversion.
    pub keep_icc: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            max_width: None,
            max_height: None,
            sharpen: None,
            auto_orient: true,
            keep_icc: false,
        }
    }
}

impl TransformOptions {
    /// Whether any pixel-level transform is requested.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.max_width.is_none() && self.max_height.is_none() && self.sharpen.is_none()
    }
}

/// Apply resize and sharpen to a decoded image.
///
/// Resize fits within the requested box with Lanczos3 and never upscales;
/// inputs already inside the box pass through untouched.
pub fn apply(img: DynamicImage, options: &TransformOptions) -> DynamicImage {
    let mut img = img;

    if options.max_width.is_some() || options.max_height.is_some() {
        let bound_w = options.max_width.unwrap_or(u32::MAX);
        let bound_h = options.max_height.unwrap_or(u32::MAX);
        if img.width() > bound_w || img.height() > bound_h {
            let before = (img.width(), img.height());
            img = img.resize(bound_w, bound_h, FilterType::Lanczos3);
            debug_assert!(img.width() <= bound_w && img.height() <= bound_h);
            tracing::debug!(?before, after = ?(img.width(), img.height()), "resized");
        }
    }

    if let Some(sigma) = options.sharpen {
        if sigma > 0.0 {
            img = img.unsharpen(sigma, 1);
        }
    }

    img
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn test_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 64])
        }))
    }

    #[test]
    fn test_resize_fits_box() {
        let options = TransformOptions {
            max_width: Some(50),
            max_height: Some(50),
            ..TransformOptions::default()
        };
        let out = apply(test_image(200, 100), &options);
        assert_eq!((out.width(), out.height()), (50, 25));
    }

    #[test]
    fn test_resize_never_upscales() {
        let options = TransformOptions {
            max_width: Some(500),
            max_height: Some(500),
            ..TransformOptions::default()
        };
        let out = apply(test_image(100, 80), &options);
        assert_eq!((out.width(), out.height()), (100, 80));
    }

    #[test]
    fn test_noop_detection() {
        assert!(TransformOptions::default().is_noop());
        let opts = TransformOptions {
            sharpen: Some(1.0),
            ..TransformOptions::default()
        };
        assert!(!opts.is_noop());
    }

    #[test]
    fn test_sharpen_preserves_dimensions() {
        let options = TransformOptions {
            sharpen: Some(1.5),
            ..TransformOptions::default()
        };
        let out = apply(test_image(40, 30), &options);
        assert_eq!((out.width(), out.height()), (40, 30));
    }
}
