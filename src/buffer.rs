//! Owned raw-pixel container used between decode and encode.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::limits::{MAX_BUFFER_BYTES, MAX_DIMENSION, MAX_PIXELS};

/// Color space tag carried by a [`PixelBuffer`].
///
/// The pipeline normalizes everything to sRGB at decode time; `Linear` exists
/// for intermediate metric conversions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpace {
    /// Standard sRGB (gamma-encoded).
    #[default]
    Srgb,
    /// Linear-light RGB.
    Linear,
}

/// Interleaved 8-bit pixel buffer, RGB or RGBA.
///
/// Invariants, checked at construction and asserted in accessors:
/// - `1 <= width, height <= 65_535`
/// - `channels` is 3 or 4
/// - `stride >= width * channels`
/// - `data.len() == stride * height`
/// - `width * height <= MAX_PIXELS`, total bytes `<= MAX_BUFFER_BYTES`
///
/// Cloning is an explicit deep copy; there is no shared ownership of pixel
/// data anywhere in the pipeline.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    channels: u8,
    stride: usize,
    color_space: ColorSpace,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Allocate a zero-filled buffer.
    ///
    /// # Errors
    ///
    /// `ImageTooLarge` when dimensions violate the bomb limits, `OutOfMemory`
    /// when the allocator refuses the backing storage.
    pub fn new(width: u32, height: u32, channels: u8) -> Result<Self> {
        assert!(
            channels == 3 || channels == 4,
            "channels must be 3 or 4, got {channels}"
        );
        check_buffer_dimensions(width, height, channels)?;

        let stride = width as usize * channels as usize;
        let len = stride * height as usize;
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| Error::OutOfMemory { bytes: len })?;
        data.resize(len, 0);

        debug_assert_eq!(data.len(), stride * height as usize);
        Ok(Self {
            width,
            height,
            channels,
            stride,
            color_space: ColorSpace::default(),
            data,
        })
    }

    /// Wrap an existing interleaved pixel vector.
    ///
    /// `data.len()` must be exactly `width * height * channels`; the stride
    /// is tight.
    pub fn from_raw(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Result<Self> {
        assert!(
            channels == 3 || channels == 4,
            "channels must be 3 or 4, got {channels}"
        );
        check_buffer_dimensions(width, height, channels)?;

        let stride = width as usize * channels as usize;
        let expected = stride * height as usize;
        if data.len() != expected {
            return Err(Error::InvalidImage {
                path: std::path::PathBuf::new(),
                reason: format!(
                    "pixel data length {} does not match {}x{}x{}",
                    data.len(),
                    width,
                    height,
                    channels
                ),
            });
        }

        Ok(Self {
            width,
            height,
            channels,
            stride,
            color_space: ColorSpace::default(),
            data,
        })
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Interleaved channels per pixel (3 = RGB, 4 = RGBA).
    #[must_use]
    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Bytes per row.
    #[must_use]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Color space tag.
    #[must_use]
    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    /// Total pixel count.
    #[must_use]
    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Whether the buffer carries an alpha channel.
    #[must_use]
    pub fn has_alpha(&self) -> bool {
        self.channels == 4
    }

    /// The full interleaved pixel slice.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        debug_assert_eq!(self.data.len(), self.stride * self.height as usize);
        &self.data
    }

    /// Mutable access to the interleaved pixel slice.
    pub fn data_mut(&mut self) -> &mut [u8] {
        debug_assert_eq!(self.data.len(), self.stride * self.height as usize);
        &mut self.data
    }

    /// The `stride`-length byte slice for row `y`.
    #[must_use]
    pub fn row(&self, y: u32) -> &[u8] {
        assert!(y < self.height, "row {y} out of bounds (height {})", self.height);
        let start = y as usize * self.stride;
        &self.data[start..start + self.stride]
    }

    /// The `channels`-length byte slice for pixel `(x, y)`.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        assert!(x < self.width, "column {x} out of bounds (width {})", self.width);
        assert!(y < self.height, "row {y} out of bounds (height {})", self.height);
        let start = y as usize * self.stride + x as usize * self.channels as usize;
        &self.data[start..start + self.channels as usize]
    }

    /// Copy of the pixels as tightly packed RGB, dropping alpha if present.
    #[must_use]
    pub fn to_rgb8_vec(&self) -> Vec<u8> {
        match self.channels {
            3 => self.data.clone(),
            _ => {
                let mut rgb = Vec::with_capacity(self.width as usize * self.height as usize * 3);
                for chunk in self.data.chunks_exact(4) {
                    rgb.extend_from_slice(&chunk[..3]);
                }
                rgb
            }
        }
    }
}

/// Validate dimensions against the decompression-bomb limits.
pub fn check_buffer_dimensions(width: u32, height: u32, channels: u8) -> Result<()> {
    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(Error::ImageTooLarge {
            width,
            height,
            reason: format!("dimension outside 1..={MAX_DIMENSION}"),
        });
    }
    let pixels = u64::from(width) * u64::from(height);
    if pixels > MAX_PIXELS {
        return Err(Error::ImageTooLarge {
            width,
            height,
            reason: format!("{pixels} pixels exceeds {MAX_PIXELS}"),
        });
    }
    let bytes = pixels * u64::from(channels);
    if bytes > MAX_BUFFER_BYTES {
        return Err(Error::ImageTooLarge {
            width,
            height,
            reason: format!("{bytes} bytes exceeds {MAX_BUFFER_BYTES}"),
        });
    }
    Ok(())
}
