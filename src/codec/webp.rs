//! WebP encoding via libwebp.

use crate::buffer::PixelBuffer;
use crate::error::{Error, Result};

/// Encode pixels as lossy WebP at the given quality.
///
/// RGBA buffers keep their alpha channel; RGB buffers take the cheaper
/// three-channel path.
pub(super) fn encode(buffer: &PixelBuffer, quality: u8) -> Result<Vec<u8>> {
    let width = buffer.width();
    let height = buffer.height();
    debug_assert!(quality <= 100);

    let mem = if buffer.has_alpha() {
        debug_assert_eq!(buffer.data().len(), width as usize * height as usize * 4);
        ::webp::Encoder::from_rgba(buffer.data(), width, height).encode(f32::from(quality))
    } else {
        debug_assert_eq!(buffer.data().len(), width as usize * height as usize * 3);
        ::webp::Encoder::from_rgb(buffer.data(), width, height).encode(f32::from(quality))
    };

    let bytes = mem.to_vec();
    if bytes.is_empty() {
        return Err(Error::EncodeFailed {
            format: "webp".to_string(),
            reason: "libwebp returned an empty buffer".to_string(),
        });
    }
    Ok(bytes)
}
