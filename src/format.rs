//! Image format identification and per-format encoding rules.
//!
//! The format set is a closed enum; all per-format behavior (quality ranges,
//! alpha support, magic signatures, selection preference) dispatches through
//! a `match` here rather than a trait hierarchy.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Closed set of formats the pipeline understands.
///
/// `Unknown` covers inputs the decoder may still accept (e.g. TIFF) but that
/// are never an encode target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// JPEG (lossy, no alpha).
    Jpeg,
    /// PNG (lossless, quality maps to compression effort).
    Png,
    /// WebP (lossy, alpha-capable).
    Webp,
    /// AVIF (lossy, alpha-capable).
    Avif,
    /// Anything else the decoder accepts.
    Unknown,
}

impl ImageFormat {
    /// All supported encode targets, in default preference order.
    pub const ENCODE_TARGETS: [ImageFormat; 4] = [Self::Avif, Self::Webp, Self::Jpeg, Self::Png];

    /// Detect format from a path's extension (lowercased).
    ///
    /// Unknown extensions fall through to `Unknown`; the decoder gets the
    /// final say on those.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "jpg" | "jpeg" => Self::Jpeg,
            "png" => Self::Png,
            "webp" => Self::Webp,
            "avif" => Self::Avif,
            _ => Self::Unknown,
        }
    }

    /// Detect format from leading file bytes.
    #[must_use]
    pub fn from_magic(data: &[u8]) -> Self {
        if data.starts_with(&[0xFF, 0xD8]) {
            Self::Jpeg
        } else if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            Self::Png
        } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            Self::Webp
        } else if data.len() >= 12 && &data[4..8] == b"ftyp" && (&data[8..12] == b"avif" || &data[8..12] == b"avis") {
            Self::Avif
        } else {
            Self::Unknown
        }
    }

    /// Whether `data` starts with this format's signature.
    ///
    /// `Unknown` never matches; callers must not treat unidentified bytes as
    /// verified output.
    #[must_use]
    pub fn matches_magic(self, data: &[u8]) -> bool {
        match self {
            Self::Unknown => false,
            _ => Self::from_magic(data) == self,
        }
    }

    /// Whether the pipeline can encode into this format.
    #[must_use]
    pub fn is_encode_target(self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Whether the encoded form can carry an alpha channel.
    #[must_use]
    pub fn supports_alpha(self) -> bool {
        match self {
            Self::Png | Self::Webp | Self::Avif => true,
            Self::Jpeg | Self::Unknown => false,
        }
    }

    /// Default quality when no byte budget forces a search.
    ///
    /// For PNG the value is a compression effort level, not a lossy quality.
    #[must_use]
    pub fn default_quality(self) -> u8 {
        match self {
            Self::Jpeg => 85,
            Self::Webp => 80,
            Self::Avif => 75,
            Self::Png => 6,
            Self::Unknown => 0,
        }
    }

    /// Inclusive quality range accepted by the encoder.
    #[must_use]
    pub fn quality_range(self) -> (u8, u8) {
        match self {
            Self::Jpeg => (1, 100),
            Self::Webp | Self::Avif => (0, 100),
            Self::Png => (0, 9),
            Self::Unknown => (0, 0),
        }
    }

    /// Selection preference on exact size ties: higher wins.
    ///
    /// Modern formats are preferred because at equal bytes they almost always
    /// carry more visual quality.
    #[must_use]
    pub fn preference(self) -> u8 {
        match self {
            Self::Avif => 4,
            Self::Webp => 3,
            Self::Jpeg => 2,
            Self::Png => 1,
            Self::Unknown => 0,
        }
    }

    /// Canonical output file extension.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Avif => "avif",
            Self::Unknown => "bin",
        }
    }

    /// Lowercase identifier used in logs, warnings, and the manifest.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Avif => "avif",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ImageFormat {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "webp" => Ok(Self::Webp),
            "avif" => Ok(Self::Avif),
            other => Err(crate::error::Error::UnsupportedFormat(other.to_string())),
        }
    }
}
