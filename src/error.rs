//! Error types for the optimization pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pyjamaz operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while optimizing an image.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The decoded image violates a structural limit (dimensions, pixel
    /// count, malformed data).
    #[error("Invalid image: {path}: {reason}")]
    InvalidImage {
        /// Path to the offending input.
        path: PathBuf,
        /// Reason for the rejection.
        reason: String,
    },

    /// I/O or decoder rejection while loading an input file.
    #[error("Image load failed: {path}: {reason}")]
    LoadFailed {
        /// Path to the image that failed to load.
        path: PathBuf,
        /// Reason for the failure.
        reason: String,
    },

    /// The requested format is not an encode target.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// An encoder returned zero bytes, corrupt output, or an error status.
    #[error("Failed to encode {format}: {reason}")]
    EncodeFailed {
        /// Target format identifier.
        format: String,
        /// Error message from the encoder.
        reason: String,
    },

    /// Quality setting outside the per-format range.
    #[error("Invalid quality {quality} for {format} (allowed {min}..={max})")]
    InvalidQuality {
        /// Target format identifier.
        format: String,
        /// Rejected quality value.
        quality: u8,
        /// Lower bound of the allowed range.
        min: u8,
        /// Upper bound of the allowed range.
        max: u8,
    },

    /// Metric inputs have different dimensions.
    #[error("Dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        /// Expected dimensions (width, height).
        expected: (u32, u32),
        /// Actual dimensions (width, height).
        actual: (u32, u32),
    },

    /// A perceptual metric failed to produce a usable value.
    #[error("Metric calculation failed: {metric}: {reason}")]
    ComputeFailed {
        /// Name of the metric that failed.
        metric: String,
        /// Reason for the failure.
        reason: String,
    },

    /// The requested metric has no working implementation.
    #[error("Metric not supported: {0}")]
    MetricUnsupported(String),

    /// Strict-budget search could not reach the byte target.
    #[error("Budget not met: best {format} candidate is {best_size} bytes, target {target_bytes}")]
    BudgetNotMet {
        /// Target format identifier.
        format: String,
        /// Size of the closest candidate found.
        best_size: usize,
        /// Requested byte ceiling.
        target_bytes: usize,
    },

    /// A pixel buffer would exceed the decompression-bomb limits.
    #[error("Image too large: {width}x{height}: {reason}")]
    ImageTooLarge {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
        /// Which limit was violated.
        reason: String,
    },

    /// An allocation was refused by the allocator.
    #[error("Out of memory allocating {bytes} bytes")]
    OutOfMemory {
        /// Size of the refused allocation.
        bytes: usize,
    },

    /// Embedded ICC profile exceeds the hard cap.
    #[error("ICC profile too large: {size} bytes (max {max})")]
    IccProfileTooLarge {
        /// Profile size in bytes.
        size: usize,
        /// Hard cap in bytes.
        max: usize,
    },

    /// I/O error wrapper.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Process exit classification for CLI consumers.
///
/// The library never exits; it exposes this mapping so a CLI can translate
/// per-image outcomes into the documented exit codes, and a batch can report
/// the worst code it saw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExitKind {
    /// Everything succeeded.
    #[default]
    Success = 0,
    /// Invalid command-line usage.
    Cli = 1,
    /// No candidate fit within `max_bytes`.
    BudgetUnmet = 10,
    /// No candidate passed the perceptual-quality gate.
    QualityUnmet = 11,
    /// Input could not be decoded or violated image limits.
    Decode = 12,
    /// All encoders failed, or an encoder corrupted its output.
    Encode = 13,
    /// The perceptual metric could not be evaluated.
    Metric = 14,
}

impl ExitKind {
    /// The integer exit code for this kind.
    #[must_use]
    pub fn code(self) -> i32 {
        self as i32
    }

    /// The worse (higher-numbered) of two exit kinds.
    #[must_use]
    pub fn worst(self, other: Self) -> Self {
        self.max(other)
    }
}

impl Error {
    /// Map an error to its advisory exit classification.
    #[must_use]
    pub fn exit_kind(&self) -> ExitKind {
        match self {
            Self::BudgetNotMet { .. } => ExitKind::BudgetUnmet,
            Self::InvalidImage { .. }
            | Self::LoadFailed { .. }
            | Self::ImageTooLarge { .. }
            | Self::IccProfileTooLarge { .. } => ExitKind::Decode,
            Self::EncodeFailed { .. }
            | Self::UnsupportedFormat(_)
            | Self::InvalidQuality { .. } => ExitKind::Encode,
            Self::ComputeFailed { .. }
            | Self::MetricUnsupported(_)
            | Self::DimensionMismatch { .. } => ExitKind::Metric,
            Self::Io(_) | Self::Json(_) | Self::OutOfMemory { .. } => ExitKind::Cli,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_kind_codes() {
        assert_eq!(ExitKind::Success.code(), 0);
        assert_eq!(ExitKind::BudgetUnmet.code(), 10);
        assert_eq!(ExitKind::QualityUnmet.code(), 11);
        assert_eq!(ExitKind::Decode.code(), 12);
        assert_eq!(ExitKind::Encode.code(), 13);
        assert_eq!(ExitKind::Metric.code(), 14);
    }

    #[test]
    fn test_worst_picks_higher_code() {
        assert_eq!(ExitKind::Success.worst(ExitKind::Decode), ExitKind::Decode);
        assert_eq!(
            ExitKind::Metric.worst(ExitKind::BudgetUnmet),
            ExitKind::Metric
        );
    }

    #[test]
    fn test_error_exit_mapping() {
        let err = Error::BudgetNotMet {
            format: "jpeg".to_string(),
            best_size: 60_000,
            target_bytes: 50_000,
        };
        assert_eq!(err.exit_kind(), ExitKind::BudgetUnmet);

        let err = Error::MetricUnsupported("butteraugli".to_string());
        assert_eq!(err.exit_kind(), ExitKind::Metric);
    }
}
