//! Per-image work order.

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::format::ImageFormat;
use crate::metric::MetricKind;
use crate::search::SearchOptions;
use crate::transform::TransformOptions;

/// Everything the orchestrator needs to optimize one image.
#[derive(Debug, Clone)]
pub struct Job {
    /// Input file to optimize.
    pub input_path: PathBuf,
    /// Destination for the winning bytes; `None` when the caller only wants
    /// the in-memory result.
    pub output_path: Option<PathBuf>,
    /// Hard byte ceiling. When unset, each format encodes once at its
    /// default quality and no search runs.
    pub max_bytes: Option<u32>,
    /// Perceptual-distance ceiling under `metric`. Unset (or `metric` none)
    /// disables the quality gate.
    pub max_diff: Option<f64>,
    /// Target formats, in order. Must be non-empty.
    pub formats: Vec<ImageFormat>,
    /// Metric backing the quality gate.
    pub metric: MetricKind,
    /// Advisory worker count for the per-format candidate fan-out. 1 means
    /// serial.
    pub concurrency: usize,
    /// Resize / sharpen / ICC / EXIF handling.
    pub transform: TransformOptions,
    /// Quality-search tunables.
    pub search: SearchOptions,
}

impl Job {
    /// A job with default constraints for the given input and formats.
    #[must_use]
    pub fn new(input_path: impl Into<PathBuf>, formats: Vec<ImageFormat>) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: None,
            max_bytes: None,
            max_diff: None,
            formats,
            metric: MetricKind::None,
            concurrency: 1,
            transform: TransformOptions::default(),
            search: SearchOptions::default(),
        }
    }

    /// Validate invariants the orchestrator depends on.
    ///
    /// # Errors
    ///
    /// Rejects an empty format list, non-encode targets, and a `max_diff`
    /// that is negative or NaN.
    pub fn validate(&self) -> Result<()> {
        if self.formats.is_empty() {
            return Err(Error::UnsupportedFormat(
                "no target formats requested".to_string(),
            ));
        }
        for format in &self.formats {
            if !format.is_encode_target() {
                return Err(Error::UnsupportedFormat(format.to_string()));
            }
        }
        if let Some(max_diff) = self.max_diff {
            if max_diff.is_nan() || max_diff < 0.0 {
                return Err(Error::ComputeFailed {
                    metric: self.metric.to_string(),
                    reason: format!("max_diff {max_diff} is not a non-negative number"),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_empty_formats() {
        let job = Job::new("in.png", vec![]);
        assert!(job.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_target() {
        let job = Job::new("in.png", vec![ImageFormat::Unknown]);
        assert!(job.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_nan_diff() {
        let mut job = Job::new("in.png", vec![ImageFormat::Jpeg]);
        job.max_diff = Some(f64::NAN);
        assert!(job.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_defaults() {
        let job = Job::new("in.png", vec![ImageFormat::Jpeg, ImageFormat::Png]);
        assert!(job.validate().is_ok());
    }
}
