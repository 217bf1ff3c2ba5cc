//! Perceptual distance between a baseline and a candidate.
//!
//! All metrics share lower-is-better distance semantics: 0 means identical,
//! and a job's `max_diff` is a ceiling. SSIMULACRA2's 0-100 similarity score
//! is mapped onto that scale; see [`ssimulacra2_score_to_distance`].

pub mod dssim;
pub mod ssimulacra2;

use serde::{Deserialize, Serialize};

use crate::buffer::PixelBuffer;
use crate::error::{Error, Result};
use crate::limits::MAX_METRIC_PIXELS;

/// Which perceptual metric gates candidate quality.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Quality gate disabled; every candidate scores 0.0.
    #[default]
    None,
    /// Structural dissimilarity (dssim-core). 0 = identical, ~0.01 barely
    /// noticeable.
    Dssim,
    /// SSIMULACRA2 similarity, converted to a distance.
    Ssimulacra2,
    /// Not implemented. Always fails rather than returning 0.0, so it can
    /// never silently open the quality gate.
    Butteraugli,
}

impl MetricKind {
    /// Recommended `max_diff` ceiling for this metric.
    #[must_use]
    pub fn recommended_threshold(self) -> f64 {
        match self {
            Self::None => f64::INFINITY,
            Self::Dssim => 0.01,
            Self::Ssimulacra2 => 0.002,
            Self::Butteraugli => f64::INFINITY,
        }
    }

    /// Lowercase identifier for logs and the manifest.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Dssim => "dssim",
            Self::Ssimulacra2 => "ssimulacra2",
            Self::Butteraugli => "butteraugli",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MetricKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "dssim" => Ok(Self::Dssim),
            "ssimulacra2" => Ok(Self::Ssimulacra2),
            "butteraugli" => Ok(Self::Butteraugli),
            other => Err(Error::MetricUnsupported(other.to_string())),
        }
    }
}

/// Convert a SSIMULACRA2 score (0-100, higher is better) to a DSSIM-like
/// distance so all metrics share one threshold direction.
#[must_use]
pub fn ssimulacra2_score_to_distance(score: f64) -> f64 {
    ((100.0 - score) / 20.0).exp() * 1e-4
}

/// Perceptual distance between two equal-size buffers.
///
/// `MetricKind::None` short-circuits to 0.0 without touching the pixels.
/// The result is guaranteed finite and non-negative.
///
/// # Errors
///
/// `DimensionMismatch` when the buffers differ in size, `ComputeFailed` when
/// the inputs exceed the metric pixel cap or the backend fails, and
/// `MetricUnsupported` for butteraugli.
pub fn diff(baseline: &PixelBuffer, candidate: &PixelBuffer, kind: MetricKind) -> Result<f64> {
    if kind == MetricKind::None {
        return Ok(0.0);
    }
    if kind == MetricKind::Butteraugli {
        return Err(Error::MetricUnsupported("butteraugli".to_string()));
    }

    if baseline.width() != candidate.width() || baseline.height() != candidate.height() {
        return Err(Error::DimensionMismatch {
            expected: (baseline.width(), baseline.height()),
            actual: (candidate.width(), candidate.height()),
        });
    }
    debug_assert!(baseline.channels() >= 3 && candidate.channels() >= 3);
    if baseline.pixel_count() > MAX_METRIC_PIXELS {
        return Err(Error::ComputeFailed {
            metric: kind.to_string(),
            reason: format!(
                "{} pixels exceeds metric cap {MAX_METRIC_PIXELS}",
                baseline.pixel_count()
            ),
        });
    }

    let value = match kind {
        MetricKind::Dssim => dssim::calculate(baseline, candidate)?,
        MetricKind::Ssimulacra2 => {
            let score = ssimulacra2::calculate(baseline, candidate)?;
            ssimulacra2_score_to_distance(score)
        }
        MetricKind::None | MetricKind::Butteraugli => unreachable!("handled above"),
    };

    debug_assert!(value.is_finite(), "{kind} produced a non-finite distance");
    debug_assert!(value >= 0.0, "{kind} produced a negative distance");
    if !value.is_finite() || value < 0.0 {
        return Err(Error::ComputeFailed {
            metric: kind.to_string(),
            reason: format!("backend produced unusable value {value}"),
        });
    }
    Ok(value)
}
