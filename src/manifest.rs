//! Per-image manifest records, serialized as JSONL by batch consumers.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::format::ImageFormat;
use crate::job::Job;
use crate::metric::MetricKind;
use crate::pipeline::{OptimizeResult, Timings};

/// One attempted candidate, as recorded in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlternateEntry {
    /// Candidate format.
    pub format: ImageFormat,
    /// Encoded size in bytes.
    pub bytes: usize,
    /// Perceptual distance to the baseline.
    pub diff: f64,
    /// Whether the candidate passed every active constraint.
    pub passed: bool,
    /// Why the candidate was rejected, when it was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Per-phase timings in milliseconds.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TimingsMs {
    /// Decode phase.
    pub decode: f64,
    /// Transform phase.
    pub transform: f64,
    /// Sum of all encodes.
    pub encode_total: f64,
    /// Sum of all metric evaluations.
    pub metrics: f64,
}

impl From<Timings> for TimingsMs {
    fn from(t: Timings) -> Self {
        Self {
            decode: t.decode.as_secs_f64() * 1000.0,
            transform: t.transform.as_secs_f64() * 1000.0,
            encode_total: t.encode_total.as_secs_f64() * 1000.0,
            metrics: t.metrics.as_secs_f64() * 1000.0,
        }
    }
}

/// One manifest line: everything a consumer needs to audit one image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Input path as given.
    pub input: String,
    /// Output path, when the winner was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Winner size in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<usize>,
    /// Winner format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<ImageFormat>,
    /// Metric that gated quality.
    pub diff_metric: MetricKind,
    /// Winner's perceptual distance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff_value: Option<f64>,
    /// Requested byte ceiling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_bytes: Option<u32>,
    /// Requested quality ceiling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_diff: Option<f64>,
    /// Whether a winner was selected.
    pub passed: bool,
    /// Every attempted candidate.
    pub alternates: Vec<AlternateEntry>,
    /// Per-phase timings in milliseconds.
    pub timings_ms: TimingsMs,
    /// Accumulated non-fatal warnings.
    pub warnings: Vec<String>,
    /// When the record was produced (RFC3339).
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ManifestEntry {
    /// Build a manifest record from an optimization result.
    #[must_use]
    pub fn from_result(job: &Job, result: &OptimizeResult, output: Option<String>) -> Self {
        let alternates = result
            .candidates
            .iter()
            .map(|c| {
                let reason = rejection_reason(job, c.file_size, c.diff_score);
                AlternateEntry {
                    format: c.format,
                    bytes: c.file_size,
                    diff: c.diff_score,
                    passed: reason.is_none(),
                    reason,
                }
            })
            .collect();

        Self {
            input: job.input_path.display().to_string(),
            output,
            bytes: result.selected.as_ref().map(|c| c.file_size),
            format: result.selected.as_ref().map(|c| c.format),
            diff_metric: job.metric,
            diff_value: result.selected.as_ref().map(|c| c.diff_score),
            budget_bytes: job.max_bytes,
            max_diff: job.max_diff,
            passed: result.success,
            alternates,
            timings_ms: result.timings.into(),
            warnings: result.warnings.clone(),
            timestamp: chrono::Utc::now(),
        }
    }

    /// Build a manifest record for an image that failed outright.
    #[must_use]
    pub fn from_failure(job: &Job, error: &crate::error::Error) -> Self {
        Self {
            input: job.input_path.display().to_string(),
            output: None,
            bytes: None,
            format: None,
            diff_metric: job.metric,
            diff_value: None,
            budget_bytes: job.max_bytes,
            max_diff: job.max_diff,
            passed: false,
            alternates: Vec::new(),
            timings_ms: TimingsMs::default(),
            warnings: vec![error.to_string()],
            timestamp: chrono::Utc::now(),
        }
    }

    /// Serialize as one JSONL line (no trailing newline).
    pub fn to_jsonl(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

fn rejection_reason(job: &Job, file_size: usize, diff_score: f64) -> Option<String> {
    if let Some(mb) = job.max_bytes {
        if file_size > mb as usize {
            return Some(format!("over byte budget ({file_size} > {mb})"));
        }
    }
    if let Some(md) = job.max_diff {
        if diff_score > md {
            return Some(format!("above quality ceiling ({diff_score:.6} > {md})"));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::Candidate;
    use crate::decode::ImageMetadata;
    use std::time::Duration;

    fn result_with_candidates(candidates: Vec<Candidate>, selected: Option<Candidate>) -> OptimizeResult {
        let success = selected.is_some();
        OptimizeResult {
            selected,
            candidates,
            timings: Timings::default(),
            warnings: vec!["a warning".to_string()],
            success,
            input_size: 1000,
            metadata: ImageMetadata {
                format: ImageFormat::Png,
                original_width: 10,
                original_height: 10,
                has_alpha: false,
                exif_orientation: 1,
                icc_profile: None,
            },
        }
    }

    fn candidate(format: ImageFormat, size: usize) -> Candidate {
        Candidate {
            format,
            bytes: vec![0; size],
            file_size: size,
            quality: 80,
            diff_score: 0.002,
            passed_constraints: true,
            encoding_time: Duration::ZERO,
        }
    }

    #[test]
    fn test_entry_round_trips_through_json() {
        let mut job = Job::new("in.png", vec![ImageFormat::Jpeg]);
        job.max_bytes = Some(500);
        let winner = candidate(ImageFormat::Jpeg, 400);
        let result = result_with_candidates(
            vec![winner.clone(), candidate(ImageFormat::Png, 900)],
            Some(winner),
        );

        let entry = ManifestEntry::from_result(&job, &result, Some("out.jpg".to_string()));
        let line = entry.to_jsonl().unwrap();
        assert!(!line.contains('\n'));

        let parsed: ManifestEntry = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed.bytes, Some(400));
        assert_eq!(parsed.format, Some(ImageFormat::Jpeg));
        assert!(parsed.passed);
        assert_eq!(parsed.alternates.len(), 2);
        assert!(parsed.alternates[0].passed);
        assert!(!parsed.alternates[1].passed);
        assert!(parsed.alternates[1].reason.as_ref().unwrap().contains("budget"));
    }

    #[test]
    fn test_failure_entry_carries_error() {
        let job = Job::new("in.png", vec![ImageFormat::Jpeg]);
        let err = crate::error::Error::MetricUnsupported("butteraugli".to_string());
        let entry = ManifestEntry::from_failure(&job, &err);
        assert!(!entry.passed);
        assert!(entry.warnings[0].contains("butteraugli"));
    }
}
