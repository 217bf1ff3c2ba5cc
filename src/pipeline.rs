//! Per-image orchestration: decode, candidate generation, baseline
//! injection, selection, and timings.

use std::time::{Duration, Instant};

use crate::candidate::{self, Candidate};
use crate::codec;
use crate::decode::{self, ImageMetadata};
use crate::error::{Error, ExitKind, Result};
use crate::job::Job;
use crate::metric::MetricKind;
use crate::select;
use crate::transform;

/// Wall-clock spent in each phase of one image.
#[derive(Debug, Clone, Copy, Default)]
pub struct Timings {
    /// File read plus decode plus normalization.
    pub decode: Duration,
    /// Resize/sharpen plus pixel-buffer materialization.
    pub transform: Duration,
    /// All encodes across formats and search iterations.
    pub encode_total: Duration,
    /// All metric evaluations.
    pub metrics: Duration,
    /// End-to-end for the image.
    pub total: Duration,
}

/// Outcome of optimizing one image.
#[derive(Debug)]
pub struct OptimizeResult {
    /// The winning candidate (deep copy), or `None` when nothing passed the
    /// constraints.
    pub selected: Option<Candidate>,
    /// Every attempted candidate in deterministic order: requested formats
    /// in job order, then the original baseline last.
    pub candidates: Vec<Candidate>,
    /// Per-phase wall-clock.
    pub timings: Timings,
    /// Accumulated non-fatal warnings.
    pub warnings: Vec<String>,
    /// Whether a winner was selected.
    pub success: bool,
    /// Byte size of the input file.
    pub input_size: usize,
    /// Input facts captured at decode time.
    pub metadata: ImageMetadata,
}

impl OptimizeResult {
    /// Advisory exit classification for this result.
    ///
    /// A selected winner is success; otherwise the failed constraint decides
    /// between the budget and quality exit kinds.
    #[must_use]
    pub fn exit_kind(&self, job: &Job) -> ExitKind {
        if self.success {
            return ExitKind::Success;
        }
        if let Some(max_bytes) = job.max_bytes {
            if self
                .candidates
                .iter()
                .all(|c| c.file_size > max_bytes as usize)
            {
                return ExitKind::BudgetUnmet;
            }
        }
        if job.max_diff.is_some() && job.metric != MetricKind::None {
            return ExitKind::QualityUnmet;
        }
        ExitKind::BudgetUnmet
    }
}

/// Optimize a single image from disk.
///
/// # Errors
///
/// Decode and metric failures are fatal to the image and surface here;
/// per-format encoder failures become warnings on the returned result.
pub fn optimize_file(job: &Job) -> Result<OptimizeResult> {
    let data = std::fs::read(&job.input_path).map_err(|e| Error::LoadFailed {
        path: job.input_path.clone(),
        reason: e.to_string(),
    })?;
    optimize_bytes(job, data)
}

/// Optimize a single image already loaded into memory.
pub fn optimize_bytes(job: &Job, data: Vec<u8>) -> Result<OptimizeResult> {
    job.validate()?;
    assert!(!job.formats.is_empty(), "validated job has formats");
    let total_start = Instant::now();
    let input_size = data.len();

    let decode_start = Instant::now();
    let decoded = decode::load(&job.input_path, &data, &job.transform)?;
    let decode_time = decode_start.elapsed();

    let transform_start = Instant::now();
    let image = transform::apply(decoded.image, &job.transform);
    let buffer = codec::dynamic_to_buffer(&image)?;
    drop(image);
    let transform_time = transform_start.elapsed();

    let mut warnings = decoded.warnings;
    let metadata = decoded.metadata;

    let generated = candidate::generate(&buffer, job)?;
    warnings.extend(generated.warnings);

    // Original-baseline injection: the source bytes verbatim, so the
    // optimizer can never emit output larger than its input.
    let mut candidates = generated.candidates;
    candidates.push(Candidate {
        format: metadata.format,
        file_size: input_size,
        bytes: data,
        quality: 100,
        diff_score: 0.0,
        passed_constraints: job.max_bytes.is_none_or(|mb| input_size <= mb as usize),
        encoding_time: Duration::ZERO,
    });
    debug_assert!(candidates.len() <= job.formats.len() + 1);

    let selected = select::select(&candidates, job.max_bytes, job.max_diff);
    let success = selected.is_some();

    let result = OptimizeResult {
        selected,
        candidates,
        timings: Timings {
            decode: decode_time,
            transform: transform_time,
            encode_total: generated.encode_time,
            metrics: generated.metric_time,
            total: total_start.elapsed(),
        },
        warnings,
        success,
        input_size,
        metadata,
    };

    tracing::info!(
        input = %job.input_path.display(),
        success,
        candidates = result.candidates.len(),
        winner = result.selected.as_ref().map(|c| c.format.as_str()),
        winner_bytes = result.selected.as_ref().map(|c| c.file_size),
        "optimized image"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ImageFormat;
    use std::io::Cursor;

    fn png_fixture(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([
                (x * 3 % 256) as u8,
                (y * 5 % 256) as u8,
                ((x + y) % 256) as u8,
            ])
        });
        let mut out = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn test_size_only_budget_selects_winner() {
        let data = png_fixture(128, 128);
        let mut job = Job::new("lena.png", vec![ImageFormat::Jpeg, ImageFormat::Png]);
        job.max_bytes = Some(50_000);
        let result = optimize_bytes(&job, data).unwrap();

        assert!(result.success);
        let winner = result.selected.unwrap();
        assert!(winner.file_size <= 50_000);
        assert!(matches!(winner.format, ImageFormat::Jpeg | ImageFormat::Png));
    }

    #[test]
    fn test_impossible_budget_yields_no_winner() {
        let data = png_fixture(128, 128);
        let mut job = Job::new("lena.png", vec![ImageFormat::Jpeg, ImageFormat::Png]);
        job.max_bytes = Some(100);
        let result = optimize_bytes(&job, data).unwrap();

        assert!(!result.success);
        assert!(result.selected.is_none());
        // Two encoded candidates plus the baseline.
        assert!(result.candidates.len() >= 3);
        assert_eq!(result.exit_kind(&job), ExitKind::BudgetUnmet);
    }

    #[test]
    fn test_quality_gate_winner_within_ceiling() {
        let data = png_fixture(96, 96);
        let mut job = Job::new("peppers.png", vec![ImageFormat::Webp, ImageFormat::Jpeg]);
        job.metric = MetricKind::Dssim;
        job.max_diff = Some(0.01);
        let result = optimize_bytes(&job, data).unwrap();

        assert!(result.success);
        let winner = result.selected.unwrap();
        assert!(winner.diff_score <= 0.01);
    }

    #[test]
    fn test_no_upscale_guarantee() {
        let data = png_fixture(64, 64);
        let input_size = data.len();
        let job = Job::new("already-small.png", vec![ImageFormat::Jpeg, ImageFormat::Png]);
        let result = optimize_bytes(&job, data).unwrap();

        assert!(result.success);
        assert!(result.selected.unwrap().file_size <= input_size);
    }

    #[test]
    fn test_candidate_order_is_formats_then_baseline() {
        let data = png_fixture(48, 48);
        let job = Job::new("in.png", vec![ImageFormat::Webp, ImageFormat::Jpeg]);
        let result = optimize_bytes(&job, data).unwrap();

        let formats: Vec<_> = result.candidates.iter().map(|c| c.format).collect();
        assert_eq!(
            formats,
            vec![ImageFormat::Webp, ImageFormat::Jpeg, ImageFormat::Png]
        );
        let baseline = result.candidates.last().unwrap();
        assert_eq!(baseline.quality, 100);
        assert_eq!(baseline.diff_score, 0.0);
        assert_eq!(baseline.file_size, result.input_size);
    }

    #[test]
    fn test_butteraugli_surfaces_metric_failure() {
        let data = png_fixture(32, 32);
        let mut job = Job::new("in.png", vec![ImageFormat::Jpeg]);
        job.metric = MetricKind::Butteraugli;
        job.max_diff = Some(1.0);
        let err = optimize_bytes(&job, data).unwrap_err();
        assert_eq!(err.exit_kind(), ExitKind::Metric);
    }

    #[test]
    fn test_empty_format_list_rejected() {
        let data = png_fixture(16, 16);
        let job = Job::new("in.png", vec![]);
        assert!(optimize_bytes(&job, data).is_err());
    }

    #[test]
    fn test_missing_file_is_load_failed() {
        let job = Job::new("/nonexistent/path.png", vec![ImageFormat::Jpeg]);
        let err = optimize_file(&job).unwrap_err();
        assert!(matches!(err, Error::LoadFailed { .. }));
    }
}
