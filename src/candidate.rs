//! Encoded candidates and the per-format generator.

use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::buffer::PixelBuffer;
use crate::codec;
use crate::error::{ExitKind, Result};
use crate::format::ImageFormat;
use crate::job::Job;
use crate::metric::{self, MetricKind};
use crate::search;

/// One encoded result for a single `(format, quality)` choice.
///
/// Plain record value; candidates are cloned (deep copy) when they outlive
/// the vector that produced them.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Encoded format.
    pub format: ImageFormat,
    /// Encoded output, owned.
    pub bytes: Vec<u8>,
    /// `bytes.len()`, memoized for ranking.
    pub file_size: usize,
    /// Quality the encoder ran at. The original-baseline candidate uses 100
    /// as a sentinel; it is not a re-encoded value.
    pub quality: u8,
    /// Perceptual distance to the decoded baseline (0 = identical).
    pub diff_score: f64,
    /// Whether the candidate fit the byte budget. The quality gate is
    /// evaluated at selection time, not here.
    pub passed_constraints: bool,
    /// Wall-clock encode time (all search iterations included).
    pub encoding_time: Duration,
}

/// Output of one candidate-generation pass.
#[derive(Debug)]
pub struct GeneratedCandidates {
    /// One candidate per format that encoded successfully, in job order.
    pub candidates: Vec<Candidate>,
    /// Per-format failures and alpha-drop notes.
    pub warnings: Vec<String>,
    /// Total encode wall-clock across formats.
    pub encode_time: Duration,
    /// Total metric wall-clock across formats.
    pub metric_time: Duration,
}

struct FormatOutcome {
    candidate: Option<Candidate>,
    warnings: Vec<String>,
    encode_time: Duration,
    metric_time: Duration,
}

/// Produce one best-under-budget candidate per requested format.
///
/// Encoder failures (including strict-budget misses) become warnings and the
/// remaining formats continue. Metric failures abort the image: without a
/// score the quality gate cannot be evaluated.
pub fn generate(buffer: &PixelBuffer, job: &Job) -> Result<GeneratedCandidates> {
    debug_assert!(!job.formats.is_empty(), "job validated before generation");

    let run = |format: &ImageFormat| run_format(buffer, job, *format);
    let outcomes: Vec<Result<FormatOutcome>> = if job.concurrency > 1 {
        job.formats.par_iter().map(run).collect()
    } else {
        job.formats.iter().map(run).collect()
    };

    let mut generated = GeneratedCandidates {
        candidates: Vec::with_capacity(job.formats.len()),
        warnings: Vec::new(),
        encode_time: Duration::ZERO,
        metric_time: Duration::ZERO,
    };
    for outcome in outcomes {
        let outcome = outcome?;
        generated.warnings.extend(outcome.warnings);
        generated.encode_time += outcome.encode_time;
        generated.metric_time += outcome.metric_time;
        if let Some(candidate) = outcome.candidate {
            generated.candidates.push(candidate);
        }
    }

    debug_assert!(generated.candidates.len() <= job.formats.len());
    Ok(generated)
}

fn run_format(buffer: &PixelBuffer, job: &Job, format: ImageFormat) -> Result<FormatOutcome> {
    let mut warnings = Vec::new();
    if buffer.has_alpha() && !format.supports_alpha() {
        warnings.push(format!(
            "{format} does not support transparency; alpha channel dropped"
        ));
    }

    let encode_start = Instant::now();
    let encoded = match job.max_bytes {
        Some(target) => {
            search::search(buffer, format, target as usize, &job.search).map(|outcome| {
                warnings.extend(outcome.warnings);
                (outcome.bytes, outcome.quality)
            })
        }
        None => {
            let quality = format.default_quality();
            codec::encode(buffer, format, quality).map(|bytes| (bytes, quality))
        }
    };
    let encode_time = encode_start.elapsed();

    let (bytes, quality) = match encoded {
        Ok(pair) => pair,
        Err(e) if e.exit_kind() == ExitKind::Metric => return Err(e),
        Err(e) => {
            tracing::warn!(format = format.as_str(), error = %e, "encoder failed");
            warnings.push(format!("Failed to encode {format}: {e}"));
            return Ok(FormatOutcome {
                candidate: None,
                warnings,
                encode_time,
                metric_time: Duration::ZERO,
            });
        }
    };

    let mut metric_time = Duration::ZERO;
    let diff_score = if job.metric == MetricKind::None {
        0.0
    } else {
        let metric_start = Instant::now();
        let decoded = codec::decode_bytes(&bytes)?;
        let score = metric::diff(buffer, &decoded, job.metric)?;
        metric_time = metric_start.elapsed();
        score
    };

    let file_size = bytes.len();
    debug_assert!(file_size > 0, "verified encoder output cannot be empty");
    let passed_constraints = job.max_bytes.is_none_or(|mb| file_size <= mb as usize);

    Ok(FormatOutcome {
        candidate: Some(Candidate {
            format,
            bytes,
            file_size,
            quality,
            diff_score,
            passed_constraints,
            encoding_time: encode_time,
        }),
        warnings,
        encode_time,
        metric_time,
    })
}
