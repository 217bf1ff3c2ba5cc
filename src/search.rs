//! Bounded binary search on encoder quality toward a byte target.

use std::time::Instant;

use crate::buffer::PixelBuffer;
use crate::codec;
use crate::error::{Error, Result};
use crate::format::ImageFormat;
use crate::limits::MAX_SEARCH_ITERATIONS;

/// Tunables for one quality search.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Hard iteration bound; every search terminates within this many
    /// encodes.
    pub max_iterations: u32,
    /// Fractional slack around the target that triggers early convergence.
    pub tolerance: f64,
    /// Lower quality bound; defaults to the format's minimum.
    pub quality_min: Option<u8>,
    /// Upper quality bound; defaults to the format's maximum.
    pub quality_max: Option<u8>,
    /// Warn (never cancel) when a single encode exceeds this many
    /// milliseconds.
    pub max_encode_time_ms: Option<u64>,
    /// Fail with `BudgetNotMet` instead of returning the closest over-budget
    /// candidate.
    pub strict_budget: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_iterations: MAX_SEARCH_ITERATIONS,
            tolerance: 0.01,
            quality_min: None,
            quality_max: None,
            max_encode_time_ms: None,
            strict_budget: false,
        }
    }
}

/// The best encode found by a search.
#[derive(Debug)]
pub struct SearchOutcome {
    /// Encoded output.
    pub bytes: Vec<u8>,
    /// Quality that produced it.
    pub quality: u8,
    /// `bytes.len()`, memoized.
    pub size: usize,
    /// Encodes performed.
    pub iterations: u32,
    /// Non-fatal notes (slow encodes, budget miss in non-strict mode).
    pub warnings: Vec<String>,
}

/// Whether a fresh candidate should replace the best seen so far.
///
/// A candidate at or under budget beats every over-budget one. Between two
/// under-budget candidates the larger wins: it wastes less of the budget,
/// which means it kept more quality. Between two over-budget candidates the
/// smaller (closer to budget) wins.
fn beats_best(size: usize, best_size: usize, target: usize) -> bool {
    match (size <= target, best_size <= target) {
        (true, false) => true,
        (false, true) => false,
        (true, true) => size > best_size,
        (false, false) => size < best_size,
    }
}

/// Binary-search integer quality so the encoded size lands at or under
/// `target_bytes`.
///
/// Terminates on: the iteration cap, convergence (under target and within
/// `tolerance` of it), window collapse, or a midpoint at the 0/100 quality
/// boundary. Exactly one "best" buffer is owned across iterations; losing
/// midpoints are dropped immediately.
///
/// # Errors
///
/// Propagates encoder errors, and returns `BudgetNotMet` when
/// `strict_budget` is set and even the best candidate exceeds the target.
pub fn search(
    buffer: &PixelBuffer,
    format: ImageFormat,
    target_bytes: usize,
    options: &SearchOptions,
) -> Result<SearchOutcome> {
    let (fmt_min, fmt_max) = format.quality_range();
    let lo = options.quality_min.unwrap_or(fmt_min).clamp(fmt_min, fmt_max);
    let hi = options.quality_max.unwrap_or(fmt_max).clamp(fmt_min, fmt_max);
    if lo > hi {
        return Err(Error::InvalidQuality {
            format: format.to_string(),
            quality: lo,
            min: fmt_min,
            max: fmt_max,
        });
    }
    let max_iterations = options.max_iterations.max(1);
    let mut q_min = lo;
    let mut q_max = hi;
    let mut best: Option<(Vec<u8>, u8)> = None;
    let mut iterations = 0u32;
    let mut warnings = Vec::new();

    while q_min <= q_max && iterations < max_iterations {
        iterations += 1;
        debug_assert!(q_min >= lo && q_max <= hi, "search window escaped bounds");
        let mid = q_min + (q_max - q_min) / 2;
        debug_assert!(mid >= q_min && mid <= q_max, "midpoint outside window");

        let start = Instant::now();
        let bytes = codec::encode(buffer, format, mid)?;
        let elapsed = start.elapsed();
        if let Some(limit_ms) = options.max_encode_time_ms {
            if elapsed.as_millis() as u64 > limit_ms {
                warnings.push(format!(
                    "{format} encode at quality {mid} took {}ms (limit {limit_ms}ms)",
                    elapsed.as_millis()
                ));
            }
        }

        let size = bytes.len();
        tracing::debug!(
            format = format.as_str(),
            iteration = iterations,
            quality = mid,
            size,
            target = target_bytes,
            "search step"
        );

        let replace = match &best {
            None => true,
            Some((held, _)) => beats_best(size, held.len(), target_bytes),
        };
        if replace {
            best = Some((bytes, mid));
        }

        let within_tolerance = size <= target_bytes
            && (target_bytes - size) as f64 <= options.tolerance * target_bytes as f64;
        if within_tolerance {
            break;
        }
        if mid == 0 || mid == 100 {
            break;
        }

        if size > target_bytes {
            if mid == q_min {
                break;
            }
            q_max = mid - 1;
        } else {
            if mid == q_max {
                break;
            }
            q_min = mid + 1;
        }
    }

    debug_assert!(iterations <= max_iterations);
    let (bytes, quality) = best.expect("at least one encode ran");
    let size = bytes.len();

    if size > target_bytes {
        if options.strict_budget {
            return Err(Error::BudgetNotMet {
                format: format.to_string(),
                best_size: size,
                target_bytes,
            });
        }
        warnings.push(format!(
            "{format}: best candidate is {size} bytes, over the {target_bytes} byte budget"
        ));
    }

    Ok(SearchOutcome {
        bytes,
        quality,
        size,
        iterations,
        warnings,
    })
}
