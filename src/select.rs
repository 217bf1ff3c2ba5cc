//! Constraint filtering and winner selection.

use std::cmp::Ordering;

use crate::candidate::Candidate;

/// Pick the winning candidate, if any survives the constraints.
///
/// Filter: drop candidates over `max_bytes` or over `max_diff` (when set).
/// Rank: smaller `file_size` wins; on an exact size tie the higher format
/// preference wins (AVIF > WebP > JPEG > PNG > unknown). The winner is a
/// deep copy with a lifetime independent of the candidate vector.
///
/// The candidate list is never empty in practice because the orchestrator
/// appends the original-baseline candidate before selecting.
#[must_use]
pub fn select(
    candidates: &[Candidate],
    max_bytes: Option<u32>,
    max_diff: Option<f64>,
) -> Option<Candidate> {
    assert!(
        !candidates.is_empty(),
        "selector requires at least the baseline candidate"
    );

    let winner = candidates
        .iter()
        .filter(|c| passes(c, max_bytes, max_diff))
        .min_by(|a, b| rank(a, b));

    if let Some(c) = winner {
        tracing::debug!(
            format = c.format.as_str(),
            size = c.file_size,
            quality = c.quality,
            "selected candidate"
        );
    }
    winner.cloned()
}

fn passes(candidate: &Candidate, max_bytes: Option<u32>, max_diff: Option<f64>) -> bool {
    if let Some(mb) = max_bytes {
        if candidate.file_size > mb as usize {
            return false;
        }
    }
    if let Some(md) = max_diff {
        if candidate.diff_score > md {
            return false;
        }
    }
    true
}

/// Total order on surviving candidates: size ascending, then format
/// preference descending.
fn rank(a: &Candidate, b: &Candidate) -> Ordering {
    a.file_size
        .cmp(&b.file_size)
        .then_with(|| b.format.preference().cmp(&a.format.preference()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ImageFormat;
    use std::time::Duration;

    fn candidate(format: ImageFormat, size: usize, diff: f64) -> Candidate {
        Candidate {
            format,
            bytes: vec![0u8; size],
            file_size: size,
            quality: 80,
            diff_score: diff,
            passed_constraints: true,
            encoding_time: Duration::ZERO,
        }
    }

    #[test]
    fn test_smallest_size_wins() {
        let candidates = vec![
            candidate(ImageFormat::Jpeg, 900, 0.001),
            candidate(ImageFormat::Png, 700, 0.0),
            candidate(ImageFormat::Webp, 800, 0.002),
        ];
        let winner = select(&candidates, None, None).unwrap();
        assert_eq!(winner.format, ImageFormat::Png);
        assert_eq!(winner.file_size, 700);
    }

    #[test]
    fn test_tie_break_prefers_modern_format() {
        let candidates = vec![
            candidate(ImageFormat::Png, 800, 0.0),
            candidate(ImageFormat::Webp, 800, 0.001),
        ];
        let winner = select(&candidates, None, None).unwrap();
        assert_eq!(winner.format, ImageFormat::Webp);

        let candidates = vec![
            candidate(ImageFormat::Webp, 800, 0.0),
            candidate(ImageFormat::Avif, 800, 0.0),
            candidate(ImageFormat::Jpeg, 800, 0.0),
        ];
        let winner = select(&candidates, None, None).unwrap();
        assert_eq!(winner.format, ImageFormat::Avif);
    }

    #[test]
    fn test_budget_filter() {
        let candidates = vec![
            candidate(ImageFormat::Jpeg, 900, 0.0),
            candidate(ImageFormat::Webp, 1200, 0.0),
        ];
        let winner = select(&candidates, Some(1000), None).unwrap();
        assert_eq!(winner.format, ImageFormat::Jpeg);

        assert!(select(&candidates, Some(100), None).is_none());
    }

    #[test]
    fn test_quality_gate_filter() {
        let candidates = vec![
            candidate(ImageFormat::Jpeg, 700, 0.05),
            candidate(ImageFormat::Webp, 900, 0.001),
        ];
        let winner = select(&candidates, None, Some(0.01)).unwrap();
        assert_eq!(winner.format, ImageFormat::Webp);
    }

    #[test]
    fn test_winner_is_deep_copy() {
        let candidates = vec![candidate(ImageFormat::Jpeg, 10, 0.0)];
        let winner = select(&candidates, None, None).unwrap();
        drop(candidates);
        assert_eq!(winner.bytes.len(), 10);
    }

    #[test]
    #[should_panic(expected = "baseline candidate")]
    fn test_empty_candidates_panics() {
        let _ = select(&[], None, None);
    }
}
