//! Hard limits enforced throughout the pipeline.
//!
//! Every loop bound and size cap in the crate is a named constant here so the
//! safety envelope can be audited in one place.

/// Largest accepted width or height, in pixels.
pub const MAX_DIMENSION: u32 = 65_535;

/// Decompression-bomb ceiling on `width * height` for a decoded buffer.
pub const MAX_PIXELS: u64 = 178_000_000;

/// Ceiling on total bytes held by a single pixel buffer (4 GiB).
pub const MAX_BUFFER_BYTES: u64 = 4 * 1024 * 1024 * 1024;

/// Ceiling on `width * height` for metric inputs.
pub const MAX_METRIC_PIXELS: u64 = 500_000_000;

/// Sanity cap on a single encoder's output (100 MiB).
pub const MAX_ENCODED_BYTES: usize = 100 * 1024 * 1024;

/// Iteration bound for the quality binary search.
pub const MAX_SEARCH_ITERATIONS: u32 = 7;

/// Hard cap on an embedded ICC profile.
pub const MAX_ICC_BYTES: usize = 10 * 1024 * 1024;

/// ICC profiles above this size produce a warning.
pub const WARN_ICC_BYTES: usize = 1024 * 1024;

/// Upper bound on files accepted by one batch run.
pub const MAX_INPUT_FILES: usize = 10_000;

/// Bytes hashed per file for duplicate detection.
pub const MAX_HASH_BYTES: u64 = 100 * 1024 * 1024;

/// Directory recursion depth for input discovery.
pub const MAX_WALK_DEPTH: usize = 100;
