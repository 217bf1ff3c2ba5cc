//! # pyjamaz
//!
//! Batch image optimizer. Given an input image and a set of constraints,
//! pyjamaz explores `{format} x {quality}` candidates (JPEG, PNG, WebP,
//! AVIF), binary-searches quality toward a byte budget, gates candidates on
//! a perceptual metric, and returns the smallest output that passes. The
//! original file is always injected as a baseline candidate, so the selected
//! output can never be larger than the source.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pyjamaz::{ImageFormat, Job, MetricKind, optimize_file};
//!
//! let mut job = Job::new("photo.png", vec![ImageFormat::Webp, ImageFormat::Jpeg]);
//! job.max_bytes = Some(50_000);
//! job.metric = MetricKind::Dssim;
//! job.max_diff = Some(0.01);
//!
//! let result = optimize_file(&job)?;
//! if let Some(winner) = result.selected {
//!     std::fs::write("photo.webp", &winner.bytes)?;
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`]: Error taxonomy and exit-code mapping
//! - [`buffer`]: Owned pixel buffer with dimension invariants
//! - [`format`]: Closed format enum and per-format rules
//! - [`codec`]: Encode/decode facade over the codec crates
//! - [`metric`]: Perceptual distance (DSSIM, SSIMULACRA2)
//! - [`search`]: Bounded binary search on quality toward a byte target
//! - [`candidate`]: Per-format candidate generation
//! - [`select`]: Constraint filtering and tie-broken winner selection
//! - [`pipeline`]: Per-image orchestration
//! - [`batch`]: Input discovery, output writing, parallel batch loop
//! - [`manifest`]: JSONL record types

pub mod batch;
pub mod buffer;
pub mod candidate;
pub mod codec;
pub mod decode;
pub mod error;
pub mod format;
pub mod job;
pub mod limits;
pub mod manifest;
pub mod metric;
pub mod pipeline;
pub mod search;
pub mod select;
pub mod transform;

// Re-export commonly used types
pub use batch::{BatchOptions, BatchSummary, discover_inputs, run_batch};
pub use buffer::{ColorSpace, PixelBuffer};
pub use candidate::Candidate;
pub use decode::ImageMetadata;
pub use error::{Error, ExitKind, Result};
pub use format::ImageFormat;
pub use job::Job;
pub use manifest::ManifestEntry;
pub use metric::MetricKind;
pub use pipeline::{OptimizeResult, Timings, optimize_bytes, optimize_file};
pub use search::{SearchOptions, SearchOutcome};
pub use transform::TransformOptions;
