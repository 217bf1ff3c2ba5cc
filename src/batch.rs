//! Batch plumbing: input discovery, duplicate elimination, output writing,
//! and the parallel per-image loop.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::error::{Error, ExitKind, Result};
use crate::format::ImageFormat;
use crate::job::Job;
use crate::limits::{MAX_HASH_BYTES, MAX_INPUT_FILES, MAX_WALK_DEPTH};
use crate::manifest::ManifestEntry;
use crate::pipeline;

/// Bounded attempts at collision suffixing before giving up.
const MAX_COLLISION_SUFFIXES: u32 = 1000;

/// Extensions the decoder accepts as batch inputs.
const INPUT_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "webp", "avif", "tif", "tiff"];

/// Batch-level knobs, separate from the per-image [`Job`] template.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Directory for winning outputs; `None` skips writing.
    pub out_dir: Option<PathBuf>,
    /// JSONL manifest destination; `None` skips the manifest.
    pub manifest_path: Option<PathBuf>,
    /// Abort scheduling after the first failed image.
    pub stop_on_error: bool,
}

/// Aggregate counts for one batch run.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchSummary {
    /// Images attempted.
    pub processed: usize,
    /// Images with a selected winner.
    pub succeeded: usize,
    /// Images that errored or selected nothing.
    pub failed: usize,
    /// Images that completed with warnings.
    pub warned: usize,
    /// Worst exit kind across the batch.
    pub exit: ExitKind,
}

/// Expand files and directories into a deduplicated input list.
///
/// Directories are walked depth-first to at most [`MAX_WALK_DEPTH`] levels
/// (only when `recursive` is set); entries are visited in name order so the
/// result is deterministic. Files with identical content (FNV-1a over the
/// first [`MAX_HASH_BYTES`]) are reported once, and the total list is capped
/// at [`MAX_INPUT_FILES`].
pub fn discover_inputs(paths: &[PathBuf], recursive: bool) -> Result<(Vec<PathBuf>, Vec<String>)> {
    let mut files = Vec::new();
    let mut warnings = Vec::new();
    let mut stack: Vec<(PathBuf, usize)> = Vec::new();

    for path in paths {
        if path.is_dir() {
            stack.push((path.clone(), 0));
        } else {
            files.push(path.clone());
        }
    }

    while let Some((dir, depth)) = stack.pop() {
        assert!(depth <= MAX_WALK_DEPTH, "walk depth bound violated");
        if files.len() >= MAX_INPUT_FILES {
            break;
        }
        let mut entries: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(std::result::Result::ok)
            .map(|e| e.path())
            .collect();
        entries.sort();

        for entry in entries {
            if entry.is_dir() {
                if !recursive {
                    continue;
                }
                if depth + 1 > MAX_WALK_DEPTH {
                    warnings.push(format!(
                        "skipping {}: recursion deeper than {MAX_WALK_DEPTH}",
                        entry.display()
                    ));
                    continue;
                }
                stack.push((entry, depth + 1));
            } else if has_input_extension(&entry) {
                if files.len() >= MAX_INPUT_FILES {
                    warnings.push(format!(
                        "input cap of {MAX_INPUT_FILES} files reached; remaining entries skipped"
                    ));
                    break;
                }
                files.push(entry);
            }
        }
    }

    // Content-hash deduplication; first occurrence wins.
    let mut seen: HashMap<(u64, u64), PathBuf> = HashMap::new();
    let mut unique = Vec::with_capacity(files.len());
    for file in files {
        let key = match content_key(&file) {
            Ok(key) => key,
            Err(e) => {
                warnings.push(format!("skipping {}: {e}", file.display()));
                continue;
            }
        };
        if let Some(original) = seen.get(&key) {
            warnings.push(format!(
                "skipping {}: duplicate of {}",
                file.display(),
                original.display()
            ));
            continue;
        }
        seen.insert(key, file.clone());
        unique.push(file);
    }

    debug_assert!(unique.len() <= MAX_INPUT_FILES);
    Ok((unique, warnings))
}

fn has_input_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .is_some_and(|ext| INPUT_EXTENSIONS.contains(&ext.as_str()))
}

/// (size, FNV-1a hash of the first `MAX_HASH_BYTES`) as a dedup key.
fn content_key(path: &Path) -> Result<(u64, u64)> {
    let file = File::open(path)?;
    let size = file.metadata()?.len();
    let mut reader = BufReader::new(file);
    let mut buffer = [0u8; 8192];
    let mut remaining = MAX_HASH_BYTES;

    // FNV-1a 64-bit
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    while remaining > 0 {
        let want = buffer.len().min(usize::try_from(remaining).unwrap_or(buffer.len()));
        let read = reader.read(&mut buffer[..want])?;
        if read == 0 {
            break;
        }
        for &byte in &buffer[..read] {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        remaining -= read as u64;
    }

    Ok((size, hash))
}

/// Choose an output path next to siblings without clobbering them.
///
/// `photo.png` optimized to WebP becomes `photo.webp`, or `photo_1.webp`
/// (then `_2`, ...) when the name is taken.
pub fn resolve_output_path(input: &Path, out_dir: &Path, format: ImageFormat) -> Result<PathBuf> {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let ext = format.extension();

    let first = out_dir.join(format!("{stem}.{ext}"));
    if !first.exists() {
        return Ok(first);
    }
    for n in 1..=MAX_COLLISION_SUFFIXES {
        let candidate = out_dir.join(format!("{stem}_{n}.{ext}"));
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    Err(Error::Io(std::io::Error::other(format!(
        "no free output name for {stem}.{ext} after {MAX_COLLISION_SUFFIXES} attempts"
    ))))
}

/// Write bytes via a temp file in the target directory, then atomic rename.
pub fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    assert!(!bytes.is_empty(), "refusing to write an empty output");
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(path)
        .map_err(|e| Error::Io(e.error))?;
    Ok(())
}

struct ImageOutcome {
    entry: ManifestEntry,
    exit: ExitKind,
    succeeded: bool,
    warned: bool,
}

/// Run the optimizer over every input, in parallel when the template's
/// `concurrency` allows it.
///
/// Per-image failures never abort the batch unless `stop_on_error` is set;
/// the summary carries the worst exit kind seen.
pub fn run_batch(
    template: &Job,
    inputs: &[PathBuf],
    options: &BatchOptions,
) -> Result<BatchSummary> {
    template.validate()?;
    assert!(inputs.len() <= MAX_INPUT_FILES, "inputs exceed batch cap");

    let outcomes: Vec<ImageOutcome> = if template.concurrency > 1 && !options.stop_on_error {
        inputs
            .par_iter()
            .map(|input| process_one(template, input, options))
            .collect()
    } else {
        let mut collected = Vec::with_capacity(inputs.len());
        for input in inputs {
            let outcome = process_one(template, input, options);
            let failed = !outcome.succeeded;
            collected.push(outcome);
            if failed && options.stop_on_error {
                break;
            }
        }
        collected
    };

    let mut summary = BatchSummary::default();
    for outcome in &outcomes {
        summary.processed += 1;
        if outcome.succeeded {
            summary.succeeded += 1;
        } else {
            summary.failed += 1;
        }
        if outcome.warned {
            summary.warned += 1;
        }
        summary.exit = summary.exit.worst(outcome.exit);
    }

    if let Some(manifest_path) = &options.manifest_path {
        write_manifest(manifest_path, &outcomes)?;
    }

    Ok(summary)
}

fn process_one(template: &Job, input: &Path, options: &BatchOptions) -> ImageOutcome {
    let mut job = template.clone();
    job.input_path = input.to_path_buf();

    match pipeline::optimize_file(&job) {
        Ok(result) => {
            let mut written: Option<String> = None;
            let mut exit = result.exit_kind(&job);
            if let (Some(winner), Some(out_dir)) = (&result.selected, &options.out_dir) {
                match resolve_output_path(input, out_dir, winner.format)
                    .and_then(|path| write_output(&path, &winner.bytes).map(|()| path))
                {
                    Ok(path) => written = Some(path.display().to_string()),
                    Err(e) => {
                        tracing::warn!(input = %input.display(), error = %e, "output write failed");
                        exit = exit.worst(ExitKind::Cli);
                    }
                }
            }
            let warned = !result.warnings.is_empty();
            let succeeded = result.success && exit == ExitKind::Success;
            ImageOutcome {
                entry: ManifestEntry::from_result(&job, &result, written),
                exit,
                succeeded,
                warned,
            }
        }
        Err(e) => {
            tracing::warn!(input = %input.display(), error = %e, "image failed");
            ImageOutcome {
                entry: ManifestEntry::from_failure(&job, &e),
                exit: e.exit_kind(),
                succeeded: false,
                warned: true,
            }
        }
    }
}

fn write_manifest(path: &Path, outcomes: &[ImageOutcome]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut file = File::create(path)?;
    for outcome in outcomes {
        let line = outcome.entry.to_jsonl()?;
        writeln!(file, "{line}")?;
    }
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn write_png(path: &Path, width: u32, height: u32, seed: u8) {
        let img = image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([
                (x as u8).wrapping_add(seed),
                (y as u8).wrapping_mul(3),
                seed,
            ])
        });
        let mut out = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        std::fs::write(path, out).unwrap();
    }

    #[test]
    fn test_discover_filters_and_dedups() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("a.png"), 16, 16, 1);
        write_png(&dir.path().join("b.png"), 16, 16, 2);
        // Exact duplicate of a.png under another name.
        std::fs::copy(dir.path().join("a.png"), dir.path().join("dup.png")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not an image").unwrap();

        let (files, warnings) =
            discover_inputs(&[dir.path().to_path_buf()], false).unwrap();
        assert_eq!(files.len(), 2);
        assert!(warnings.iter().any(|w| w.contains("duplicate")));
    }

    #[test]
    fn test_discover_recurses_only_when_asked() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        write_png(&sub.join("nested.png"), 8, 8, 5);

        let (flat, _) = discover_inputs(&[dir.path().to_path_buf()], false).unwrap();
        assert!(flat.is_empty());
        let (recursive, _) = discover_inputs(&[dir.path().to_path_buf()], true).unwrap();
        assert_eq!(recursive.len(), 1);
    }

    #[test]
    fn test_resolve_output_path_suffixes_collisions() {
        let dir = tempfile::tempdir().unwrap();
        let input = Path::new("photo.png");

        let first = resolve_output_path(input, dir.path(), ImageFormat::Webp).unwrap();
        assert_eq!(first.file_name().unwrap(), "photo.webp");
        std::fs::write(&first, b"x").unwrap();

        let second = resolve_output_path(input, dir.path(), ImageFormat::Webp).unwrap();
        assert_eq!(second.file_name().unwrap(), "photo_1.webp");
    }

    #[test]
    fn test_write_output_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("deep/nested/out.jpg");
        write_output(&target, b"bytes").unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"bytes");
    }

    #[test]
    fn test_run_batch_counts_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("one.png"), 32, 32, 1);
        write_png(&dir.path().join("two.png"), 32, 32, 9);
        std::fs::write(dir.path().join("broken.png"), b"garbage").unwrap();

        let out_dir = dir.path().join("out");
        let manifest = dir.path().join("manifest.jsonl");
        let (inputs, _) = discover_inputs(&[dir.path().to_path_buf()], false).unwrap();
        assert_eq!(inputs.len(), 3);

        let template = Job::new(
            "placeholder",
            vec![ImageFormat::Jpeg, ImageFormat::Png],
        );
        let options = BatchOptions {
            out_dir: Some(out_dir.clone()),
            manifest_path: Some(manifest.clone()),
            stop_on_error: false,
        };
        let summary = run_batch(&template, &inputs, &options).unwrap();

        assert_eq!(summary.processed, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.exit, ExitKind::Decode);

        let manifest_text = std::fs::read_to_string(&manifest).unwrap();
        assert_eq!(manifest_text.lines().count(), 3);
        assert_eq!(std::fs::read_dir(&out_dir).unwrap().count(), 2);
    }
}
