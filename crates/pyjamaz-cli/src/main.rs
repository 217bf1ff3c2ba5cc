//! pyjamaz CLI - batch image optimizer

use std::path::PathBuf;
use std::process::exit;
use std::str::FromStr;

use anyhow::{Context, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pyjamaz::{
    BatchOptions, ExitKind, ImageFormat, Job, MetricKind, TransformOptions, discover_inputs,
    run_batch,
};

/// Batch image optimizer: smallest output under a byte budget and a
/// perceptual-quality ceiling.
#[derive(Parser)]
#[command(name = "pyjamaz")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input files or directories
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory for optimized images
    #[arg(short, long, default_value = "optimized")]
    out_dir: PathBuf,

    /// Hard byte ceiling per output; enables the quality search
    #[arg(long)]
    max_bytes: Option<u32>,

    /// Perceptual-distance ceiling under the chosen metric
    #[arg(long)]
    max_diff: Option<f64>,

    /// Quality metric: none, dssim, ssimulacra2, butteraugli
    #[arg(long, default_value = "none")]
    metric: String,

    /// Target formats in order, comma-separated
    #[arg(long, value_delimiter = ',', default_value = "webp,jpeg,png")]
    formats: Vec<String>,

    /// Advisory worker count for per-format encoding
    #[arg(short = 'j', long, default_value_t = 1)]
    concurrency: usize,

    /// Recurse into input directories
    #[arg(short, long)]
    recursive: bool,

    /// Write a JSONL manifest (one record per image)
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Error on budget misses instead of keeping the closest candidate
    #[arg(long)]
    strict_budget: bool,

    /// Stop scheduling new images after the first failure
    #[arg(long)]
    strict: bool,

    /// Fit images within this width (never upscales)
    #[arg(long)]
    max_width: Option<u32>,

    /// Fit images within this height (never upscales)
    #[arg(long)]
    max_height: Option<u32>,

    /// Unsharp-mask sigma applied after any resize
    #[arg(long)]
    sharpen: Option<f32>,

    /// Skip EXIF auto-orientation
    #[arg(long)]
    no_auto_orient: bool,

    /// Keep embedded ICC profiles in result metadata
    #[arg(long)]
    keep_icc: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "pyjamaz=debug" } else { "pyjamaz=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();

    match run(&cli) {
        Ok(kind) => exit(kind.code()),
        Err(e) => {
            eprintln!("error: {e:#}");
            exit(ExitKind::Cli.code());
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<ExitKind> {
    let formats = cli
        .formats
        .iter()
        .map(|s| ImageFormat::from_str(s))
        .collect::<pyjamaz::Result<Vec<_>>>()
        .context("invalid --formats")?;
    let metric = MetricKind::from_str(&cli.metric).context("invalid --metric")?;

    let (inputs, warnings) = discover_inputs(&cli.inputs, cli.recursive)?;
    for warning in &warnings {
        tracing::warn!("{warning}");
    }
    if inputs.is_empty() {
        bail!("no image inputs found");
    }

    let mut template = Job::new(PathBuf::new(), formats);
    template.max_bytes = cli.max_bytes;
    template.max_diff = cli.max_diff;
    template.metric = metric;
    template.concurrency = cli.concurrency.max(1);
    template.search.strict_budget = cli.strict_budget;
    template.transform = TransformOptions {
        max_width: cli.max_width,
        max_height: cli.max_height,
        sharpen: cli.sharpen,
        auto_orient: !cli.no_auto_orient,
        keep_icc: cli.keep_icc,
    };

    let options = BatchOptions {
        out_dir: Some(cli.out_dir.clone()),
        manifest_path: cli.manifest.clone(),
        stop_on_error: cli.strict,
    };

    let summary = run_batch(&template, &inputs, &options)?;
    println!(
        "processed {} image(s): {} succeeded, {} failed, {} with warnings",
        summary.processed, summary.succeeded, summary.failed, summary.warned
    );
    Ok(summary.exit)
}
