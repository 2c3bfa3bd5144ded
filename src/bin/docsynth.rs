//! docsynth - generate synthetic document pages with pixel-aligned masks
//!
//! Reads a TOML configuration and writes `images/`, `char_masks/`,
//! `field_masks/` and `row_coords/` into the output directory.

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};
use docsynth_rust::{Generator, GeneratorConfig};
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "docsynth")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the generator configuration (TOML)
    #[arg(short, long)]
    config: PathBuf,

    /// Number of pages to generate (overrides generator.num_pages)
    #[arg(short, long = "num-pages")]
    num_pages: Option<usize>,

    /// Output directory (overrides generator.output_dir)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Batch seed for reproducible output
    #[arg(short, long)]
    seed: Option<u64>,

    /// Worker threads (defaults to one per core)
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Use debug logging level
    #[arg(short, long, action = ArgAction::SetTrue)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = GeneratorConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(n) = args.num_pages {
        config.generator.num_pages = n;
    }
    if let Some(dir) = args.output {
        config.generator.output_dir = dir;
    }
    if args.seed.is_some() {
        config.generator.seed = args.seed;
    }
    if args.threads.is_some() {
        config.generator.threads = args.threads;
    }
    config.validate().context("invalid command line overrides")?;

    let output_dir = config.generator.output_dir.clone();
    let generator = Generator::new(config).context("setting up generator")?;

    let started = Instant::now();
    let report = generator.run().context("generation failed")?;
    println!(
        "{} pages written to {} (ids {}..{}), {} failed, {:.1}s",
        report.produced,
        output_dir.display(),
        report.first_id,
        report.first_id + (report.produced + report.failed) as u64,
        report.failed,
        started.elapsed().as_secs_f64()
    );
    if report.failed > 0 && report.produced == 0 {
        bail!("no page could be written");
    }
    Ok(())
}
