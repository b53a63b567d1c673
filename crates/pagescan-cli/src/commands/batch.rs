//! Batch processing command for multiple files.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use pagescan_core::{run_batch, BatchReport, CandidateFile};

use super::process::write_outputs;
use super::{build_pipeline, file_progress_bar, load_config, resolve_language, spawn_progress};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input files or glob pattern
    #[arg(required = true)]
    input: String,

    /// Output directory for searchable files and text (default: next to each input)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Recognition language code, or "auto"
    #[arg(short, long)]
    language: Option<String>,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Model directory
    #[arg(short, long)]
    model_dir: Option<PathBuf>,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;
    let language = resolve_language(args.language.as_deref(), &config)?;

    // Expand glob pattern
    let paths: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| p.is_file())
        .collect();

    if paths.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        paths.len()
    );

    let mut candidates = Vec::with_capacity(paths.len());
    for path in &paths {
        match CandidateFile::from_path(path) {
            Ok(candidate) => candidates.push(candidate),
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }

    // Create output directory if specified
    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let pipeline = build_pipeline(&config, args.model_dir.as_ref());
    let pb = file_progress_bar();
    let (tx, rx) = mpsc::unbounded_channel();
    let drain = spawn_progress(pb.clone(), rx);

    let report = run_batch(&pipeline, candidates, language, Some(tx)).await;

    drain.await?;
    pb.finish_and_clear();
    pipeline.registry().release_all().await;

    let mut claimed = HashSet::new();
    for file in &report.files {
        let Some(document) = file.status.document() else {
            continue;
        };
        let dir = output_dir_for(args.output_dir.as_deref(), file.path.as_deref());
        let name = claim_name(&mut claimed, &dir, &file.name);
        if name != file.name {
            warn!("{} already written to {}, saving as {}", file.name, dir.display(), name);
        }
        write_outputs(document, &name, &dir)?;
        debug!("Wrote outputs for {}", file.name);
    }

    // Generate summary if requested
    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        write_summary(&summary_path, &report)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    print_report(&report, start);

    Ok(())
}

/// `--output-dir` when given, otherwise the directory the input came from.
fn output_dir_for(explicit: Option<&Path>, input: Option<&Path>) -> PathBuf {
    explicit
        .or_else(|| input.and_then(Path::parent))
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

/// `name`, or `name` with `_2`, `_3`, ... before the extension if another
/// file already claimed it in `dir`.
fn claim_name(claimed: &mut HashSet<PathBuf>, dir: &Path, name: &str) -> String {
    let path = Path::new(name);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
    let extension = path.extension().and_then(|e| e.to_str());

    let mut candidate = name.to_string();
    let mut n = 1;
    while !claimed.insert(dir.join(&candidate)) {
        n += 1;
        candidate = match extension {
            Some(extension) => format!("{}_{}.{}", stem, n, extension),
            None => format!("{}_{}", stem, n),
        };
    }
    candidate
}

fn write_summary(path: &Path, report: &BatchReport) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for row in report.rows() {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

fn print_report(report: &BatchReport, start: Instant) {
    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        report.files.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed, {} rejected",
        style(report.completed()).green(),
        style(report.errored()).red(),
        style(report.rejected.len()).yellow()
    );

    if !report.rejected.is_empty() {
        println!();
        println!("{}", style("Rejected files:").yellow());
        for rejection in &report.rejected {
            println!("  - {}", rejection);
        }
    }

    let failed: Vec<_> = report
        .files
        .iter()
        .filter_map(|f| f.status.error().map(|e| (&f.name, e)))
        .collect();
    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for (name, error) in failed {
            println!("  - {}: {}", name, error);
        }
    }
}
