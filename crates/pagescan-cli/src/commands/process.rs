//! Process command - make a single PDF or image searchable.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use tracing::{debug, info};

use pagescan_core::{validate, CandidateFile, FileStatus, ProcessedDocument, ProgressReporter};

use super::{build_pipeline, file_progress_bar, load_config, resolve_language, spawn_progress};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input file (PDF, JPG, PNG or TIFF)
    #[arg(required = true)]
    input: PathBuf,

    /// Directory for the output files (default: next to the input)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Recognition language code, or "auto"
    #[arg(short, long)]
    language: Option<String>,

    /// Model directory
    #[arg(short, long)]
    model_dir: Option<PathBuf>,

    /// What to print once processing is done
    #[arg(short, long, value_enum, default_value = "summary")]
    format: OutputFormat,

    /// Only print, do not write output files
    #[arg(long)]
    no_write: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// Short summary of what was written
    Summary,
    /// Recognized text
    Text,
    /// JSON with the recognized text per page
    Json,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    // Check input file exists
    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let language = resolve_language(args.language.as_deref(), &config)?;
    let candidate = CandidateFile::from_path(&args.input)?;

    let intake = validate(vec![candidate], language);
    if let Some(rejection) = intake.rejected.first() {
        anyhow::bail!("{}", rejection);
    }
    let Some(file) = intake.accepted.into_iter().next() else {
        anyhow::bail!("Nothing to process");
    };

    info!("Processing file: {} ({})", args.input.display(), language.display_name());

    let pipeline = build_pipeline(&config, args.model_dir.as_ref());
    let pb = file_progress_bar();
    let (progress, events) = ProgressReporter::channel(file.name());
    let drain = spawn_progress(pb.clone(), events);

    let status = pipeline.run(&file, &progress).await;

    drop(progress);
    drain.await?;
    pipeline.registry().release_all().await;

    let document = match status {
        FileStatus::Completed(document) => {
            pb.finish_with_message("Done");
            document
        }
        other => {
            pb.abandon_with_message("Failed");
            anyhow::bail!(
                "{}: {}",
                file.name(),
                other.error().unwrap_or("processing did not finish")
            );
        }
    };

    let written = if args.no_write {
        Vec::new()
    } else {
        let output_dir = args
            .output_dir
            .clone()
            .or_else(|| args.input.parent().map(Path::to_path_buf))
            .unwrap_or_default();
        write_outputs(&document, file.name(), &output_dir)?
    };

    match args.format {
        OutputFormat::Summary => print_summary(&document, &written),
        OutputFormat::Text => println!("{}", document.text),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&document)?),
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

/// Write `<stem>_ocr.<ext>` and `<stem>_ocr.txt` into `output_dir`.
pub fn write_outputs(
    document: &ProcessedDocument,
    original_name: &str,
    output_dir: &Path,
) -> anyhow::Result<Vec<PathBuf>> {
    if !output_dir.as_os_str().is_empty() {
        fs::create_dir_all(output_dir)?;
    }

    let artifact_path = output_dir.join(document.artifact_file_name(original_name));
    fs::write(&artifact_path, &document.artifact)?;
    debug!("Wrote {}", artifact_path.display());

    let text_path = output_dir.join(document.text_file_name(original_name));
    fs::write(&text_path, &document.text)?;
    debug!("Wrote {}", text_path.display());

    Ok(vec![artifact_path, text_path])
}

fn print_summary(document: &ProcessedDocument, written: &[PathBuf]) {
    for path in written {
        println!("{} Output written to {}", style("✓").green(), path.display());
    }
    println!(
        "{} {} page(s), {} characters recognized",
        style("ℹ").blue(),
        document.page_count(),
        document.text.chars().count()
    );
}
