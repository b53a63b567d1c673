//! Subcommands and the helpers they share.

pub mod batch;
pub mod config;
pub mod languages;
pub mod process;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::debug;

use pagescan_core::models::config::PagescanConfig;
use pagescan_core::{
    FileStatus, Language, OnnxEngine, Pipeline, ProgressEvent, Stage, WorkerRegistry,
};

/// Load the config from `--config`, the default location, or defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<PagescanConfig> {
    let config = match config_path {
        Some(path) => PagescanConfig::from_file(Path::new(path))?,
        None => {
            let default_path = config::default_config_path();
            if default_path.exists() {
                debug!("Using config from {}", default_path.display());
                PagescanConfig::from_file(&default_path)?
            } else {
                PagescanConfig::default()
            }
        }
    };

    config.validate()?;
    Ok(config)
}

/// `--language` if given, else the configured default.
pub fn resolve_language(arg: Option<&str>, config: &PagescanConfig) -> anyhow::Result<Language> {
    let code = arg.unwrap_or(&config.ocr.default_language);
    Ok(Language::parse(code)?)
}

/// Pipeline over the ONNX engine, optionally reading models from `model_dir`.
pub fn build_pipeline(config: &PagescanConfig, model_dir: Option<&PathBuf>) -> Pipeline {
    let mut models = config.models.clone();
    if let Some(dir) = model_dir {
        models.model_dir = dir.clone();
    }

    let engine = Arc::new(OnnxEngine::new(models, config.ocr.clone()));
    Pipeline::new(Arc::new(WorkerRegistry::new(engine)), config)
}

pub fn file_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {prefix} [{elapsed_precise}] {bar:40.cyan/blue} {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
    );
    pb
}

/// Drive `pb` from progress events until every sender is dropped.
///
/// The bar is reset whenever events start arriving for a different file.
pub fn spawn_progress(pb: ProgressBar, mut events: UnboundedReceiver<ProgressEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut current_file = String::new();
        let mut status = FileStatus::Pending;
        while let Some(event) = events.recv().await {
            if event.file != current_file {
                pb.reset();
                pb.set_prefix(event.file.clone());
                current_file = event.file.clone();
                status = FileStatus::Pending;
            }

            status.observe(&event);
            if let FileStatus::Processing { progress } = status {
                pb.set_position(progress.round() as u64);
            }
            pb.set_message(describe(event.stage));
        }
    })
}

fn describe(stage: Stage) -> String {
    match stage {
        Stage::Loading => "Loading...".to_string(),
        Stage::Rasterizing(page) => format!("Rendering page {}...", page),
        Stage::Recognizing(page) => format!("Recognizing page {}...", page),
        Stage::Reconstructing => "Building searchable PDF...".to_string(),
        Stage::Done => "Done".to_string(),
    }
}
