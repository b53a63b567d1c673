//! Sequential processing of a batch of candidate files.

use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::info;

use crate::intake::{validate, CandidateFile, Intake, Rejection, SubmittedFile};
use crate::language::Language;
use crate::models::document::FileStatus;
use crate::pipeline::Pipeline;
use crate::progress::{ProgressEvent, ProgressReporter};

/// Progress and outcome of one accepted file.
#[derive(Debug, Clone)]
pub struct FileReport {
    pub name: String,
    /// Where the file was read from, for files taken from disk.
    pub path: Option<PathBuf>,
    pub status: FileStatus,
    pub elapsed_ms: u64,
    pub finished_at: Option<DateTime<Utc>>,
}

impl FileReport {
    fn pending(file: &SubmittedFile) -> Self {
        Self {
            name: file.name().to_string(),
            path: file.path().map(PathBuf::from),
            status: FileStatus::Pending,
            elapsed_ms: 0,
            finished_at: None,
        }
    }
}

/// Everything that happened to a batch.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Files refused at intake, in input order.
    pub rejected: Vec<Rejection>,
    /// Accepted files, in processing order.
    pub files: Vec<FileReport>,
}

impl BatchReport {
    /// Report with every accepted file `Pending`, plus the files to run.
    pub fn from_intake(intake: Intake) -> (Self, Vec<SubmittedFile>) {
        let report = Self {
            rejected: intake.rejected,
            files: intake.accepted.iter().map(FileReport::pending).collect(),
        };
        (report, intake.accepted)
    }

    pub fn completed(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.status, FileStatus::Completed(_)))
            .count()
    }

    pub fn errored(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.status, FileStatus::Errored(_)))
            .count()
    }

    /// One flat row per file, rejected files first.
    pub fn rows(&self) -> Vec<SummaryRow> {
        let rejected = self.rejected.iter().map(|r| SummaryRow {
            file: r.name.clone(),
            status: "rejected".to_string(),
            pages: 0,
            characters: 0,
            elapsed_ms: 0,
            finished_at: String::new(),
            error: r.reason.to_string(),
        });

        let processed = self.files.iter().map(|f| {
            let document = f.status.document();
            SummaryRow {
                file: f.name.clone(),
                status: f.status.to_string(),
                pages: document.map_or(0, |d| d.page_count()),
                characters: document.map_or(0, |d| d.text.chars().count()),
                elapsed_ms: f.elapsed_ms,
                finished_at: f
                    .finished_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default(),
                error: f.status.error().unwrap_or_default().to_string(),
            }
        });

        rejected.chain(processed).collect()
    }
}

/// Serializable summary line for reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub file: String,
    pub status: String,
    pub pages: usize,
    pub characters: usize,
    pub elapsed_ms: u64,
    pub finished_at: String,
    pub error: String,
}

/// Validate `files`, then run every accepted file through `pipeline`,
/// awaiting each before starting the next.
pub async fn run_batch(
    pipeline: &Pipeline,
    files: Vec<CandidateFile>,
    language: Language,
    events: Option<UnboundedSender<ProgressEvent>>,
) -> BatchReport {
    let (mut report, accepted) = BatchReport::from_intake(validate(files, language));
    let total = accepted.len();
    info!(
        "Batch: {} accepted, {} rejected",
        total,
        report.rejected.len()
    );

    for (i, (file, entry)) in accepted.iter().zip(report.files.iter_mut()).enumerate() {
        info!("[{}/{}] {}", i + 1, total, file.name());
        entry.status = FileStatus::Processing { progress: 0.0 };

        let progress = ProgressReporter::new(file.name(), events.clone());
        let start = Instant::now();

        entry.status = pipeline.run(file, &progress).await;
        entry.elapsed_ms = start.elapsed().as_millis() as u64;
        entry.finished_at = Some(Utc::now());
    }

    report
}
