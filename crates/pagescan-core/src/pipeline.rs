//! Per-file orchestration: rasterize, recognize, reconstruct.
//!
//! Every file is opened as a [`DocumentSource`] and walked page by page.
//! Flat images have one page and are returned unchanged alongside their
//! text. For PDFs a page that cannot be rasterized or recognized is replaced
//! by [`PAGE_FAILED_PLACEHOLDER`] and processing continues with the next
//! page. The recognized text is then drawn as an invisible layer over a
//! fresh copy of the original document.

use std::sync::Arc;
use std::time::Instant;

use futures_util::stream::{self, StreamExt, TryStreamExt};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, error, info, warn};

use crate::engine::{RecognitionWorker, WorkerRegistry};
use crate::error::{PagescanError, Result};
use crate::intake::SubmittedFile;
use crate::models::config::{PagescanConfig, PdfConfig};
use crate::models::document::{FileStatus, ProcessedDocument, RecognitionResult};
use crate::pdf::{self, TextLayout};
use crate::progress::{ProgressReporter, Stage};
use crate::source::{open_source, DocumentSource};

/// Text recorded for a page whose rasterization or recognition failed.
pub const PAGE_FAILED_PLACEHOLDER: &str = "[OCR processing failed for this page]";

const OPENING: f32 = 5.0;
const PARSED: f32 = 10.0;
const PAGES_SHARE: f32 = 75.0;
const RECONSTRUCTING: f32 = 90.0;

lazy_static! {
    static ref PAGE_DELIMITER: Regex = Regex::new(r"(?m)^--- Page (\d+) ---$").unwrap();
}

/// Processes submitted files one at a time against a shared worker registry.
pub struct Pipeline {
    registry: Arc<WorkerRegistry>,
    pdf: PdfConfig,
    layout: TextLayout,
}

impl Pipeline {
    pub fn new(registry: Arc<WorkerRegistry>, config: &PagescanConfig) -> Self {
        Self {
            registry,
            pdf: config.pdf.clone(),
            layout: TextLayout::default(),
        }
    }

    /// Override the geometry of the invisible text layer.
    pub fn with_layout(mut self, layout: TextLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn registry(&self) -> &Arc<WorkerRegistry> {
        &self.registry
    }

    /// Process one file to completion, mapping any failure to
    /// [`FileStatus::Errored`] with the error's message.
    pub async fn run(&self, file: &SubmittedFile, progress: &ProgressReporter) -> FileStatus {
        match self.process(file, progress).await {
            Ok(document) => FileStatus::Completed(document),
            Err(e) => {
                error!("Failed to process {}: {}", file.name(), e);
                FileStatus::Errored(e.to_string())
            }
        }
    }

    /// Process one file and return its artifact.
    pub async fn process(
        &self,
        file: &SubmittedFile,
        progress: &ProgressReporter,
    ) -> Result<ProcessedDocument> {
        let start = Instant::now();
        info!(
            "Processing {} ({}, {} bytes, language {})",
            file.name(),
            file.media_type(),
            file.size(),
            file.language()
        );

        progress.report(OPENING, Stage::Loading);
        let data = file.load()?;
        let source = open_source(&data, file.media_type(), self.pdf.renderer)?;
        let page_count = source.page_count();
        progress.report(PARSED, Stage::Loading);

        let worker = self.registry.acquire(&file.language()).await?;

        let (scale, pages_end) = if source.is_paginated() {
            (self.pdf.render_scale, PARSED + PAGES_SHARE)
        } else {
            (1.0, 100.0)
        };
        let pages = Pages {
            source: source.as_ref(),
            worker: worker.as_ref(),
            count: page_count,
            scale,
            progress: progress.scoped(PARSED, pages_end),
        };
        let pages = &pages;

        let results: Vec<RecognitionResult> = stream::iter(1..=page_count)
            .then(|page| async move { self.recognize_page(pages, page).await })
            .try_collect()
            .await?;

        let document = if source.is_paginated() {
            let failed = results.iter().filter(|r| r.is_failed()).count();
            if failed > 0 {
                warn!("{} of {} pages failed in {}", failed, page_count, file.name());
            }

            let text = combine_pages(&results);

            progress.report(RECONSTRUCTING, Stage::Reconstructing);
            let artifact = pdf::reconstruct(&data, &results, self.pdf.text_placement, &self.layout)
                .inspect_err(|e| {
                    error!("Could not write searchable PDF for {}: {}", file.name(), e);
                    debug!("Recognized text was:\n{}", text);
                })?;

            ProcessedDocument {
                text,
                page_texts: results.into_iter().map(|r| r.text).collect(),
                artifact,
                media_type: file.media_type(),
            }
        } else {
            let page_texts: Vec<String> = results.into_iter().map(|r| r.text).collect();
            ProcessedDocument {
                text: page_texts.concat(),
                page_texts,
                artifact: data.into_owned(),
                media_type: file.media_type(),
            }
        };

        progress.report(100.0, Stage::Done);
        info!(
            "Finished {}: {} page(s) in {}ms",
            file.name(),
            document.page_count(),
            start.elapsed().as_millis()
        );
        Ok(document)
    }

    /// Rasterize and recognize one page.
    ///
    /// Paginated documents never fail here: a page with no image falls back
    /// to its embedded text, and any other failure becomes
    /// [`PAGE_FAILED_PLACEHOLDER`]. A flat image has nothing to fall back
    /// to, so its failure fails the file.
    async fn recognize_page(&self, pages: &Pages<'_>, page: u32) -> Result<RecognitionResult> {
        let share = 100.0 / pages.count as f32;
        let page_progress = pages
            .progress
            .scoped((page - 1) as f32 * share, page as f32 * share);

        page_progress.report(0.0, Stage::Rasterizing(page));
        let outcome = match pages.source.rasterize_page(page, pages.scale) {
            Ok(image) => self
                .registry
                .recognize(pages.worker, &image, &page_progress)
                .await
                .map_err(PagescanError::from),
            Err(e) => match pages.source.embedded_text(page) {
                Some(text) => {
                    info!("Page {} could not be rasterized, using its embedded text", page);
                    Ok(text)
                }
                None => Err(e.into()),
            },
        };
        page_progress.report(100.0, Stage::Recognizing(page));

        match outcome {
            Ok(text) if pages.source.is_paginated() => {
                debug!("Page {}/{}: {} characters", page, pages.count, text.len());
                Ok(RecognitionResult {
                    page,
                    text: text.trim().to_string(),
                    error: None,
                })
            }
            Ok(text) => Ok(RecognitionResult {
                page,
                text,
                error: None,
            }),
            Err(e) if pages.source.is_paginated() => {
                warn!("Page {} failed: {}", page, e);
                Ok(RecognitionResult {
                    page,
                    text: PAGE_FAILED_PLACEHOLDER.to_string(),
                    error: Some(e.to_string()),
                })
            }
            Err(e) => Err(e),
        }
    }
}

/// What every page of one document is processed with.
struct Pages<'a> {
    source: &'a dyn DocumentSource,
    worker: &'a dyn RecognitionWorker,
    count: u32,
    scale: f32,
    progress: ProgressReporter,
}

/// Join page texts with `--- Page N ---` delimiters.
fn combine_pages(results: &[RecognitionResult]) -> String {
    results
        .iter()
        .map(|r| format!("\n--- Page {} ---\n{}\n", r.page, r.text))
        .collect()
}

/// Split combined text back into `(page, text)` pairs.
pub fn split_pages(text: &str) -> Vec<(u32, String)> {
    let headers: Vec<(u32, usize, usize)> = PAGE_DELIMITER
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let page = caps.get(1)?.as_str().parse().ok()?;
            Some((page, whole.start(), whole.end()))
        })
        .collect();

    headers
        .iter()
        .enumerate()
        .map(|(i, (page, _, body_start))| {
            let body_end = headers.get(i + 1).map_or(text.len(), |next| next.1);
            (*page, text[*body_start..body_end].trim().to_string())
        })
        .collect()
}
