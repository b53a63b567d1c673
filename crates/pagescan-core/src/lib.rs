//! Core library for document OCR processing.
//!
//! This crate provides:
//! - File intake validation (size, media type, emptiness)
//! - A recognition engine adapter with a per-language worker registry
//! - Page rasterization for PDFs and flat images
//! - Searchable PDF reconstruction with an invisible text layer
//! - A per-file pipeline and a sequential batch runner

pub mod batch;
pub mod engine;
pub mod error;
pub mod intake;
pub mod language;
pub mod models;
pub mod pdf;
pub mod pipeline;
pub mod progress;
pub mod source;

#[cfg(test)]
pub(crate) mod testutil;

pub use batch::{run_batch, BatchReport, FileReport, SummaryRow};
pub use engine::{RecognitionEngine, RecognitionWorker, WorkerRegistry};
#[cfg(feature = "native")]
pub use engine::OnnxEngine;
pub use error::{OcrError, PagescanError, PdfError, Result, ValidationError};
pub use intake::{validate, CandidateFile, FileContent, Intake, MediaType, Rejection, SubmittedFile};
pub use language::{Language, LanguageOption, LANGUAGE_OPTIONS};
pub use models::config::{PageRenderer, PagescanConfig, TextPlacement};
pub use models::document::{FileStatus, PageImage, ProcessedDocument, RecognitionResult};
pub use pipeline::{split_pages, Pipeline, PAGE_FAILED_PLACEHOLDER};
pub use progress::{ProgressEvent, ProgressReporter, Stage};
pub use source::{open_source, DocumentSource, FlatImageSource, PaginatedSource};
