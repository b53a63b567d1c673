//! Values flowing through the pipeline and the artifact it returns.

use std::fmt;
use std::path::Path;

use image::{DynamicImage, GenericImageView};
use serde::Serialize;

use crate::intake::MediaType;
use crate::progress::ProgressEvent;

/// Raster rendering of one page, consumed by recognition and then dropped.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// Source page index (1-based).
    pub page: u32,
    pub image: DynamicImage,
}

impl PageImage {
    pub fn new(page: u32, image: DynamicImage) -> Self {
        Self { page, image }
    }

    pub fn width(&self) -> u32 {
        self.image.dimensions().0
    }

    pub fn height(&self) -> u32 {
        self.image.dimensions().1
    }
}

/// Text recognized on one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognitionResult {
    /// Source page index (1-based).
    pub page: u32,
    /// Recognized text, or the placeholder when recognition failed.
    pub text: String,
    /// Why the page failed, if it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RecognitionResult {
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Final artifact for one successfully processed file.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedDocument {
    /// Text of all pages, with page delimiters for paginated inputs.
    pub text: String,
    /// Text per page, in page order.
    pub page_texts: Vec<String>,
    /// The searchable PDF, or the original bytes for flat images.
    #[serde(skip)]
    pub artifact: Vec<u8>,
    pub media_type: MediaType,
}

impl ProcessedDocument {
    pub fn mime_type(&self) -> &'static str {
        self.media_type.mime()
    }

    pub fn page_count(&self) -> usize {
        self.page_texts.len()
    }

    /// Download name for the artifact: `scan.pdf` becomes `scan_ocr.pdf`.
    pub fn artifact_file_name(&self, original: &str) -> String {
        let (stem, extension) = split_name(original);
        let extension = extension.unwrap_or(self.media_type.extension());
        format!("{}_ocr.{}", stem, extension)
    }

    /// Download name for the extracted text: `scan.pdf` becomes `scan_ocr.txt`.
    pub fn text_file_name(&self, original: &str) -> String {
        let (stem, _) = split_name(original);
        format!("{}_ocr.txt", stem)
    }
}

fn split_name(name: &str) -> (&str, Option<&str>) {
    let path = Path::new(name);
    match (
        path.file_stem().and_then(|s| s.to_str()),
        path.extension().and_then(|e| e.to_str()),
    ) {
        (Some(stem), Some(extension)) => (stem, Some(extension)),
        _ => (name, None),
    }
}

/// Lifecycle of one file: `Pending -> Processing -> Completed | Errored`.
#[derive(Debug, Clone)]
pub enum FileStatus {
    Pending,
    Processing { progress: f32 },
    Completed(ProcessedDocument),
    Errored(String),
}

impl FileStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FileStatus::Completed(_) | FileStatus::Errored(_))
    }

    pub fn document(&self) -> Option<&ProcessedDocument> {
        match self {
            FileStatus::Completed(document) => Some(document),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            FileStatus::Errored(reason) => Some(reason),
            _ => None,
        }
    }

    /// Move to `Processing` at the event's percentage. Terminal states stay.
    pub fn observe(&mut self, event: &ProgressEvent) {
        if !self.is_terminal() {
            *self = FileStatus::Processing {
                progress: event.percent,
            };
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Pending => write!(f, "pending"),
            FileStatus::Processing { progress } => write!(f, "processing ({:.0}%)", progress),
            FileStatus::Completed(_) => write!(f, "completed"),
            FileStatus::Errored(_) => write!(f, "error"),
        }
    }
}
