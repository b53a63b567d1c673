//! Error types for the pagescan-core library.

use thiserror::Error;

/// Main error type for the pagescan library.
#[derive(Error, Debug)]
pub enum PagescanError {
    /// The file was rejected at intake.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// PDF processing error.
    #[error("PDF processing failed: {0}")]
    Pdf(#[from] PdfError),

    /// OCR processing error.
    #[error("OCR processing failed: {0}")]
    Ocr(#[from] OcrError),

    /// Image decoding error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Reasons a file is refused at intake.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Declared size is above the intake limit.
    #[error("File size exceeds 25MB limit. Current size: {}MB", megabytes(.size))]
    TooLarge { size: u64 },

    /// Media type is not one of the supported types.
    #[error("Unsupported file format. Supported formats: PDF, JPG, PNG, TIFF")]
    UnsupportedType(String),

    /// Declared size is zero.
    #[error("File appears to be empty")]
    Empty,
}

/// Errors related to PDF parsing, rasterization and reconstruction.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Invalid page number requested.
    #[error("invalid page number: {0}")]
    InvalidPage(u32),

    /// No raster content could be produced for a page.
    #[error("failed to rasterize page: {0}")]
    ImageExtraction(String),

    /// Failed to add the text layer to a page.
    #[error("failed to annotate page: {0}")]
    Annotation(String),

    /// Failed to write the reconstructed document.
    #[error("failed to serialize PDF: {0}")]
    Serialize(String),
}

/// Errors related to the recognition engine.
#[derive(Error, Debug)]
pub enum OcrError {
    /// Failed to load OCR models.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// The engine failed while recognizing an image.
    #[error("text recognition failed: {0}")]
    Recognition(String),

    /// Invalid image format or dimensions.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// The worker was terminated before use.
    #[error("worker for '{0}' has been terminated")]
    WorkerTerminated(String),
}

fn megabytes(size: &u64) -> String {
    format!("{:.1}", *size as f64 / (1024.0 * 1024.0))
}

impl From<lopdf::Error> for PdfError {
    fn from(err: lopdf::Error) -> Self {
        PdfError::Parse(err.to_string())
    }
}

/// Result type for the pagescan library.
pub type Result<T> = std::result::Result<T, PagescanError>;
