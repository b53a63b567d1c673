//! Recognition engine adapter.
//!
//! The pipeline talks to an OCR engine through two traits: a
//! [`RecognitionEngine`] creates one [`RecognitionWorker`] per language, and
//! workers recognize page images. Workers are expensive to create, so the
//! [`WorkerRegistry`] keeps at most one live worker per language.

#[cfg(feature = "native")]
mod onnx;
mod registry;

#[cfg(feature = "native")]
pub use onnx::OnnxEngine;
pub use registry::WorkerRegistry;

use async_trait::async_trait;

use crate::error::OcrError;
use crate::models::document::PageImage;
use crate::progress::ProgressReporter;

/// Something that can load recognition workers.
#[async_trait]
pub trait RecognitionEngine: Send + Sync {
    /// Load a worker for an engine language code (never `auto`).
    async fn create_worker(&self, language: &str) -> Result<Box<dyn RecognitionWorker>, OcrError>;
}

/// A loaded recognizer bound to one language.
#[async_trait]
pub trait RecognitionWorker: Send + Sync {
    /// Engine language code this worker was loaded with.
    fn language(&self) -> &str;

    /// Recognize the text of one image.
    ///
    /// `progress` receives values in `[0, 100]` for this image only.
    async fn recognize(
        &self,
        image: &PageImage,
        progress: &ProgressReporter,
    ) -> Result<String, OcrError>;

    /// Release the worker's resources. Further calls to `recognize` fail.
    async fn terminate(&self) -> Result<(), OcrError>;
}
