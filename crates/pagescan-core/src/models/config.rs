//! Configuration structures for the OCR pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::PagescanError;
use crate::language::{needs_dedicated_models, Language};

/// Main configuration for the pagescan pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PagescanConfig {
    /// OCR configuration.
    pub ocr: OcrConfig,

    /// PDF processing configuration.
    pub pdf: PdfConfig,

    /// Model configuration.
    pub models: ModelConfig,
}

/// OCR engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Language used when none is given ("auto" or an engine code).
    pub default_language: String,

    /// Keep `[UNK]` tokens emitted for characters missing from the dictionary.
    pub keep_unk: bool,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            default_language: "auto".to_string(),
            keep_unk: false,
        }
    }
}

/// How recognized lines are laid onto the pages of the output PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextPlacement {
    /// Each page carries the lines recognized on that page.
    #[default]
    PerPage,
    /// All lines are split evenly across pages by position.
    EvenSplit,
}

/// How PDF pages are turned into images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageRenderer {
    /// Render with pdfium when the library can be loaded, otherwise use the
    /// images embedded in each page.
    #[default]
    Auto,
    /// Only use the images embedded in each page.
    Embedded,
}

/// PDF processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Upscaling factor applied when rasterizing pages.
    pub render_scale: f32,

    /// Placement of the invisible text layer.
    pub text_placement: TextPlacement,

    /// Page rendering backend.
    pub renderer: PageRenderer,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            render_scale: 2.0,
            text_placement: TextPlacement::PerPage,
            renderer: PageRenderer::Auto,
        }
    }
}

/// Model file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory containing model files. Per-language models live in
    /// `<model_dir>/<code>/`.
    pub model_dir: PathBuf,

    /// Text detection model file name.
    pub detection_model: String,

    /// Text recognition model file name.
    pub recognition_model: String,

    /// Character dictionary file name.
    pub dictionary: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            detection_model: "det.onnx".to_string(),
            recognition_model: "rec.onnx".to_string(),
            dictionary: "dict.txt".to_string(),
        }
    }
}

impl ModelConfig {
    /// Directory holding the models for an engine language code.
    pub fn language_dir(&self, code: &str) -> PathBuf {
        let dir = self.model_dir.join(code);
        if dir.is_dir() {
            return dir;
        }

        if needs_dedicated_models(code) {
            warn!(
                "No models for '{}' in {}, falling back to the Latin models in {}",
                code,
                dir.display(),
                self.model_dir.display()
            );
        } else {
            debug!("Using shared models in {} for '{}'", self.model_dir.display(), code);
        }
        self.model_dir.clone()
    }
}

impl PagescanConfig {
    /// Check values that deserialize fine but cannot be used.
    pub fn validate(&self) -> Result<(), PagescanError> {
        Language::parse(&self.ocr.default_language)?;

        if !self.pdf.render_scale.is_finite() || self.pdf.render_scale <= 0.0 {
            return Err(PagescanError::Config(format!(
                "pdf.render_scale must be a positive number, got {}",
                self.pdf.render_scale
            )));
        }

        Ok(())
    }

    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)
    }
}
