//! Recognition engine backed by `pure-onnx-ocr` (pure Rust, no external ONNX Runtime).

use std::cmp::Ordering;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{RecognitionEngine, RecognitionWorker};
use crate::error::OcrError;
use crate::models::config::{ModelConfig, OcrConfig};
use crate::models::document::PageImage;
use crate::progress::{ProgressReporter, Stage};

/// Creates one `pure-onnx-ocr` engine per language.
///
/// Models for language `code` are read from `<model_dir>/<code>/` when that
/// directory exists and from `<model_dir>/` otherwise. Nothing is loaded
/// until a worker is requested.
pub struct OnnxEngine {
    models: ModelConfig,
    ocr: OcrConfig,
}

impl OnnxEngine {
    pub fn new(models: ModelConfig, ocr: OcrConfig) -> Self {
        Self { models, ocr }
    }
}

#[async_trait]
impl RecognitionEngine for OnnxEngine {
    async fn create_worker(&self, language: &str) -> Result<Box<dyn RecognitionWorker>, OcrError> {
        let model_dir = self.models.language_dir(language);
        let det_path = model_dir.join(&self.models.detection_model);
        let rec_path = model_dir.join(&self.models.recognition_model);
        let dict_path = model_dir.join(&self.models.dictionary);

        for path in [&det_path, &rec_path, &dict_path] {
            if !path.exists() {
                return Err(OcrError::ModelLoad(format!(
                    "model file not found: {}",
                    path.display()
                )));
            }
        }

        let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
            .det_model_path(&det_path)
            .rec_model_path(&rec_path)
            .dictionary_path(&dict_path)
            .build()
            .map_err(|e| OcrError::ModelLoad(format!("pure-onnx-ocr: {}", e)))?;

        info!("Loaded '{}' models from {}", language, model_dir.display());

        Ok(Box::new(OnnxWorker {
            language: language.to_string(),
            keep_unk: self.ocr.keep_unk,
            engine: Arc::new(Mutex::new(Some(engine))),
        }))
    }
}

struct OnnxWorker {
    language: String,
    keep_unk: bool,
    /// Shared with the blocking task running inference; `None` once terminated.
    engine: Arc<Mutex<Option<pure_onnx_ocr::engine::OcrEngine>>>,
}

/// A recognized line with its axis-aligned box.
struct Line {
    text: String,
    x: f32,
    y: f32,
}

#[async_trait]
impl RecognitionWorker for OnnxWorker {
    fn language(&self) -> &str {
        &self.language
    }

    async fn recognize(
        &self,
        image: &PageImage,
        progress: &ProgressReporter,
    ) -> Result<String, OcrError> {
        let start = Instant::now();
        info!("Processing image: {}x{}", image.width(), image.height());

        let engine = Arc::clone(&self.engine);
        let language = self.language.clone();
        let page = image.image.clone();
        let results = tokio::task::spawn_blocking(move || {
            let guard = engine.lock().unwrap_or_else(PoisonError::into_inner);
            let engine = guard
                .as_ref()
                .ok_or(OcrError::WorkerTerminated(language))?;
            engine
                .run_from_image(&page)
                .map_err(|e| OcrError::Recognition(format!("pure-onnx-ocr: {}", e)))
        })
        .await
        .map_err(|e| OcrError::Recognition(format!("recognition task failed: {}", e)))??;
        progress.report(90.0, Stage::Recognizing(image.page));

        debug!("pure-onnx-ocr returned {} text regions", results.len());

        let mut lines: Vec<Line> = results
            .iter()
            .map(|r| {
                let (x, y) = top_left(&r.bounding_box);
                let text = if self.keep_unk {
                    r.text.clone()
                } else {
                    r.text.replace("[UNK]", " ")
                };
                Line { text, x, y }
            })
            .collect();

        sort_reading_order(&mut lines);

        let text = lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        info!(
            "OCR complete: {} lines in {}ms",
            lines.len(),
            start.elapsed().as_millis()
        );

        Ok(text)
    }

    async fn terminate(&self) -> Result<(), OcrError> {
        let mut guard = self.engine.lock().unwrap_or_else(PoisonError::into_inner);
        guard.take();
        Ok(())
    }
}

/// Smallest x and y of a detected polygon.
fn top_left(polygon: &pure_onnx_ocr::Polygon<f64>) -> (f32, f32) {
    polygon
        .exterior()
        .coords()
        .take(4)
        .fold((f32::INFINITY, f32::INFINITY), |(x, y), c| {
            (x.min(c.x as f32), y.min(c.y as f32))
        })
}

/// Top-to-bottom in 20 pixel rows, then left-to-right.
fn sort_reading_order(lines: &mut [Line]) {
    lines.sort_by(|a, b| {
        let row_a = (a.y / 20.0) as i32;
        let row_b = (b.y / 20.0) as i32;
        if row_a != row_b {
            row_a.cmp(&row_b)
        } else {
            a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal)
        }
    });
}
