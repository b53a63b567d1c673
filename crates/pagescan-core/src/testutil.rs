//! Test fixtures: generated PDFs and a scriptable recognition engine.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use image::{DynamicImage, GrayImage, Luma};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};

use crate::engine::{RecognitionEngine, RecognitionWorker};
use crate::error::OcrError;
use crate::models::document::PageImage;
use crate::progress::{ProgressReporter, Stage};

/// One page of a generated PDF.
#[derive(Debug, Clone, Copy)]
pub struct PageSpec {
    /// Uniform gray level of the page image, or no image at all.
    pub gray: Option<u8>,
}

impl PageSpec {
    pub fn gray(level: u8) -> Self {
        Self { gray: Some(level) }
    }

    pub fn blank() -> Self {
        Self { gray: None }
    }
}

/// Build a PDF whose pages are 300x400 pt and each show one 30x40 gray image.
pub fn image_pdf(pages: &[PageSpec]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::new();

    for page in pages {
        let (resources, operations) = match page.gray {
            Some(level) => {
                let image_id = doc.add_object(Stream::new(
                    dictionary! {
                        "Type" => "XObject",
                        "Subtype" => "Image",
                        "Width" => Object::Integer(30),
                        "Height" => Object::Integer(40),
                        "ColorSpace" => "DeviceGray",
                        "BitsPerComponent" => Object::Integer(8),
                    },
                    vec![level; 30 * 40],
                ));
                let operations = vec![
                    Operation::new("q", vec![]),
                    Operation::new(
                        "cm",
                        vec![
                            Object::Integer(300),
                            Object::Integer(0),
                            Object::Integer(0),
                            Object::Integer(400),
                            Object::Integer(0),
                            Object::Integer(0),
                        ],
                    ),
                    Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                    Operation::new("Q", vec![]),
                ];
                (
                    dictionary! { "XObject" => dictionary! { "Im0" => image_id } },
                    operations,
                )
            }
            None => (Dictionary::new(), Vec::new()),
        };

        let content = Content { operations }.encode().unwrap();
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources,
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(300),
                Object::Integer(400),
            ],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// Build a Letter-sized PDF with one line of Helvetica text per page and no
/// images.
pub fn text_pdf(lines: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let kids: Vec<Object> = lines
        .iter()
        .map(|line| {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(12)]),
                    Operation::new("Td", vec![Object::Integer(50), Object::Integer(700)]),
                    Operation::new("Tj", vec![Object::string_literal(*line)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
            });
            Object::Reference(page_id)
        })
        .collect();

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// Encode a uniform 16x16 gray image.
pub fn gray_image_bytes(level: u8, format: image::ImageFormat) -> Vec<u8> {
    let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(16, 16, Luma([level])));
    let mut buffer = Vec::new();
    image.write_to(&mut Cursor::new(&mut buffer), format).unwrap();
    buffer
}

/// Recognition engine whose workers read the gray level of the top-left
/// pixel and answer with the text registered for it.
#[derive(Default)]
pub struct FakeEngine {
    texts: HashMap<u8, String>,
    failing: Vec<u8>,
    created: AtomicUsize,
    terminated: Arc<AtomicUsize>,
    fail_next: AtomicBool,
}

impl FakeEngine {
    pub fn with_text(mut self, level: u8, text: &str) -> Self {
        self.texts.insert(level, text.to_string());
        self
    }

    pub fn failing_on(mut self, level: u8) -> Self {
        self.failing.push(level);
        self
    }

    pub fn fail_next_creation(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn terminated(&self) -> usize {
        self.terminated.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecognitionEngine for FakeEngine {
    async fn create_worker(&self, language: &str) -> Result<Box<dyn RecognitionWorker>, OcrError> {
        // Let concurrent acquisitions interleave.
        tokio::task::yield_now().await;

        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(OcrError::ModelLoad("scripted failure".to_string()));
        }

        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeWorker {
            language: language.to_string(),
            texts: self.texts.clone(),
            failing: self.failing.clone(),
            terminated: Arc::clone(&self.terminated),
        }))
    }
}

struct FakeWorker {
    language: String,
    texts: HashMap<u8, String>,
    failing: Vec<u8>,
    terminated: Arc<AtomicUsize>,
}

/// Resampling may shift a uniform level by a step or two.
fn near(a: u8, b: u8) -> bool {
    a.abs_diff(b) <= 3
}

#[async_trait]
impl RecognitionWorker for FakeWorker {
    fn language(&self) -> &str {
        &self.language
    }

    async fn recognize(
        &self,
        image: &PageImage,
        progress: &ProgressReporter,
    ) -> Result<String, OcrError> {
        tokio::task::yield_now().await;
        let level = image.image.to_luma8().get_pixel(0, 0).0[0];

        if self.failing.iter().any(|l| near(*l, level)) {
            return Err(OcrError::Recognition(format!("cannot read level {}", level)));
        }

        progress.report(50.0, Stage::Recognizing(image.page));

        Ok(self
            .texts
            .iter()
            .find(|(l, _)| near(**l, level))
            .map(|(_, text)| text.clone())
            .unwrap_or_default())
    }

    async fn terminate(&self) -> Result<(), OcrError> {
        self.terminated.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
