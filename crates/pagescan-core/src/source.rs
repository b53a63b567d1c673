//! Documents as a sequence of rasterizable pages.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use lopdf::Document;
use tracing::{debug, warn};

use crate::error::{OcrError, PagescanError, PdfError};
use crate::intake::MediaType;
use crate::models::config::PageRenderer;
use crate::models::document::PageImage;
use crate::pdf;

/// A document the pipeline can walk page by page.
pub trait DocumentSource {
    /// Kind of the underlying file.
    fn media_type(&self) -> MediaType;

    /// Number of pages (1 for flat images).
    fn page_count(&self) -> u32;

    /// Render a 1-based page at `scale` times its natural size.
    fn rasterize_page(&self, page: u32, scale: f32) -> Result<PageImage, PdfError>;

    /// Whether the document has pages and gets a reconstructed artifact.
    fn is_paginated(&self) -> bool {
        self.media_type().is_paginated()
    }

    /// Text the page already carries, if any.
    fn embedded_text(&self, _page: u32) -> Option<String> {
        None
    }
}

/// Open the right source for a media type.
pub fn open_source(
    data: &[u8],
    media_type: MediaType,
    renderer: PageRenderer,
) -> Result<Box<dyn DocumentSource>, PagescanError> {
    let source: Box<dyn DocumentSource> = if media_type.is_paginated() {
        Box::new(PaginatedSource::open(data, renderer)?)
    } else {
        Box::new(FlatImageSource::open(data, media_type)?)
    };
    Ok(source)
}

/// A single JPEG, PNG or TIFF image.
pub struct FlatImageSource {
    image: DynamicImage,
    media_type: MediaType,
}

impl FlatImageSource {
    pub fn open(data: &[u8], media_type: MediaType) -> Result<Self, OcrError> {
        let format = match media_type {
            MediaType::Jpeg => ImageFormat::Jpeg,
            MediaType::Png => ImageFormat::Png,
            MediaType::Tiff => ImageFormat::Tiff,
            MediaType::Pdf => {
                return Err(OcrError::InvalidImage("a PDF is not a flat image".to_string()));
            }
        };

        let image = image::load_from_memory_with_format(data, format)
            .map_err(|e| OcrError::InvalidImage(e.to_string()))?;

        debug!("Decoded {} image: {:?}", media_type, image.dimensions());
        Ok(Self { image, media_type })
    }
}

impl DocumentSource for FlatImageSource {
    fn media_type(&self) -> MediaType {
        self.media_type
    }

    fn page_count(&self) -> u32 {
        1
    }

    fn rasterize_page(&self, page: u32, scale: f32) -> Result<PageImage, PdfError> {
        if page != 1 {
            return Err(PdfError::InvalidPage(page));
        }

        if (scale - 1.0).abs() < f32::EPSILON {
            return Ok(PageImage::new(1, self.image.clone()));
        }

        let (width, height) = self.image.dimensions();
        let width = ((width as f32 * scale).round() as u32).max(1);
        let height = ((height as f32 * scale).round() as u32).max(1);
        Ok(PageImage::new(
            1,
            self.image.resize_exact(width, height, FilterType::Triangle),
        ))
    }
}

/// A PDF document.
///
/// Pages are rendered with pdfium when it is available and selected,
/// otherwise from the largest image embedded in each page.
pub struct PaginatedSource {
    #[cfg(feature = "pdfium")]
    data: Vec<u8>,
    document: Document,
    page_count: u32,
    #[cfg(feature = "pdfium")]
    renderer: Option<pdf::PdfiumRenderer>,
}

impl PaginatedSource {
    pub fn open(data: &[u8], renderer: PageRenderer) -> Result<Self, PdfError> {
        let document = pdf::load_document(data)?;
        let page_count = document.get_pages().len() as u32;

        #[cfg(feature = "pdfium")]
        let renderer = match renderer {
            PageRenderer::Auto => pdf::PdfiumRenderer::bind(),
            PageRenderer::Embedded => None,
        };
        #[cfg(not(feature = "pdfium"))]
        let _ = renderer;

        Ok(Self {
            #[cfg(feature = "pdfium")]
            data: data.to_vec(),
            document,
            page_count,
            #[cfg(feature = "pdfium")]
            renderer,
        })
    }

    /// Whether pages go through the full renderer.
    pub fn renders_pages(&self) -> bool {
        #[cfg(feature = "pdfium")]
        {
            self.renderer.is_some()
        }
        #[cfg(not(feature = "pdfium"))]
        {
            false
        }
    }
}

impl DocumentSource for PaginatedSource {
    fn media_type(&self) -> MediaType {
        MediaType::Pdf
    }

    fn page_count(&self) -> u32 {
        self.page_count
    }

    fn rasterize_page(&self, page: u32, scale: f32) -> Result<PageImage, PdfError> {
        if page == 0 || page > self.page_count {
            return Err(PdfError::InvalidPage(page));
        }

        #[cfg(feature = "pdfium")]
        if let Some(renderer) = &self.renderer {
            match renderer.render(&self.data, page, scale) {
                Ok(image) => return Ok(image),
                Err(e) => warn!("pdfium could not render page {}, using embedded images: {}", page, e),
            }
        }

        pdf::rasterize_page(&self.document, page, scale)
    }

    fn embedded_text(&self, page: u32) -> Option<String> {
        let text = self.document.extract_text(&[page]).ok()?;
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{gray_image_bytes, image_pdf, text_pdf, PageSpec};

    #[test]
    fn test_flat_image_is_one_page() {
        let data = gray_image_bytes(90, ImageFormat::Png);
        let source = open_source(&data, MediaType::Png, PageRenderer::Auto).unwrap();

        assert!(!source.is_paginated());
        assert_eq!(source.page_count(), 1);
        let page = source.rasterize_page(1, 1.0).unwrap();
        assert_eq!((page.width(), page.height()), (16, 16));
        assert!(source.rasterize_page(2, 1.0).is_err());
    }

    #[test]
    fn test_flat_image_scaling() {
        let data = gray_image_bytes(90, ImageFormat::Tiff);
        let source = FlatImageSource::open(&data, MediaType::Tiff).unwrap();
        let page = source.rasterize_page(1, 2.0).unwrap();
        assert_eq!((page.width(), page.height()), (32, 32));
    }

    #[test]
    fn test_corrupt_image_is_rejected() {
        assert!(matches!(
            FlatImageSource::open(b"not a png", MediaType::Png),
            Err(OcrError::InvalidImage(_))
        ));
    }

    #[test]
    fn test_paginated_source() {
        let data = image_pdf(&[PageSpec::gray(10), PageSpec::gray(20), PageSpec::gray(30)]);
        let source = open_source(&data, MediaType::Pdf, PageRenderer::Embedded).unwrap();

        assert!(source.is_paginated());
        assert_eq!(source.page_count(), 3);
        assert_eq!(source.rasterize_page(3, 1.0).unwrap().page, 3);
        assert!(matches!(
            source.rasterize_page(4, 1.0),
            Err(PdfError::InvalidPage(4))
        ));
    }

    #[test]
    fn test_auto_renderer_sizes_pages_from_media_box() {
        let data = image_pdf(&[PageSpec::gray(10)]);
        let source = PaginatedSource::open(&data, PageRenderer::Auto).unwrap();

        let page = source.rasterize_page(1, 1.0).unwrap();
        assert_eq!((page.width(), page.height()), (300, 400));
        assert!(matches!(
            source.rasterize_page(0, 1.0),
            Err(PdfError::InvalidPage(0))
        ));
    }

    #[test]
    fn test_embedded_renderer_skips_pdfium() {
        let data = image_pdf(&[PageSpec::gray(10)]);
        let source = PaginatedSource::open(&data, PageRenderer::Embedded).unwrap();
        assert!(!source.renders_pages());
    }

    #[test]
    fn test_embedded_text() {
        let data = text_pdf(&["Invoice #100", "Total: $50"]);
        let source = PaginatedSource::open(&data, PageRenderer::Embedded).unwrap();

        assert!(source.embedded_text(1).unwrap().contains("Invoice #100"));
        assert!(source.embedded_text(2).unwrap().contains("Total: $50"));

        let scanned = image_pdf(&[PageSpec::gray(10)]);
        let source = PaginatedSource::open(&scanned, PageRenderer::Embedded).unwrap();
        assert_eq!(source.embedded_text(1), None);
    }
}
