//! Full page rendering through pdfium.
//!
//! The library is bound at runtime, so a build with this module still works
//! on machines without pdfium; [`PdfiumRenderer::bind`] just returns `None`.

use pdfium_render::prelude::*;
use tracing::debug;

use super::Result;
use crate::error::PdfError;
use crate::models::document::PageImage;

pub struct PdfiumRenderer {
    pdfium: Pdfium,
}

impl PdfiumRenderer {
    /// Bind pdfium from the working directory or the system library path.
    pub fn bind() -> Option<Self> {
        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library());

        match bindings {
            Ok(bindings) => Some(Self {
                pdfium: Pdfium::new(bindings),
            }),
            Err(e) => {
                debug!("pdfium not available: {}", e);
                None
            }
        }
    }

    /// Render a 1-based page of `data` at `scale` pixels per point.
    pub fn render(&self, data: &[u8], page: u32, scale: f32) -> Result<PageImage> {
        let document = self
            .pdfium
            .load_pdf_from_byte_slice(data, None)
            .map_err(|e| PdfError::Parse(e.to_string()))?;

        let index = page
            .checked_sub(1)
            .and_then(|i| u16::try_from(i).ok())
            .ok_or(PdfError::InvalidPage(page))?;
        let pdf_page = document
            .pages()
            .get(index)
            .map_err(|_| PdfError::InvalidPage(page))?;

        let width = ((pdf_page.width().value * scale).round() as i32).max(1);
        let height = ((pdf_page.height().value * scale).round() as i32).max(1);

        let bitmap = pdf_page
            .render_with_config(
                &PdfRenderConfig::new()
                    .set_target_width(width)
                    .set_target_height(height)
                    .render_form_data(true)
                    .render_annotations(true),
            )
            .map_err(|e| PdfError::ImageExtraction(format!("page {}: {}", page, e)))?;

        debug!("Rendered page {} with pdfium at {}x{}", page, width, height);
        Ok(PageImage::new(page, bitmap.as_image()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::text_pdf;

    #[test]
    fn test_renders_text_page_when_library_present() {
        let Some(renderer) = PdfiumRenderer::bind() else {
            return;
        };
        let data = text_pdf(&["Invoice #100"]);

        let page = renderer.render(&data, 1, 1.0).unwrap();
        assert_eq!((page.width(), page.height()), (612, 792));
        assert!(matches!(
            renderer.render(&data, 2, 1.0),
            Err(PdfError::InvalidPage(2))
        ));
    }
}
