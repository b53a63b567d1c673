//! PDF processing: loading, page geometry, rasterization and text layers.

mod raster;
#[cfg(feature = "pdfium")]
mod render;
mod text_layer;

pub use raster::rasterize_page;
#[cfg(feature = "pdfium")]
pub use render::PdfiumRenderer;
pub use text_layer::{layer_lines, reconstruct, TextLayout};

use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::debug;

use crate::error::PdfError;

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// US Letter, used when a page tree carries no MediaBox at all.
const DEFAULT_PAGE_SIZE: (f32, f32) = (612.0, 792.0);

/// Guard against cyclic `Parent` chains in malformed files.
const MAX_TREE_DEPTH: usize = 32;

/// Parse a PDF, decrypting it when it only uses the empty password.
pub fn load_document(data: &[u8]) -> Result<Document> {
    let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

    if doc.is_encrypted() {
        if doc.decrypt("").is_err() {
            return Err(PdfError::Encrypted);
        }
        debug!("Decrypted PDF with empty password");
    }

    let page_count = doc.get_pages().len();
    if page_count == 0 {
        return Err(PdfError::NoPages);
    }

    debug!("Loaded PDF with {} pages", page_count);
    Ok(doc)
}

/// Object id of a 1-based page number.
pub(crate) fn page_id(doc: &Document, page: u32) -> Result<ObjectId> {
    doc.get_pages()
        .get(&page)
        .copied()
        .ok_or(PdfError::InvalidPage(page))
}

/// Look up a page attribute, following `Parent` links for inheritable keys.
pub(crate) fn inherited_attribute<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut node_id = page_id;

    for _ in 0..MAX_TREE_DEPTH {
        let dict = doc.get_object(node_id).ok()?.as_dict().ok()?;

        if let Ok(value) = dict.get(key) {
            return match value {
                Object::Reference(id) => doc.get_object(*id).ok(),
                other => Some(other),
            };
        }

        node_id = dict.get(b"Parent").ok()?.as_reference().ok()?;
    }

    None
}

/// Resources dictionary of a page, handling inheritance.
pub(crate) fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    inherited_attribute(doc, page_id, b"Resources")?.as_dict().ok()
}

/// Visible page box as `(x, y, width, height)` in points.
pub(crate) fn page_box(doc: &Document, page_id: ObjectId) -> (f32, f32, f32, f32) {
    let rect = inherited_attribute(doc, page_id, b"MediaBox")
        .and_then(|obj| obj.as_array().ok())
        .and_then(|items| {
            let values: Vec<f32> = items
                .iter()
                .filter_map(|item| match item {
                    Object::Reference(id) => doc.get_object(*id).ok()?.as_float().ok(),
                    other => other.as_float().ok(),
                })
                .collect();
            (values.len() == 4).then_some(values)
        });

    match rect {
        Some(v) => {
            let (x1, x2) = (v[0].min(v[2]), v[0].max(v[2]));
            let (y1, y2) = (v[1].min(v[3]), v[1].max(v[3]));
            (x1, y1, x2 - x1, y2 - y1)
        }
        None => (0.0, 0.0, DEFAULT_PAGE_SIZE.0, DEFAULT_PAGE_SIZE.1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{image_pdf, PageSpec};

    #[test]
    fn test_load_reports_page_count() {
        let data = image_pdf(&[PageSpec::gray(10), PageSpec::gray(20)]);
        let doc = load_document(&data).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn test_load_rejects_garbage() {
        assert!(matches!(
            load_document(b"definitely not a pdf"),
            Err(PdfError::Parse(_))
        ));
    }

    #[test]
    fn test_media_box_is_inherited() {
        let data = image_pdf(&[PageSpec::gray(10)]);
        let doc = load_document(&data).unwrap();
        let id = page_id(&doc, 1).unwrap();
        assert_eq!(page_box(&doc, id), (0.0, 0.0, 300.0, 400.0));
        assert!(page_resources(&doc, id).is_some());
        assert!(matches!(page_id(&doc, 2), Err(PdfError::InvalidPage(2))));
    }
}
