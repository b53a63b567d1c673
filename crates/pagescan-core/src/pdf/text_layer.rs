//! Searchable PDF reconstruction: recognized text drawn as an invisible layer.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, warn};

use super::{load_document, page_box, page_resources, Result};
use crate::error::PdfError;
use crate::models::config::TextPlacement;
use crate::models::document::RecognitionResult;

/// Resource name of the font used for the text layer.
const FONT_RESOURCE: &str = "PagescanOcr";

/// Geometry of the invisible text layer, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextLayout {
    pub font_size: f32,
    pub line_height: f32,
    pub left_margin: f32,
    pub top_margin: f32,
    /// Lines reserved at the bottom of the page.
    pub reserved_lines: usize,
    /// Characters kept per line.
    pub max_line_chars: usize,
}

impl Default for TextLayout {
    fn default() -> Self {
        Self {
            font_size: 8.0,
            line_height: 8.0 * 1.2,
            left_margin: 10.0,
            top_margin: 30.0,
            reserved_lines: 5,
            max_line_chars: 100,
        }
    }
}

impl TextLayout {
    /// Number of lines that fit on a page of the given height.
    pub fn capacity(&self, page_height: f32) -> usize {
        let rows = (page_height / self.line_height).floor();
        if rows <= 0.0 {
            return 0;
        }
        (rows as usize).saturating_sub(self.reserved_lines)
    }
}

fn is_layer_line(line: &str) -> bool {
    !line.trim().is_empty() && !line.starts_with("---")
}

/// Assign recognized lines to pages.
///
/// Returns one entry per page. With [`TextPlacement::EvenSplit`] the lines of
/// all pages are concatenated and cut into `ceil(lines / pages)` chunks by
/// position; with [`TextPlacement::PerPage`] each page keeps its own lines and
/// failed pages get none.
pub fn layer_lines(
    results: &[RecognitionResult],
    page_count: usize,
    placement: TextPlacement,
) -> Vec<Vec<String>> {
    let mut pages = vec![Vec::new(); page_count];
    if page_count == 0 {
        return pages;
    }

    match placement {
        TextPlacement::PerPage => {
            for result in results.iter().filter(|r| !r.is_failed()) {
                let index = (result.page as usize).wrapping_sub(1);
                if let Some(lines) = pages.get_mut(index) {
                    lines.extend(
                        result
                            .text
                            .lines()
                            .filter(|l| is_layer_line(l))
                            .map(str::to_string),
                    );
                }
            }
        }
        TextPlacement::EvenSplit => {
            let all: Vec<String> = results
                .iter()
                .flat_map(|r| r.text.lines())
                .filter(|l| is_layer_line(l))
                .map(str::to_string)
                .collect();
            let per_page = all.len().div_ceil(page_count);
            if per_page > 0 {
                for (lines, chunk) in pages.iter_mut().zip(all.chunks(per_page)) {
                    lines.extend_from_slice(chunk);
                }
            }
        }
    }

    pages
}

/// Rebuild `original` with the recognized text laid invisibly over each page.
///
/// The document is parsed afresh from `original`, so nothing left behind by
/// rasterization leaks into the output.
pub fn reconstruct(
    original: &[u8],
    results: &[RecognitionResult],
    placement: TextPlacement,
    layout: &TextLayout,
) -> Result<Vec<u8>> {
    let mut doc = load_document(original)?;
    let pages: Vec<ObjectId> = doc.get_pages().values().copied().collect();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let assignments = layer_lines(results, pages.len(), placement);
    let mut drawn = 0usize;

    for (page_id, lines) in pages.iter().zip(assignments) {
        let (x, y, _, height) = page_box(&doc, *page_id);
        let capacity = layout.capacity(height);
        if lines.len() > capacity {
            debug!(
                "Dropping {} lines beyond page capacity of {}",
                lines.len() - capacity,
                capacity
            );
        }

        let lines: Vec<&String> = lines.iter().take(capacity).collect();
        if lines.is_empty() {
            continue;
        }

        let overlay = text_operations(&lines, layout, x, y + height);
        let encoded = Content { operations: overlay }
            .encode()
            .map_err(|e| PdfError::Annotation(e.to_string()))?;

        overlay_page(&mut doc, *page_id, font_id, encoded)?;
        drawn += lines.len();
    }

    debug!("Drew {} invisible lines over {} pages", drawn, pages.len());

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| PdfError::Serialize(e.to_string()))?;

    Ok(buffer)
}

fn text_operations(lines: &[&String], layout: &TextLayout, left: f32, top: f32) -> Vec<Operation> {
    let mut ops = vec![
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![
                Object::Name(FONT_RESOURCE.as_bytes().to_vec()),
                Object::Real(layout.font_size),
            ],
        ),
        // Render mode 3: neither fill nor stroke.
        Operation::new("Tr", vec![Object::Integer(3)]),
    ];

    for (i, line) in lines.iter().enumerate() {
        let truncated: String = line.chars().take(layout.max_line_chars).collect();
        let x = left + layout.left_margin;
        let y = top - layout.top_margin - i as f32 * layout.line_height;

        ops.push(Operation::new(
            "Tm",
            vec![
                Object::Real(1.0),
                Object::Real(0.0),
                Object::Real(0.0),
                Object::Real(1.0),
                Object::Real(x),
                Object::Real(y),
            ],
        ));
        ops.push(Operation::new(
            "Tj",
            vec![Object::string_literal(to_latin1(&truncated))],
        ));
    }

    ops.push(Operation::new("ET", vec![]));
    ops
}

/// Encode for a WinAnsi font; characters outside Latin-1 become `?`.
fn to_latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

/// Wrap the existing page content in `q`/`Q` and append the overlay.
fn overlay_page(
    doc: &mut Document,
    page_id: ObjectId,
    font_id: ObjectId,
    overlay: Vec<u8>,
) -> Result<()> {
    register_font(doc, page_id, font_id)?;

    let existing: Vec<Object> = {
        let page = doc.get_object(page_id).and_then(Object::as_dict)?;
        match page.get(b"Contents") {
            Ok(Object::Reference(id)) => match doc.get_object(*id) {
                Ok(Object::Array(items)) => items.clone(),
                _ => vec![Object::Reference(*id)],
            },
            Ok(Object::Array(items)) => items.clone(),
            _ => Vec::new(),
        }
    };

    let save_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let mut restore = b"\nQ\n".to_vec();
    restore.extend(overlay);
    let overlay_id = doc.add_object(Stream::new(Dictionary::new(), restore));

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(save_id));
    contents.extend(existing);
    contents.push(Object::Reference(overlay_id));

    doc.get_object_mut(page_id)
        .and_then(Object::as_dict_mut)?
        .set("Contents", Object::Array(contents));

    Ok(())
}

/// Make the text layer font available in the page's resources.
fn register_font(doc: &mut Document, page_id: ObjectId, font_id: ObjectId) -> Result<()> {
    let has_own = doc
        .get_object(page_id)
        .and_then(Object::as_dict)?
        .has(b"Resources");

    if !has_own {
        // Pin inherited resources to the page before adding to them.
        let inherited = page_resources(doc, page_id)
            .cloned()
            .unwrap_or_else(Dictionary::new);
        doc.get_object_mut(page_id)
            .and_then(Object::as_dict_mut)?
            .set("Resources", inherited);
    }

    let fonts_id = {
        let resources = doc
            .get_or_create_resources(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| PdfError::Annotation(e.to_string()))?;

        match resources.get(b"Font").ok().cloned() {
            Some(Object::Reference(id)) => Some(id),
            Some(Object::Dictionary(mut fonts)) => {
                fonts.set(FONT_RESOURCE, font_id);
                resources.set("Font", fonts);
                None
            }
            Some(_) => {
                warn!("Ignoring malformed Font resource entry");
                resources.set("Font", dictionary! { FONT_RESOURCE => font_id });
                None
            }
            None => {
                resources.set("Font", dictionary! { FONT_RESOURCE => font_id });
                None
            }
        }
    };

    if let Some(id) = fonts_id {
        doc.get_object_mut(id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| PdfError::Annotation(e.to_string()))?
            .set(FONT_RESOURCE, font_id);
    }

    Ok(())
}
