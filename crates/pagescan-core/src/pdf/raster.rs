//! Page rasterization from the raster content embedded in a PDF page.

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageBuffer, Rgba};
use lopdf::{Document, Object};
use tracing::{debug, trace};

use super::{page_box, page_id, page_resources, Result};
use crate::error::PdfError;
use crate::models::document::PageImage;

/// Render a page at `scale` times its size in points.
///
/// The largest image XObject on the page is resampled to the scaled page
/// size. Scanned documents carry one full-page image per page, which is the
/// case this targets.
pub fn rasterize_page(doc: &Document, page: u32, scale: f32) -> Result<PageImage> {
    let id = page_id(doc, page)?;
    let (_, _, width_pt, height_pt) = page_box(doc, id);

    let width = ((width_pt * scale).round() as u32).max(1);
    let height = ((height_pt * scale).round() as u32).max(1);

    let source = page_images(doc, id)
        .into_iter()
        .max_by_key(|img| u64::from(img.width()) * u64::from(img.height()))
        .ok_or_else(|| {
            PdfError::ImageExtraction(format!("page {} has no decodable raster content", page))
        })?;

    debug!(
        "Rasterizing page {}: {}x{} source -> {}x{} (scale {})",
        page,
        source.width(),
        source.height(),
        width,
        height,
        scale
    );

    let image = if source.width() == width && source.height() == height {
        source
    } else {
        source.resize_exact(width, height, FilterType::Triangle)
    };

    Ok(PageImage::new(page, image))
}

/// Decode every image XObject referenced by a page's resources.
fn page_images(doc: &Document, page_id: lopdf::ObjectId) -> Vec<DynamicImage> {
    let Some(resources) = page_resources(doc, page_id) else {
        return Vec::new();
    };

    let xobjects = match resources.get(b"XObject") {
        Ok(Object::Dictionary(dict)) => dict,
        Ok(Object::Reference(id)) => match doc.get_object(*id).and_then(Object::as_dict) {
            Ok(dict) => dict,
            Err(_) => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    xobjects
        .iter()
        .filter_map(|(_name, obj_ref)| {
            let (_, obj) = doc.dereference(obj_ref).ok()?;
            decode_image_object(doc, obj)
        })
        .collect()
}

fn decode_image_object(doc: &Document, obj: &Object) -> Option<DynamicImage> {
    let Object::Stream(stream) = obj else {
        return None;
    };
    let dict = &stream.dict;

    if dict.get(b"Subtype").ok()?.as_name().ok()? != b"Image" {
        return None;
    }

    let width = dict.get(b"Width").ok()?.as_i64().ok()? as u32;
    let height = dict.get(b"Height").ok()?.as_i64().ok()? as u32;

    trace!("Found image object: {}x{}", width, height);

    if let Ok(filter) = dict.get(b"Filter") {
        let filter_name = match filter {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
            _ => None,
        };

        match filter_name {
            Some(b"DCTDecode") => {
                trace!("Decoding JPEG image");
                return image::load_from_memory_with_format(
                    &stream.content,
                    image::ImageFormat::Jpeg,
                )
                .ok();
            }
            Some(b"JPXDecode") | Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
                trace!("Unsupported image filter: {:?}", filter_name.map(String::from_utf8_lossy));
                return None;
            }
            _ => {}
        }
    }

    let data = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());

    let color_space = dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|o| match o {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
            Object::Reference(r) => doc.get_object(*r).ok().and_then(|o| o.as_name().ok()),
            _ => None,
        })
        .unwrap_or(b"DeviceRGB");

    let bits = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(8) as u8;

    image_from_raw(&data, width, height, color_space, bits)
}

fn image_from_raw(
    data: &[u8],
    width: u32,
    height: u32,
    color_space: &[u8],
    bits_per_component: u8,
) -> Option<DynamicImage> {
    if width == 0 || height == 0 {
        return None;
    }
    let pixels = (width as usize) * (height as usize);

    match (color_space, bits_per_component) {
        (b"DeviceRGB" | b"RGB", 8) if data.len() >= pixels * 3 => {
            let mut rgba = Vec::with_capacity(pixels * 4);
            for chunk in data[..pixels * 3].chunks_exact(3) {
                rgba.extend_from_slice(&[chunk[0], chunk[1], chunk[2], 255]);
            }
            ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, rgba).map(DynamicImage::ImageRgba8)
        }
        (b"DeviceGray" | b"G", 8) if data.len() >= pixels => {
            GrayImage::from_raw(width, height, data[..pixels].to_vec()).map(DynamicImage::ImageLuma8)
        }
        (b"DeviceGray" | b"G", 1) => {
            // Rows are padded to whole bytes; 1 is white.
            let row_bytes = (width as usize).div_ceil(8);
            if data.len() < row_bytes * height as usize {
                return None;
            }
            let mut gray = Vec::with_capacity(pixels);
            for row in data.chunks_exact(row_bytes).take(height as usize) {
                for x in 0..width as usize {
                    let bit = (row[x / 8] >> (7 - (x % 8))) & 1;
                    gray.push(if bit == 1 { 255 } else { 0 });
                }
            }
            GrayImage::from_raw(width, height, gray).map(DynamicImage::ImageLuma8)
        }
        _ => {
            trace!(
                "Could not decode image: colorspace={}, bits={}, data_len={}",
                String::from_utf8_lossy(color_space),
                bits_per_component,
                data.len()
            );
            None
        }
    }
}
