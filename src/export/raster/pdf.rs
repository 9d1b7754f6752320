//! PDF Assembly
//!
//! Wraps one JPEG-encoded bitmap into a multi-page PDF. The image is stored
//! once as an XObject and every page draws it at the page width, shifted up
//! by the page's slice start, with the page's MediaBox clipping the rest.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use log::debug;

use super::paginate::{plan_pages, PageSlice};
use crate::config::PageSize;
use crate::error::{Error, Result};

/// Resource name of the shared page image.
const IMAGE_NAME: &str = "Im0";

const PRODUCER: &str = "mdexport";

/// Build a PDF from a JPEG of `width_px` x `height_px` pixels.
pub fn assemble(
    jpeg: &[u8],
    width_px: u32,
    height_px: u32,
    page_size: PageSize,
    title: Option<&str>,
) -> Result<Vec<u8>> {
    if width_px == 0 || height_px == 0 {
        return Err(Error::Rendering(format!(
            "page image has no area ({}x{})",
            width_px, height_px
        )));
    }

    let page_width = page_size.width_pt();
    let image_height = height_px as f32 * page_width / width_px as f32;
    let slices = plan_pages(image_height, page_size.height_pt());
    if slices.is_empty() {
        return Err(Error::Rendering("no pages to emit".to_string()));
    }

    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let image = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width_px as i64,
            "Height" => height_px as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        jpeg.to_vec(),
    );
    let image_id = doc.add_object(image);
    let resources_id = doc.add_object(dictionary! {
        "XObject" => dictionary! { IMAGE_NAME => image_id },
    });

    let mut page_ids: Vec<ObjectId> = Vec::with_capacity(slices.len());
    for slice in &slices {
        let content = page_content(slice, page_width, image_height);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(page_width),
                Object::Real(slice.height),
            ],
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        page_ids.push(page_id);
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => page_ids.iter().copied().map(Object::Reference).collect::<Vec<_>>(),
        "Count" => page_ids.len() as i64,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut info = dictionary! {
        "Producer" => Object::string_literal(PRODUCER),
    };
    if let Some(title) = title.filter(|t| !t.trim().is_empty()) {
        info.set("Title", text_string(title));
    }
    let info_id = doc.add_object(info);
    doc.trailer.set("Info", info_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    debug!(
        "Assembled PDF: {} pages, {} byte image, {} bytes total",
        slices.len(),
        jpeg.len(),
        out.len()
    );
    Ok(out)
}

/// Draw the shared image so that this page shows `[start, start + height)`.
fn page_content(slice: &PageSlice, page_width: f32, image_height: f32) -> Content {
    // PDF origin is bottom-left; the image top sits `start` above the page top.
    let y = slice.height + slice.start - image_height;
    Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Real(page_width),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(image_height),
                    Object::Integer(0),
                    Object::Real(y),
                ],
            ),
            Operation::new("Do", vec![Object::Name(IMAGE_NAME.as_bytes().to_vec())]),
            Operation::new("Q", vec![]),
        ],
    }
}

/// PDF text string: UTF-16BE with byte order mark.
fn text_string(text: &str) -> Object {
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
