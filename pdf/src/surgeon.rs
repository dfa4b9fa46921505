use std::path::{Path, PathBuf};

use image::RgbImage;
use image::codecs::jpeg::JpegEncoder;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{PdfError, Result};

const JPEG_QUALITY: u8 = 90;

/// Vertical placement of a replacement image on its page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VAlign {
    /// Anchor the image to the top edge of the page.
    Top,
    /// Anchor the image to the bottom edge.
    Bottom,
    /// Center the image vertically.
    Center,
}

/// Number of pages in the document at `path`.
pub fn page_count(path: &Path) -> Result<usize> {
    let doc = Document::load(path).map_err(|e| PdfError::Parse(e.to_string()))?;
    Ok(doc.get_pages().len())
}

/// Replaces page `page_index` (zero-based) of the document at `pdf_path`
/// with `image`, keeping the page's original dimensions and every other
/// page byte-for-byte intact.
///
/// The image is scaled to fit the page with its aspect ratio preserved,
/// centered horizontally, and placed vertically per `align`. The page crop
/// box is set to the placed rectangle so viewers show only the image, and
/// any annotations on the page are dropped along with its old content.
///
/// The rewritten document is serialized to a temporary file in the same
/// directory and renamed over the original, so a crash mid-write never
/// leaves a truncated file at `pdf_path`. With `make_backup` the original
/// bytes are first copied to `<name>.pdf.bak` unless that file exists.
pub fn replace_page_with_image(
    pdf_path: &Path,
    image: &RgbImage,
    page_index: usize,
    align: VAlign,
    make_backup: bool,
) -> Result<()> {
    let mut doc = Document::load(pdf_path).map_err(|e| PdfError::Parse(e.to_string()))?;
    let pages = doc.get_pages();
    let count = pages.len();
    let page_number = u32::try_from(page_index + 1)
        .map_err(|_| PdfError::PageOutOfRange { index: page_index, count })?;
    let page_id = *pages
        .get(&page_number)
        .ok_or(PdfError::PageOutOfRange { index: page_index, count })?;

    let media_box = page_media_box(&doc, page_id)?;
    let rect = fit_rect(media_box, image.width(), image.height(), align);

    // DCTDecode keeps the rebuilt file near the raster's own size.
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
        .encode_image(image)
        .map_err(|e| PdfError::ImageEncode(e.to_string()))?;

    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(image.width()),
            "Height" => i64::from(image.height()),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        jpeg,
    ));

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    rect.width.into(),
                    0.into(),
                    0.into(),
                    rect.height.into(),
                    rect.x.into(),
                    rect.y.into(),
                ],
            ),
            Operation::new("Do", vec!["Im0".into()]),
            Operation::new("Q", vec![]),
        ],
    };
    let encoded = content.encode().map_err(|e| PdfError::Write(e.to_string()))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

    let page_dict = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| PdfError::Parse(e.to_string()))?;
    page_dict.set("Contents", Object::Reference(content_id));
    page_dict.set(
        "Resources",
        dictionary! {
            "XObject" => dictionary! { "Im0" => Object::Reference(image_id) },
        },
    );
    page_dict.set(
        "CropBox",
        vec![
            rect.x.into(),
            rect.y.into(),
            (rect.x + rect.width).into(),
            (rect.y + rect.height).into(),
        ],
    );
    page_dict.remove(b"Annots");
    page_dict.remove(b"Rotate");

    if make_backup {
        let backup = backup_path(pdf_path);
        if !backup.exists() {
            std::fs::copy(pdf_path, &backup)?;
        }
    }

    write_atomic(&mut doc, pdf_path)?;
    debug!(
        path = %pdf_path.display(),
        page = page_index,
        align = ?align,
        "replaced page content with image"
    );
    Ok(())
}

/// Placed image rectangle in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PlacedRect {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

fn fit_rect(media: [f32; 4], img_w: u32, img_h: u32, align: VAlign) -> PlacedRect {
    let page_w = media[2] - media[0];
    let page_h = media[3] - media[1];
    let img_w = img_w.max(1) as f32;
    let img_h = img_h.max(1) as f32;
    let scale = (page_w / img_w).min(page_h / img_h);
    let width = img_w * scale;
    let height = img_h * scale;
    let x = media[0] + (page_w - width) / 2.0;
    // PDF user space grows upward, so the top of the page is y1.
    let y = media[1]
        + match align {
            VAlign::Top => page_h - height,
            VAlign::Bottom => 0.0,
            VAlign::Center => (page_h - height) / 2.0,
        };
    PlacedRect { x, y, width, height }
}

fn page_media_box(doc: &Document, page_id: ObjectId) -> Result<[f32; 4]> {
    let mut current = page_id;
    // MediaBox is inheritable; walk the page tree toward the root.
    for _ in 0..16 {
        let dict = doc
            .get_dictionary(current)
            .map_err(|e| PdfError::Parse(e.to_string()))?;
        if let Ok(entry) = dict.get(b"MediaBox") {
            return rect_entries(doc, entry);
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent)) => current = *parent,
            _ => break,
        }
    }
    Err(PdfError::Parse("page has no MediaBox".to_string()))
}

fn rect_entries(doc: &Document, entry: &Object) -> Result<[f32; 4]> {
    let resolved = match entry {
        Object::Reference(id) => doc
            .get_object(*id)
            .map_err(|e| PdfError::Parse(e.to_string()))?,
        other => other,
    };
    let array = resolved
        .as_array()
        .map_err(|e| PdfError::Parse(e.to_string()))?;
    if array.len() != 4 {
        return Err(PdfError::Parse("MediaBox must have four entries".to_string()));
    }
    let mut out = [0.0f32; 4];
    for (slot, value) in out.iter_mut().zip(array) {
        *slot = number(value)
            .ok_or_else(|| PdfError::Parse("MediaBox entry is not a number".to_string()))?;
    }
    if out[0] > out[2] {
        out.swap(0, 2);
    }
    if out[1] > out[3] {
        out.swap(1, 3);
    }
    Ok(out)
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value),
        _ => None,
    }
}

fn backup_path(pdf_path: &Path) -> PathBuf {
    let mut name = pdf_path.as_os_str().to_os_string();
    name.push(".bak");
    PathBuf::from(name)
}

fn write_atomic(doc: &mut Document, path: &Path) -> Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    let mut tmp = NamedTempFile::new_in(dir.unwrap_or_else(|| Path::new(".")))?;
    doc.save_to(tmp.as_file_mut())
        .map_err(|e| PdfError::Write(e.to_string()))?;
    tmp.persist(path).map_err(|e| PdfError::Io(e.error))?;
    Ok(())
}
