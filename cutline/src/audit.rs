//! Per-chunk audit records and annotated debug images.
//!
//! Every decision about a chunk, successful or not, lands in a JSON
//! record next to an annotated copy of the rendered page. Failures get
//! the same artifacts as successes so a reviewer can always see what
//! the detector saw.

use std::io::Write;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use serde::Serialize;
use tempfile::NamedTempFile;

use tomecut_ocr::BBox;

use crate::cut::SplitOutcome;
use crate::error::{CutlineError, Result};
use crate::matching::Strategy;
use crate::update::PdfUpdate;

const CUT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const LINE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// How the page was (or would have been) divided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CutMode {
    /// The previous section's tail sits above the heading; both pieces
    /// matter.
    ContentHead,
    /// Only the content below the heading is kept.
    HeadingBottomOnly,
}

/// Rendered page dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageSize {
    /// Width.
    pub w: u32,
    /// Height.
    pub h: u32,
}

/// Everything decided about one chunk, written as JSON alongside the
/// annotated page image.
#[derive(Debug, Clone, Serialize)]
pub struct CutAudit {
    /// Whether the chunk ended in a failure state.
    pub failed: bool,
    /// Short machine-readable failure tag, e.g. `"low_match_2_7"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_reason: Option<String>,
    /// Metadata file the chunk was driven from.
    pub chunk_json: PathBuf,
    /// Document whose first page was examined.
    pub chunk_pdf: PathBuf,
    /// Heading line as recorded in the metadata.
    pub heading: String,
    /// Numeral parsed out of the heading.
    pub heading_num: u32,
    /// Title text the matcher searched for.
    pub title: String,
    /// Initials expected from the title, in order.
    pub expected_letters: Vec<char>,
    /// How many expected initials the winning line accounted for.
    pub matched: usize,
    /// Strict prefix agreement between expected and observed initials.
    pub prefix_hits: usize,
    /// Initials observed on the winning line.
    pub observed_initials: Vec<char>,
    /// Which detection pattern won, when a candidate existed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Strategy>,
    /// Bounding box of the winning line in page pixels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_bbox: Option<BBox>,
    /// Row the cut ran along, when one was resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_cut: Option<u32>,
    /// Division mode for this chunk.
    pub mode: CutMode,
    /// Render resolution.
    pub dpi: u16,
    /// Upward nudge applied to the cut row.
    pub offset_px: i32,
    /// Rendered page dimensions.
    pub image_size: ImageSize,
    /// Annotated page image for this record.
    pub debug_png: PathBuf,
    /// Pieces produced by the slice.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub split: Option<SplitOutcome>,
    /// What happened to the chunk documents.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_update: Option<PdfUpdate>,
}

impl CutAudit {
    /// Writes this record as pretty JSON, atomically.
    pub fn write(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self)
    }
}

/// Serializes `value` as pretty JSON into `path` via a temp file in the
/// same directory, so readers never observe a half-written file.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    let mut tmp = NamedTempFile::new_in(parent.unwrap_or_else(|| Path::new(".")))?;
    serde_json::to_writer_pretty(&mut tmp, value)?;
    tmp.write_all(b"\n")?;
    tmp.persist(path).map_err(|e| CutlineError::Io(e.error))?;
    Ok(())
}

/// Copy of the rendered page with the winning line boxed in green and
/// the cut row drawn in red. Either overlay may be absent when the
/// pipeline failed before resolving it.
#[must_use]
pub fn annotate(image: &RgbImage, line_bbox: Option<&BBox>, y_cut: Option<u32>) -> RgbImage {
    let mut out = image.clone();
    if let Some(bbox) = line_bbox {
        draw_box(&mut out, bbox);
    }
    if let Some(y) = y_cut {
        draw_cut(&mut out, y);
    }
    out
}

fn draw_cut(image: &mut RgbImage, y: u32) {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return;
    }
    let y = y.min(height - 1) as f32;
    let right = (width - 1) as f32;
    // Three stacked segments give the cut row a visible thickness.
    for dy in [-1.0, 0.0, 1.0] {
        draw_line_segment_mut(image, (0.0, y + dy), (right, y + dy), CUT_COLOR);
    }
}

fn draw_box(image: &mut RgbImage, bbox: &BBox) {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return;
    }
    let x0 = bbox.x0.clamp(0.0, (width - 1) as f32) as i32;
    let y0 = bbox.y0.clamp(0.0, (height - 1) as f32) as i32;
    let w = (bbox.x1.min(width as f32) - x0 as f32).max(1.0) as u32;
    let h = (bbox.y1.min(height as f32) - y0 as f32).max(1.0) as u32;
    for inset in 0..2i32 {
        let shrink = 2 * inset as u32;
        let rect = Rect::at(x0 + inset, y0 + inset)
            .of_size(w.saturating_sub(shrink).max(1), h.saturating_sub(shrink).max(1));
        draw_hollow_rect_mut(image, rect, LINE_COLOR);
    }
}
