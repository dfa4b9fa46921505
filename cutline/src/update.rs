//! Writing split pieces back into the chunk documents.
//!
//! A full split touches two files: the current chunk's first page takes
//! the bottom piece, and the previous chunk's last page takes the top
//! piece. Targets are resolved into a plan before anything is rewritten,
//! so a caller always knows which files were touched and which were not.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use image::RgbImage;
use regex::Regex;
use serde::Serialize;
use tracing::warn;

use tomecut_pdf::{VAlign, page_count, replace_page_with_image};

use crate::error::Result;

static CHUNK_STEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*_chunk_)(\d+)$").expect("valid regex"));
static CHUNK_DIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"chunk_(\d+)").expect("valid regex"));

/// Outcome of one attempted page replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PageUpdate {
    /// The page was rewritten in place.
    Updated { path: PathBuf, page_index: usize },
    /// No target document could be resolved.
    NotFound { reason: String },
    /// The rewrite failed after being attempted.
    Failed { reason: String },
}

/// Which documents a split touched, current chunk first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    /// Replacement of the current chunk's first page.
    pub current: PageUpdate,
    /// Replacement of the previous chunk's last page, when one applies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<PageUpdate>,
}

/// What happened to the chunk documents, as recorded in the audit file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PdfUpdate {
    /// No rewrite was attempted for this chunk.
    Skipped { reason: String },
    /// Rewrites ran; per-document outcomes inside.
    Applied(UpdateReport),
}

/// A page replacement resolved before any file is touched.
#[derive(Debug, Clone)]
pub struct PlannedPage {
    /// Document to rewrite.
    pub path: PathBuf,
    /// Zero-based page to replace.
    pub page_index: usize,
}

/// The previous chunk's last page, or why it cannot be targeted.
#[derive(Debug)]
pub enum PreviousTarget {
    /// A resolvable page in the previous chunk's document.
    Page(PlannedPage),
    /// No usable previous document.
    Unavailable(String),
}

/// Both targets of a full split, resolved up front.
#[derive(Debug)]
pub struct UpdatePlan {
    /// First page of the current chunk.
    pub current: PlannedPage,
    /// Last page of the previous chunk, if reachable.
    pub previous: PreviousTarget,
}

/// Stem of the chunk preceding `stem` in the same lesson, with the
/// numeric suffix's zero padding preserved. `None` for the first chunk
/// or for stems without a `_chunk_NN` suffix.
#[must_use]
pub fn prev_chunk_stem(stem: &str) -> Option<String> {
    let caps = CHUNK_STEM_RE.captures(stem)?;
    let digits = &caps[2];
    let num: u32 = digits.parse().ok()?;
    if num <= 1 {
        return None;
    }
    Some(format!("{}{:0width$}", &caps[1], num - 1, width = digits.len()))
}

/// Path of the previous chunk's document, derived from the current
/// document's stem and its `chunk_NN` directory.
#[must_use]
pub fn prev_chunk_pdf(current_pdf: &Path) -> Option<PathBuf> {
    let stem = current_pdf.file_stem()?.to_str()?;
    let prev_stem = prev_chunk_stem(stem)?;
    let dir = current_pdf.parent()?;
    let dir_name = dir.file_name()?.to_str()?;
    let caps = CHUNK_DIR_RE.captures(dir_name)?;
    let dir_num: u32 = caps[1].parse().ok()?;
    if dir_num <= 1 {
        return None;
    }
    let prev_dir = dir.parent()?.join(format!("chunk_{:02}", dir_num - 1));
    Some(prev_dir.join(format!("{prev_stem}.pdf")))
}

/// Resolves both targets of a full split without touching either file.
#[must_use]
pub fn plan_content_head_updates(current_pdf: &Path) -> UpdatePlan {
    let current = PlannedPage { path: current_pdf.to_path_buf(), page_index: 0 };
    let previous = match prev_chunk_pdf(current_pdf) {
        None => PreviousTarget::Unavailable("no previous chunk".into()),
        Some(path) if !path.exists() => {
            PreviousTarget::Unavailable(format!("missing {}", path.display()))
        }
        Some(path) => match page_count(&path) {
            Ok(0) => PreviousTarget::Unavailable(format!("{} has no pages", path.display())),
            Ok(n) => PreviousTarget::Page(PlannedPage { path, page_index: n - 1 }),
            Err(e) => {
                PreviousTarget::Unavailable(format!("cannot open {}: {e}", path.display()))
            }
        },
    };
    UpdatePlan { current, previous }
}

/// Applies a full-split plan: bottom piece into the current chunk's first
/// page, then top piece into the previous chunk's last page.
///
/// A failure on the current document is an error, since the chunk is then
/// in its original state and the run should say so. A failure on the
/// previous document is recorded in the report instead; the current
/// document has already been rewritten and rolling it back would lose
/// that work.
pub fn apply_content_head_updates(
    plan: &UpdatePlan,
    top: &RgbImage,
    bottom: &RgbImage,
    make_backup: bool,
) -> Result<UpdateReport> {
    replace_page_with_image(
        &plan.current.path,
        bottom,
        plan.current.page_index,
        VAlign::Top,
        make_backup,
    )?;
    let current = PageUpdate::Updated {
        path: plan.current.path.clone(),
        page_index: plan.current.page_index,
    };

    let previous = match &plan.previous {
        PreviousTarget::Unavailable(reason) => PageUpdate::NotFound { reason: reason.clone() },
        PreviousTarget::Page(page) => {
            match replace_page_with_image(&page.path, top, page.page_index, VAlign::Top, make_backup)
            {
                Ok(()) => {
                    PageUpdate::Updated { path: page.path.clone(), page_index: page.page_index }
                }
                Err(e) => {
                    warn!(path = %page.path.display(), error = %e, "previous chunk update failed");
                    PageUpdate::Failed { reason: e.to_string() }
                }
            }
        }
    };

    Ok(UpdateReport { current, previous: Some(previous) })
}

/// Rewrites only the current chunk's first page with the bottom piece.
pub fn apply_bottom_only_update(
    current_pdf: &Path,
    bottom: &RgbImage,
    make_backup: bool,
) -> Result<UpdateReport> {
    replace_page_with_image(current_pdf, bottom, 0, VAlign::Top, make_backup)?;
    Ok(UpdateReport {
        current: PageUpdate::Updated { path: current_pdf.to_path_buf(), page_index: 0 },
        previous: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;
    use lopdf::{Document, Object, Stream};

    fn build_doc(pages: usize) -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids = Vec::new();
        for i in 0..pages {
            let content = Stream::new(
                dictionary! {},
                format!("% page {i}").into_bytes(),
            );
            let content_id = doc.add_object(content);
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }
        let count = i64::try_from(pages).unwrap();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    #[test]
    fn previous_stem_keeps_zero_padding() {
        assert_eq!(prev_chunk_stem("bai_5_chunk_03").as_deref(), Some("bai_5_chunk_02"));
        assert_eq!(prev_chunk_stem("bai_5_chunk_10").as_deref(), Some("bai_5_chunk_09"));
        assert_eq!(prev_chunk_stem("bai_5_chunk_100").as_deref(), Some("bai_5_chunk_099"));
        assert_eq!(prev_chunk_stem("bai_5_chunk_01"), None);
        assert_eq!(prev_chunk_stem("bai_5_chunk_1"), None);
        assert_eq!(prev_chunk_stem("bai_5"), None);
    }

    #[test]
    fn previous_pdf_lives_in_the_sibling_chunk_dir() {
        let current = Path::new("/books/x/Chunk/bai_2/chunk_03/bai_2_chunk_03.pdf");
        assert_eq!(
            prev_chunk_pdf(current),
            Some(PathBuf::from("/books/x/Chunk/bai_2/chunk_02/bai_2_chunk_02.pdf"))
        );
        let first = Path::new("/books/x/Chunk/bai_2/chunk_01/bai_2_chunk_01.pdf");
        assert_eq!(prev_chunk_pdf(first), None);
    }

    #[test]
    fn plan_reports_missing_previous_document() {
        let dir = tempfile::tempdir().unwrap();
        let cur_dir = dir.path().join("chunk_02");
        std::fs::create_dir_all(&cur_dir).unwrap();
        let cur_pdf = cur_dir.join("les_chunk_02.pdf");
        build_doc(1).save(&cur_pdf).unwrap();

        let plan = plan_content_head_updates(&cur_pdf);
        assert_eq!(plan.current.page_index, 0);
        match plan.previous {
            PreviousTarget::Unavailable(reason) => assert!(reason.starts_with("missing ")),
            PreviousTarget::Page(_) => panic!("previous document does not exist"),
        }
    }

    #[test]
    fn full_split_rewrites_both_documents() {
        let dir = tempfile::tempdir().unwrap();
        let prev_dir = dir.path().join("chunk_01");
        let cur_dir = dir.path().join("chunk_02");
        std::fs::create_dir_all(&prev_dir).unwrap();
        std::fs::create_dir_all(&cur_dir).unwrap();
        let prev_pdf = prev_dir.join("les_chunk_01.pdf");
        let cur_pdf = cur_dir.join("les_chunk_02.pdf");
        build_doc(3).save(&prev_pdf).unwrap();
        build_doc(2).save(&cur_pdf).unwrap();

        let plan = plan_content_head_updates(&cur_pdf);
        let piece = RgbImage::from_pixel(40, 20, image::Rgb([10, 20, 30]));
        let report = apply_content_head_updates(&plan, &piece, &piece, false).unwrap();

        assert_eq!(
            report.current,
            PageUpdate::Updated { path: cur_pdf.clone(), page_index: 0 }
        );
        assert_eq!(
            report.previous,
            Some(PageUpdate::Updated { path: prev_pdf.clone(), page_index: 2 })
        );
        assert_eq!(page_count(&cur_pdf).unwrap(), 2);
        assert_eq!(page_count(&prev_pdf).unwrap(), 3);
    }

    #[test]
    fn bottom_only_touches_a_single_document() {
        let dir = tempfile::tempdir().unwrap();
        let cur_pdf = dir.path().join("les_chunk_05.pdf");
        build_doc(1).save(&cur_pdf).unwrap();

        let piece = RgbImage::from_pixel(40, 20, image::Rgb([200, 0, 0]));
        let report = apply_bottom_only_update(&cur_pdf, &piece, false).unwrap();
        assert_eq!(report.previous, None);
        assert!(matches!(report.current, PageUpdate::Updated { page_index: 0, .. }));
    }

    #[test]
    fn update_report_serializes_with_outcome_tags() {
        let report = UpdateReport {
            current: PageUpdate::Updated { path: PathBuf::from("a.pdf"), page_index: 0 },
            previous: Some(PageUpdate::NotFound { reason: "no previous chunk".into() }),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["current"]["outcome"], "updated");
        assert_eq!(json["previous"]["outcome"], "not_found");
        assert_eq!(json["previous"]["reason"], "no previous chunk");
    }
}
