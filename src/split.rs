//! Manifest-driven PDF splitting.
//!
//! Two layers: [`split_named_ranges`] turns validated topic/lesson
//! ranges into standalone PDFs, and [`split_book_chunks`] runs the whole
//! lesson stage, asking the model for each lesson's chunk list and
//! writing the per-chunk directories the boundary engine consumes.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tomecut_cutline::ChunkMeta;
use tomecut_gemini::KeyRing;
use tomecut_pdf::{PdfError, RangeSplitter};
use tracing::{info, warn};

use crate::error::{PipelineError, Result};
use crate::extract::extract_structure;
use crate::layout::{BookWorkspace, chunk_dir_name, chunk_stem, file_stem, split_pdf_name};
use crate::model::{NamedRange, chunk_page_ranges, chunk_specs};

/// Writes one PDF per valid range into `out_dir`.
///
/// Ranges that cannot be honored are skipped with a warning rather than
/// failing the stage: bounds below 1, inverted bounds, or a start past
/// the last page. Ends beyond the document clamp to the last page.
pub fn split_named_ranges(
    splitter: &RangeSplitter,
    ranges: &[NamedRange],
    out_dir: &Path,
    stem: &str,
) -> Result<Vec<PathBuf>> {
    let total = splitter.page_count();
    let mut written = Vec::new();
    for range in ranges {
        if range.start < 1 || range.end < 1 || range.start > range.end {
            warn!(name = %range.name, range.start, range.end, "skipping invalid range");
            continue;
        }
        if range.start > i64::from(total) {
            warn!(name = %range.name, range.start, total, "range starts past the last page");
            continue;
        }
        let (Ok(start), Ok(end)) = (
            u32::try_from(range.start),
            u32::try_from(range.end.min(i64::from(total))),
        ) else {
            continue;
        };
        let dest = out_dir.join(split_pdf_name(stem, &range.name));
        splitter.write_range(start, end, &dest)?;
        written.push(dest);
    }
    Ok(written)
}

/// A lesson the chunk stage did not split, and why.
#[derive(Debug, Serialize)]
pub struct SkippedLesson {
    /// The lesson PDF.
    pub lesson: PathBuf,
    /// Human-readable reason.
    pub reason: String,
}

/// What the chunk stage did across a book.
#[derive(Debug, Serialize)]
pub struct ChunkSplitSummary {
    /// Lesson PDFs found under `Lesson/`.
    pub lesson_count: usize,
    /// Every chunk PDF written.
    pub chunk_pdfs: Vec<PathBuf>,
    /// Lessons skipped or failed, with reasons.
    pub skipped_lessons: Vec<SkippedLesson>,
}

/// Splits every lesson of the book into chunk PDFs with metadata.
///
/// With `resume` set, lessons that already have chunk output are left
/// alone. Per-lesson failures are recorded and the batch continues.
///
/// # Errors
///
/// Only a missing or empty `Lesson/` directory fails the stage.
pub fn split_book_chunks(
    ring: &KeyRing,
    ws: &BookWorkspace,
    prompt_template: &str,
    model: &str,
    resume: bool,
) -> Result<ChunkSplitSummary> {
    let lesson_dir = ws.lesson_dir();
    if !lesson_dir.is_dir() {
        return Err(PipelineError::MissingDir(lesson_dir));
    }
    let chunk_root = ws.chunk_dir();
    fs::create_dir_all(&chunk_root)?;

    let mut lesson_pdfs: Vec<PathBuf> = fs::read_dir(&lesson_dir)?
        .filter_map(std::result::Result::ok)
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("pdf")))
        .collect();
    lesson_pdfs.sort();
    if lesson_pdfs.is_empty() {
        return Err(PipelineError::NoLessons(lesson_dir));
    }

    let mut summary = ChunkSplitSummary {
        lesson_count: lesson_pdfs.len(),
        chunk_pdfs: Vec::new(),
        skipped_lessons: Vec::new(),
    };

    for lesson_pdf in &lesson_pdfs {
        let lesson_stem = file_stem(lesson_pdf);
        let lesson_chunks = chunk_root.join(&lesson_stem);

        if resume && has_chunk_output(&lesson_chunks) {
            info!(lesson = %lesson_pdf.display(), "chunk PDFs already present, skipping");
            summary.skipped_lessons.push(SkippedLesson {
                lesson: lesson_pdf.clone(),
                reason: "chunk PDFs already exist".to_string(),
            });
            continue;
        }

        match split_one_lesson(ring, lesson_pdf, &lesson_chunks, &lesson_stem, prompt_template, model)
        {
            Ok(mut paths) => summary.chunk_pdfs.append(&mut paths),
            Err(e) => {
                warn!(lesson = %lesson_pdf.display(), error = %e, "lesson failed, continuing");
                summary.skipped_lessons.push(SkippedLesson {
                    lesson: lesson_pdf.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
    Ok(summary)
}

fn split_one_lesson(
    ring: &KeyRing,
    lesson_pdf: &Path,
    lesson_chunks: &Path,
    lesson_stem: &str,
    prompt_template: &str,
    model: &str,
) -> Result<Vec<PathBuf>> {
    let splitter = RangeSplitter::open(lesson_pdf)?;
    let total = splitter.page_count();
    if total < 1 {
        return Err(PdfError::Parse("document has no pages".to_string()).into());
    }

    let prompt = prompt_template.replace("{total_pages}", &total.to_string());
    let manifest = extract_structure(ring, lesson_pdf, &prompt, model)?;
    let ranges = chunk_page_ranges(chunk_specs(&manifest), total);

    let mut written = Vec::with_capacity(ranges.len());
    for (i, range) in ranges.into_iter().enumerate() {
        let index = i + 1;
        let dir = lesson_chunks.join(chunk_dir_name(index));
        fs::create_dir_all(&dir)?;

        let stem = chunk_stem(lesson_stem, index);
        let pdf_path = dir.join(format!("{stem}.pdf"));
        splitter.write_range(range.start, range.end, &pdf_path)?;

        let meta =
            ChunkMeta::new(range.heading, range.title, range.content_head, range.start, range.end);
        meta.save(&dir.join(format!("{stem}.json")))?;
        written.push(pdf_path);
    }
    info!(lesson = %lesson_pdf.display(), chunks = written.len(), "lesson split into chunks");
    Ok(written)
}

fn has_chunk_output(lesson_chunks: &Path) -> bool {
    let Ok(entries) = fs::read_dir(lesson_chunks) else {
        return false;
    };
    entries.flatten().any(|entry| {
        let path = entry.path();
        path.is_dir()
            && entry.file_name().to_string_lossy().starts_with("chunk_")
            && fs::read_dir(&path).is_ok_and(|inner| {
                inner
                    .flatten()
                    .any(|e| e.path().extension().is_some_and(|ext| ext.eq_ignore_ascii_case("pdf")))
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Document, Object, Stream, dictionary};
    use tempfile::tempdir;

    fn build_doc(pages: usize) -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids: Vec<Object> = Vec::new();
        for i in 0..pages {
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                format!("% page {i}").into_bytes(),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            });
            kids.push(page_id.into());
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
    fn invalid_ranges_are_skipped_not_fatal() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("book.pdf");
        build_doc(5).save(&src).unwrap();
        let splitter = RangeSplitter::open(&src).unwrap();

        let ranges = vec![
            NamedRange { name: "topic_01".into(), start: 1, end: 2 },
            NamedRange { name: "topic_02".into(), start: 4, end: 3 },
            NamedRange { name: "topic_03".into(), start: 9, end: 12 },
            NamedRange { name: "topic_04".into(), start: 4, end: 99 },
        ];
        let written = split_named_ranges(&splitter, &ranges, dir.path(), "book").unwrap();

        let names: Vec<_> =
            written.iter().map(|p| p.file_name().unwrap().to_string_lossy().into_owned()).collect();
        assert_eq!(names, vec!["book_topic_01.pdf", "book_topic_04.pdf"]);
        // The overlong range clamps to the last page.
        let clamped = Document::load(&written[1]).unwrap();
        assert_eq!(clamped.get_pages().len(), 2);
    }

    #[test]
    fn resume_spots_existing_chunk_output() {
        let dir = tempdir().unwrap();
        let lesson_chunks = dir.path().join("book_lesson_01");
        assert!(!has_chunk_output(&lesson_chunks));

        let chunk_dir = lesson_chunks.join("chunk_01");
        fs::create_dir_all(&chunk_dir).unwrap();
        assert!(!has_chunk_output(&lesson_chunks));

        fs::write(chunk_dir.join("book_lesson_01_chunk_01.pdf"), b"%PDF-1.4\n").unwrap();
        assert!(has_chunk_output(&lesson_chunks));
    }

    #[test]
    fn chunk_directories_carry_pdf_and_metadata() {
        let dir = tempdir().unwrap();
        let lesson_pdf = dir.path().join("book_lesson_02.pdf");
        build_doc(6).save(&lesson_pdf).unwrap();
        let splitter = RangeSplitter::open(&lesson_pdf).unwrap();

        // Exercise the write half of the stage directly.
        let lesson_chunks = dir.path().join("Chunk").join("book_lesson_02");
        let ranges = chunk_page_ranges(
            vec![
                crate::model::ChunkSpec {
                    start: 1,
                    content_head: false,
                    heading: "1.".into(),
                    title: "THÔNG TIN".into(),
                },
                crate::model::ChunkSpec {
                    start: 4,
                    content_head: true,
                    heading: "2.".into(),
                    title: "MẠNG MÁY TÍNH".into(),
                },
            ],
            6,
        );
        for (i, range) in ranges.into_iter().enumerate() {
            let index = i + 1;
            let chunk_dir = lesson_chunks.join(chunk_dir_name(index));
            fs::create_dir_all(&chunk_dir).unwrap();
            let stem = chunk_stem("book_lesson_02", index);
            splitter.write_range(range.start, range.end, &chunk_dir.join(format!("{stem}.pdf"))).unwrap();
            let meta = ChunkMeta::new(
                range.heading,
                range.title,
                range.content_head,
                range.start,
                range.end,
            );
            meta.save(&chunk_dir.join(format!("{stem}.json"))).unwrap();
        }

        let first_pdf = lesson_chunks.join("chunk_01").join("book_lesson_02_chunk_01.pdf");
        assert_eq!(Document::load(&first_pdf).unwrap().get_pages().len(), 4);

        let second_meta = ChunkMeta::load(
            &lesson_chunks.join("chunk_02").join("book_lesson_02_chunk_02.json"),
        )
        .unwrap();
        assert!(second_meta.content_head);
        assert_eq!(second_meta.heading, "2.");
        assert_eq!(second_meta.start, Some(4));
        assert_eq!(second_meta.end, Some(6));
    }
}
