//! Structure extraction: a PDF goes in, a manifest comes back.
//!
//! The model call is wrapped in key rotation. A rotation attempt is the
//! whole exchange: upload the PDF under the candidate key, wait for the
//! file to become active, request JSON, clean up. Quota and auth errors
//! move to the next key; anything else (a corrupt PDF, an unusable
//! response) aborts, because retrying it under another key cannot help.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;
use tomecut_gemini::{
    GeminiBackend, KeyRing, delete_file, generate_json, upload_file, wait_until_active,
};
use tomecut_pdf::RangeSplitter;
use tracing::{debug, info};

use crate::error::Result;
use crate::layout::BookWorkspace;
use crate::model::named_ranges;
use crate::split::split_named_ranges;

/// How long an uploaded file may stay in `PROCESSING` before giving up.
const FILE_ACTIVE_TIMEOUT: Duration = Duration::from_secs(300);

/// Uploads `pdf_path` and asks `model` for structured JSON.
///
/// Each key attempt re-uploads the file; uploads are tied to the key
/// that made them.
pub fn extract_structure(
    ring: &KeyRing,
    pdf_path: &Path,
    prompt: &str,
    model: &str,
) -> Result<Value> {
    let value = ring.try_each(|key| {
        let backend = GeminiBackend::new(key).with_model(model);
        let cfg = backend.config();
        let file = upload_file(&cfg, pdf_path)?;
        let file = wait_until_active(&cfg, file, FILE_ACTIVE_TIMEOUT)?;
        let result = generate_json(&cfg, prompt, Some(&file));
        if let Err(e) = delete_file(&cfg, &file.name) {
            debug!(file = %file.name, error = %e, "uploaded file not deleted");
        }
        result
    })?;
    Ok(value)
}

/// What the book stage produced.
#[derive(Debug)]
pub struct BookExtraction {
    /// Raw structure manifest as the model returned it.
    pub manifest: Value,
    /// Where the manifest was saved.
    pub manifest_path: PathBuf,
    /// Topic PDFs written.
    pub topics: Vec<PathBuf>,
    /// Lesson PDFs written.
    pub lessons: Vec<PathBuf>,
}

/// Runs the book stage: extract the structure manifest, save it into a
/// fresh workspace, and split the book into topic and lesson PDFs.
pub fn extract_book_structure(
    ring: &KeyRing,
    book_pdf: &Path,
    output_root: &Path,
    prompt: &str,
    model: &str,
) -> Result<BookExtraction> {
    let manifest = extract_structure(ring, book_pdf, prompt, model)?;

    let ws = BookWorkspace::prepare(output_root, book_pdf)?;
    let manifest_path = ws.manifest_path();
    write_pretty_json(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "structure manifest saved");

    let splitter = RangeSplitter::open(book_pdf)?;
    let topics = split_named_ranges(
        &splitter,
        &named_ranges(&manifest, "list_topic"),
        &ws.topic_dir(),
        ws.stem(),
    )?;
    let lessons = split_named_ranges(
        &splitter,
        &named_ranges(&manifest, "list_lesson"),
        &ws.lesson_dir(),
        ws.stem(),
    )?;
    info!(topics = topics.len(), lessons = lessons.len(), "book split");

    Ok(BookExtraction { manifest, manifest_path, topics, lessons })
}

pub(crate) fn write_pretty_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    fs::write(path, bytes)?;
    Ok(())
}
