//! Keyword extraction across a book's chunk tree.
//!
//! Each chunk PDF is sent to the model for a fixed number of keywords;
//! the reply is normalized and written to a `.keywords.json` sibling.
//! How many keywords depends on the lesson shape: single-chunk lessons
//! are practice lessons and get a deeper pull than theory lessons.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Value, json};
use tomecut_cutline::ChunkMeta;
use tomecut_gemini::KeyRing;
use tracing::{info, warn};

use crate::error::{PipelineError, Result};
use crate::extract::{extract_structure, write_pretty_json};
use crate::layout::BookWorkspace;

/// Lesson classification by chunk count.
///
/// In this book family a lesson that was not subdivided is a practice
/// lesson ("thuc hanh"); everything else is theory ("ly thuyet").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LessonType {
    /// Hands-on lesson, one chunk, keywords pulled deeper.
    Practice,
    /// Regular theory lesson, keywords pulled per chunk.
    Theory,
}

impl LessonType {
    /// Classifies a lesson by how many chunks it was split into.
    #[must_use]
    pub const fn from_chunk_count(count: usize) -> Self {
        if count == 1 { Self::Practice } else { Self::Theory }
    }

    /// Label recorded in metadata.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Practice => "thuc hanh",
            Self::Theory => "ly thuyet",
        }
    }

    /// How many keywords to request per chunk.
    #[must_use]
    pub const fn keyword_count(self) -> usize {
        match self {
            Self::Practice => 10,
            Self::Theory => 5,
        }
    }
}

/// One normalized keyword.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct KeywordEntry {
    /// The keyword text, trimmed.
    pub keyword: String,
}

/// Counters for one keyword run.
#[derive(Debug, Default, Serialize)]
pub struct KeywordBatchSummary {
    /// Lesson directories visited.
    pub total_lessons: usize,
    /// Chunk PDFs considered.
    pub total_chunks: usize,
    /// Keyword files written with fresh content.
    pub ok: usize,
    /// Chunks whose keyword file already had content.
    pub skip: usize,
    /// Chunks whose extraction failed; a stub file records the error.
    pub fail: usize,
    /// Lesson metadata files that gained or changed their lesson type.
    pub lesson_meta_written: usize,
}

/// Extracts keywords for every chunk under the book's chunk tree.
///
/// `prompt_template` is sent as-is after substituting `{num_keywords}`.
/// A chunk whose `.keywords.json` already holds a non-empty `keywords`
/// array is skipped unless `force_reprocess` is set. Failures write a
/// stub payload recording the error and the batch continues.
pub fn extract_book_keywords(
    ring: &KeyRing,
    ws: &BookWorkspace,
    prompt_template: &str,
    model: &str,
    force_reprocess: bool,
) -> Result<KeywordBatchSummary> {
    let chunk_root = ws.chunk_dir();
    if !chunk_root.is_dir() {
        return Err(PipelineError::MissingDir(chunk_root));
    }

    let mut lesson_dirs: Vec<PathBuf> = fs::read_dir(&chunk_root)?
        .filter_map(std::result::Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    lesson_dirs.sort();

    let mut summary = KeywordBatchSummary { total_lessons: lesson_dirs.len(), ..Default::default() };

    for lesson_dir in &lesson_dirs {
        let chunk_dirs = chunk_dirs_of_lesson(lesson_dir);
        if chunk_dirs.is_empty() {
            continue;
        }
        let lesson_type = LessonType::from_chunk_count(chunk_dirs.len());
        let num_keywords = lesson_type.keyword_count();

        match write_lesson_meta(&chunk_dirs, lesson_type, chunk_dirs.len()) {
            Ok(true) => summary.lesson_meta_written += 1,
            Ok(false) => {}
            Err(e) => warn!(lesson = %lesson_dir.display(), error = %e, "lesson metadata not updated"),
        }

        for chunk_dir in &chunk_dirs {
            let Some(chunk_pdf) = find_chunk_pdf(chunk_dir) else {
                continue;
            };
            summary.total_chunks += 1;

            let kw_path = chunk_pdf.with_extension("keywords.json");
            if !force_reprocess && has_nonempty_keywords(&kw_path) {
                summary.skip += 1;
                continue;
            }

            let prompt = prompt_template.replace("{num_keywords}", &num_keywords.to_string());
            match extract_structure(ring, &chunk_pdf, &prompt, model) {
                Ok(raw) => {
                    let mut keywords = normalize_keywords(&raw);
                    keywords.truncate(num_keywords);
                    let count = keywords.len();
                    write_pretty_json(&kw_path, &json!({ "keywords": keywords }))?;
                    summary.ok += 1;
                    info!(path = %kw_path.display(), count, "keywords written");
                }
                Err(e) => {
                    summary.fail += 1;
                    warn!(chunk = %chunk_pdf.display(), error = %e, "keyword extraction failed");
                    let stub = json!({ "keywords": [], "error": e.to_string() });
                    if let Err(write_err) = write_pretty_json(&kw_path, &stub) {
                        warn!(path = %kw_path.display(), error = %write_err, "stub not written");
                    }
                }
            }
        }
    }
    info!(
        ok = summary.ok,
        skip = summary.skip,
        fail = summary.fail,
        "keyword batch finished"
    );
    Ok(summary)
}

/// Pulls the usable keyword list out of a raw model reply.
///
/// Accepts both `{"keyword": "..."}` objects and bare strings, trims
/// each entry, drops empties, and removes case-insensitive duplicates
/// keeping the first spelling.
#[must_use]
pub fn normalize_keywords(raw: &Value) -> Vec<KeywordEntry> {
    let Some(items) = raw.get("keywords").and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for item in items {
        let text = match item {
            Value::String(s) => s.trim(),
            Value::Object(map) => map.get("keyword").and_then(Value::as_str).unwrap_or("").trim(),
            _ => "",
        };
        if text.is_empty() {
            continue;
        }
        if seen.insert(text.to_lowercase()) {
            out.push(KeywordEntry { keyword: text.to_string() });
        }
    }
    out
}

fn chunk_dirs_of_lesson(lesson_dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(lesson_dir) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.is_dir()
                && p.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.starts_with("chunk_"))
        })
        .collect();
    dirs.sort();
    dirs
}

/// The chunk PDF inside a chunk directory; prefers the canonical
/// `*_chunk_*` name over strays.
fn find_chunk_pdf(chunk_dir: &Path) -> Option<PathBuf> {
    let mut pdfs: Vec<PathBuf> = fs::read_dir(chunk_dir)
        .ok()?
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("pdf")))
        .collect();
    pdfs.sort();
    pdfs.iter()
        .find(|p| p.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.contains("_chunk_")))
        .cloned()
        .or_else(|| pdfs.into_iter().next())
}

fn has_nonempty_keywords(path: &Path) -> bool {
    let Ok(text) = fs::read_to_string(path) else {
        return false;
    };
    let Ok(value) = serde_json::from_str::<Value>(&text) else {
        return false;
    };
    value.get("keywords").and_then(Value::as_array).is_some_and(|kws| !kws.is_empty())
}

/// Records the lesson's type and chunk count in its first chunk's
/// metadata, where downstream consumers pick it up.
fn write_lesson_meta(
    chunk_dirs: &[PathBuf],
    lesson_type: LessonType,
    chunk_count: usize,
) -> Result<bool> {
    let Some(first) = chunk_dirs.first() else {
        return Ok(false);
    };
    let primary = chunk_dirs
        .iter()
        .find(|d| d.file_name().is_some_and(|n| n == "chunk_01"))
        .unwrap_or(first);
    let Some(pdf) = find_chunk_pdf(primary) else {
        return Ok(false);
    };
    let meta_path = pdf.with_extension("json");
    if !meta_path.exists() {
        return Ok(false);
    }

    let mut meta = ChunkMeta::load(&meta_path)?;
    let label = Value::String(lesson_type.label().to_string());
    let count = json!(chunk_count);
    let unchanged = meta.extra.get("lesson_type") == Some(&label)
        && meta.extra.get("chunk_count") == Some(&count);
    if unchanged {
        return Ok(false);
    }
    meta.extra.insert("lesson_type".to_string(), label);
    meta.extra.insert("chunk_count".to_string(), count);
    meta.save(&meta_path)?;
    Ok(true)
}
