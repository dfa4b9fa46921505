//! On-disk layout of a book workspace.
//!
//! Everything a book produces lives under `<output_root>/<book_stem>/`:
//! the structure manifest, split topic and lesson PDFs, and the chunk
//! tree the later stages refine in place.
//!
//! ```text
//! Output/<book_stem>/
//!   <book_stem>.json            structure manifest
//!   Topic/<book_stem>_topic_01.pdf
//!   Lesson/<book_stem>_lesson_01.pdf
//!   Chunk/<lesson_stem>/chunk_01/<lesson_stem>_chunk_01.pdf (+ .json)
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{PipelineError, Result};

/// Directory handle for one book's pipeline outputs.
#[derive(Debug, Clone)]
pub struct BookWorkspace {
    base_dir: PathBuf,
    stem: String,
}

impl BookWorkspace {
    /// Creates `<output_root>/<book_stem>/` with its `Topic` and `Lesson`
    /// subdirectories, ready for the structure stage.
    pub fn prepare(output_root: &Path, book_pdf: &Path) -> Result<Self> {
        let stem = file_stem(book_pdf);
        let base_dir = output_root.join(&stem);
        fs::create_dir_all(base_dir.join("Topic"))?;
        fs::create_dir_all(base_dir.join("Lesson"))?;
        debug!(base = %base_dir.display(), "workspace prepared");
        Ok(Self { base_dir, stem })
    }

    /// Opens an existing workspace for the later stages.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MissingDir`] when `book_dir` does not
    /// exist.
    pub fn open(book_dir: &Path) -> Result<Self> {
        if !book_dir.is_dir() {
            return Err(PipelineError::MissingDir(book_dir.to_path_buf()));
        }
        let stem = book_dir
            .file_name()
            .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
        Ok(Self { base_dir: book_dir.to_path_buf(), stem })
    }

    /// Book file stem; names every derived file.
    #[must_use]
    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// The `<output_root>/<book_stem>/` directory.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Where the structure manifest is saved.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.base_dir.join(format!("{}.json", self.stem))
    }

    /// Topic PDFs directory.
    #[must_use]
    pub fn topic_dir(&self) -> PathBuf {
        self.base_dir.join("Topic")
    }

    /// Lesson PDFs directory.
    #[must_use]
    pub fn lesson_dir(&self) -> PathBuf {
        self.base_dir.join("Lesson")
    }

    /// Root of the chunk tree.
    #[must_use]
    pub fn chunk_dir(&self) -> PathBuf {
        self.base_dir.join("Chunk")
    }
}

/// File stem of `path`, lossily decoded.
#[must_use]
pub fn file_stem(path: &Path) -> String {
    path.file_stem().map_or_else(String::new, |s| s.to_string_lossy().into_owned())
}

/// Makes a manifest-supplied name usable as a file-name component.
#[must_use]
pub fn safe_name(name: &str) -> String {
    name.replace(['/', '\\'], "_").trim().to_string()
}

/// File name for a split piece: `{stem}_{safe_name}.pdf`.
#[must_use]
pub fn split_pdf_name(stem: &str, name: &str) -> String {
    format!("{stem}_{}.pdf", safe_name(name))
}

/// Canonical chunk directory name, zero-padded to two digits.
#[must_use]
pub fn chunk_dir_name(index: usize) -> String {
    format!("chunk_{index:02}")
}

/// Canonical chunk file stem: `{lesson_stem}_chunk_{NN}`.
#[must_use]
pub fn chunk_stem(lesson_stem: &str, index: usize) -> String {
    format!("{lesson_stem}_chunk_{index:02}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn preparing_creates_the_stage_directories() {
        let dir = tempdir().unwrap();
        let ws = BookWorkspace::prepare(dir.path(), Path::new("Input/Tin-hoc-10.pdf")).unwrap();

        assert_eq!(ws.stem(), "Tin-hoc-10");
        assert!(ws.topic_dir().is_dir());
        assert!(ws.lesson_dir().is_dir());
        assert!(!ws.chunk_dir().exists());
        assert_eq!(ws.manifest_path(), dir.path().join("Tin-hoc-10").join("Tin-hoc-10.json"));
    }

    #[test]
    fn opening_requires_the_directory() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("no-such-book");
        let err = BookWorkspace::open(&missing).unwrap_err();
        assert!(matches!(err, PipelineError::MissingDir(_)));

        fs::create_dir(&missing).unwrap();
        let ws = BookWorkspace::open(&missing).unwrap();
        assert_eq!(ws.stem(), "no-such-book");
    }

    #[test]
    fn unsafe_names_are_flattened() {
        assert_eq!(safe_name("topic/01"), "topic_01");
        assert_eq!(safe_name(" lesson\\02 "), "lesson_02");
        assert_eq!(split_pdf_name("book", "topic_01"), "book_topic_01.pdf");
    }

    #[test]
    fn chunk_names_keep_two_digit_padding() {
        assert_eq!(chunk_dir_name(7), "chunk_07");
        assert_eq!(chunk_dir_name(12), "chunk_12");
        assert_eq!(chunk_dir_name(100), "chunk_100");
        assert_eq!(chunk_stem("book_lesson_01", 2), "book_lesson_01_chunk_02");
    }
}
