use std::path::Path;

use lopdf::Document;
use tracing::debug;

use crate::error::{PdfError, Result};

/// Extracts contiguous page ranges from one source document.
///
/// The source is parsed once at construction. Every extracted range clones
/// the object graph, deletes the pages outside the range, prunes objects
/// that became unreachable, and writes the result as a standalone PDF, so
/// the source file is never modified.
#[derive(Debug)]
pub struct RangeSplitter {
    doc: Document,
    page_count: u32,
}

impl RangeSplitter {
    /// Loads and indexes the document at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let doc = Document::load(path).map_err(|e| PdfError::Parse(e.to_string()))?;
        let page_count = u32::try_from(doc.get_pages().len())
            .map_err(|_| PdfError::Parse("page count exceeds u32".to_string()))?;
        debug!(path = %path.display(), pages = page_count, "opened source document");
        Ok(Self { doc, page_count })
    }

    /// Number of pages in the source document.
    #[must_use]
    pub const fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Writes pages `start..=end` (one-based, inclusive) to `dest`.
    pub fn write_range(&self, start: u32, end: u32, dest: &Path) -> Result<()> {
        if start < 1 || start > end || end > self.page_count {
            return Err(PdfError::InvalidRange {
                start,
                end,
                count: self.page_count,
            });
        }
        let mut doc = self.doc.clone();
        let dropped: Vec<u32> = (1..=self.page_count)
            .filter(|page| *page < start || *page > end)
            .collect();
        if !dropped.is_empty() {
            doc.delete_pages(&dropped);
        }
        doc.prune_objects();
        doc.renumber_objects();
        doc.save(dest).map_err(|e| PdfError::Write(e.to_string()))?;
        debug!(start, end, dest = %dest.display(), "wrote page range");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surgeon::tests::build_doc;

    #[test]
    fn extracts_inner_range() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("book.pdf");
        build_doc(4).save(&src).unwrap();

        let splitter = RangeSplitter::open(&src).unwrap();
        assert_eq!(splitter.page_count(), 4);

        let dest = dir.path().join("part.pdf");
        splitter.write_range(2, 3, &dest).unwrap();

        let out = Document::load(&dest).unwrap();
        assert_eq!(out.get_pages().len(), 2);
    }

    #[test]
    fn full_range_keeps_every_page() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("book.pdf");
        build_doc(3).save(&src).unwrap();

        let splitter = RangeSplitter::open(&src).unwrap();
        let dest = dir.path().join("all.pdf");
        splitter.write_range(1, 3, &dest).unwrap();

        assert_eq!(Document::load(&dest).unwrap().get_pages().len(), 3);
    }

    #[test]
    fn rejects_out_of_bounds_range() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("book.pdf");
        build_doc(2).save(&src).unwrap();

        let splitter = RangeSplitter::open(&src).unwrap();
        let dest = dir.path().join("bad.pdf");
        let err = splitter.write_range(1, 5, &dest).unwrap_err();
        assert!(matches!(err, PdfError::InvalidRange { end: 5, .. }));
        let err = splitter.write_range(0, 1, &dest).unwrap_err();
        assert!(matches!(err, PdfError::InvalidRange { start: 0, .. }));
        let err = splitter.write_range(2, 1, &dest).unwrap_err();
        assert!(matches!(err, PdfError::InvalidRange { .. }));
    }

    #[test]
    fn source_is_untouched_after_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("book.pdf");
        build_doc(5).save(&src).unwrap();
        let before = std::fs::read(&src).unwrap();

        let splitter = RangeSplitter::open(&src).unwrap();
        splitter.write_range(1, 2, &dir.path().join("a.pdf")).unwrap();
        splitter.write_range(3, 5, &dir.path().join("b.pdf")).unwrap();

        assert_eq!(std::fs::read(&src).unwrap(), before);
    }
}
