use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::audit::write_json_atomic;
use crate::error::{CutlineError, Result};

/// Sidecar metadata for one chunk, stored as JSON next to its PDF.
///
/// Fields this crate does not interpret are carried in `extra` so a
/// rewrite never drops keys written by other tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMeta {
    /// Heading line the chunk was split on, e.g. `"2. KHÁI NIỆM CƠ BẢN"`.
    #[serde(default)]
    pub heading: String,
    /// Title text without the leading numeral.
    #[serde(default)]
    pub title: String,
    /// Whether the heading begins mid-page, with the previous section's
    /// tail above it.
    #[serde(default)]
    pub content_head: bool,
    /// First page of the chunk in the lesson document, 1-based.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<u32>,
    /// Last page of the chunk in the lesson document, 1-based inclusive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<u32>,
    /// Set once a content-head chunk has been cut.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract: Option<bool>,
    /// Set once a forced heading chunk has been cut.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract_heading: Option<bool>,
    /// Keys owned by other tools, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChunkMeta {
    /// Creates metadata for a freshly split chunk.
    #[must_use]
    pub fn new(heading: String, title: String, content_head: bool, start: u32, end: u32) -> Self {
        Self {
            heading,
            title,
            content_head,
            start: Some(start),
            end: Some(end),
            extract: None,
            extract_heading: None,
            extra: Map::new(),
        }
    }

    /// Reads and decodes the metadata file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| CutlineError::Meta {
            path: path.to_path_buf(),
            source: Box::new(e),
        })?;
        serde_json::from_slice(&bytes).map_err(|e| CutlineError::Meta {
            path: path.to_path_buf(),
            source: Box::new(e),
        })
    }

    /// Whether the cut for this chunk's mode has already been recorded.
    #[must_use]
    pub fn is_processed(&self) -> bool {
        if self.content_head {
            self.extract.unwrap_or(false)
        } else {
            self.extract_heading.unwrap_or(false)
        }
    }

    /// Records a completed cut. Content-head chunks get `extract` and
    /// shed any stale `extract_heading`; forced heading chunks get
    /// `extract_heading` and leave `extract` untouched.
    pub fn mark_processed(&mut self) {
        if self.content_head {
            self.extract = Some(true);
            self.extract_heading = None;
        } else {
            self.extract_heading = Some(true);
        }
    }

    /// Writes the metadata back atomically, replacing `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_preserves_foreign_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunk.json");
        fs::write(
            &path,
            r#"{"heading":"2. ABC","title":"ABC","content_head":true,"start":3,"end":5,"note":"keep me"}"#,
        )
        .unwrap();

        let meta = ChunkMeta::load(&path).unwrap();
        assert_eq!(meta.heading, "2. ABC");
        assert_eq!(meta.start, Some(3));
        assert_eq!(meta.extra["note"], "keep me");

        meta.save(&path).unwrap();
        let again = ChunkMeta::load(&path).unwrap();
        assert_eq!(again.extra["note"], "keep me");
        // Unset flags stay absent rather than serializing as null.
        assert!(!fs::read_to_string(&path).unwrap().contains("extract"));
    }

    #[test]
    fn content_head_mark_clears_stale_heading_flag() {
        let mut meta = ChunkMeta::new("1. A".into(), "A".into(), true, 1, 2);
        meta.extract_heading = Some(true);
        assert!(!meta.is_processed());

        meta.mark_processed();
        assert_eq!(meta.extract, Some(true));
        assert_eq!(meta.extract_heading, None);
        assert!(meta.is_processed());
    }

    #[test]
    fn forced_heading_mark_leaves_extract_alone() {
        let mut meta = ChunkMeta::new("1. A".into(), "A".into(), false, 1, 2);
        meta.mark_processed();
        assert_eq!(meta.extract, None);
        assert_eq!(meta.extract_heading, Some(true));
        assert!(meta.is_processed());
    }

    #[test]
    fn load_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, b"not json").unwrap();
        let err = ChunkMeta::load(&path).unwrap_err();
        assert!(matches!(err, CutlineError::Meta { .. }));
    }
}
