//! Boundary refinement across a whole book.
//!
//! Walks the chunk tree for metadata files, drives each chunk through
//! the boundary engine, and tallies the outcomes. Per-chunk faults are
//! counted and logged; only failing to enumerate the tree at all stops
//! a run.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tomecut_cutline::{ChunkOutcome, ChunkProcessor, CutlineConfig};
use tomecut_ocr::OcrEngine;
use tomecut_pdf::PageRenderer;
use tracing::{info, warn};

use crate::error::{PipelineError, Result};
use crate::layout::BookWorkspace;

/// Counters for one refinement run.
#[derive(Debug, Default, Serialize)]
pub struct BatchSummary {
    /// Chunks whose boundary was applied.
    pub ok: usize,
    /// Chunks that were not applicable or already done.
    pub skip: usize,
    /// Chunks that failed, including per-chunk faults.
    pub fail: usize,
    /// One `DebugCutlines` directory touched by this run, as a starting
    /// point for inspection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_example: Option<PathBuf>,
}

/// Refines every chunk boundary under the book's chunk tree.
///
/// The engine and renderer are built once by the caller and reused for
/// every chunk; chunks are visited in path order.
pub fn refine_book_cutlines(
    ws: &BookWorkspace,
    config: &CutlineConfig,
    renderer: &PageRenderer,
    engine: &dyn OcrEngine,
) -> Result<BatchSummary> {
    let chunk_root = ws.chunk_dir();
    if !chunk_root.is_dir() {
        return Err(PipelineError::MissingDir(chunk_root));
    }
    let metas = collect_chunk_metas(&chunk_root)?;
    if metas.is_empty() {
        return Err(PipelineError::NoChunks(chunk_root));
    }
    info!(count = metas.len(), root = %chunk_root.display(), "chunk metadata collected");

    let processor = ChunkProcessor::new(config, renderer, engine);
    let mut summary = BatchSummary::default();
    for meta_path in &metas {
        match processor.process(meta_path) {
            Ok(ChunkOutcome::Applied(audit)) => {
                summary.ok += 1;
                summary.debug_example = audit.debug_png.parent().map(Path::to_path_buf);
            }
            Ok(ChunkOutcome::Skipped(_)) => summary.skip += 1,
            Ok(ChunkOutcome::Failed(audit)) => {
                summary.fail += 1;
                summary.debug_example = audit.debug_png.parent().map(Path::to_path_buf);
            }
            Err(e) => {
                warn!(chunk = %meta_path.display(), error = %e, "chunk errored, continuing");
                summary.fail += 1;
            }
        }
    }
    info!(ok = summary.ok, skip = summary.skip, fail = summary.fail, "refinement finished");
    Ok(summary)
}

/// Finds chunk metadata files under `root`, sorted by path.
///
/// Debug directories are not descended into; keyword files and cut
/// audits are not metadata.
fn collect_chunk_metas(root: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    walk_metas(root, &mut found)?;
    found.sort();
    Ok(found)
}

fn walk_metas(dir: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            if path.file_name().is_some_and(|n| n == "DebugCutlines") {
                continue;
            }
            walk_metas(&path, found)?;
        } else if is_chunk_meta(&path) {
            found.push(path);
        }
    }
    Ok(())
}

fn is_chunk_meta(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.ends_with(".json")
        && !name.ends_with(".keywords.json")
        && !name.trim_end_matches(".json").ends_with("_cutline")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn walk_finds_only_chunk_metadata() {
        let dir = tempdir().unwrap();
        let chunk = dir.path().join("lesson_01").join("chunk_02");
        fs::create_dir_all(&chunk).unwrap();
        fs::write(chunk.join("lesson_01_chunk_02.json"), b"{}").unwrap();
        fs::write(chunk.join("lesson_01_chunk_02.keywords.json"), b"{}").unwrap();
        fs::write(chunk.join("lesson_01_chunk_02.pdf"), b"%PDF").unwrap();

        let debug = chunk.join("DebugCutlines");
        fs::create_dir_all(&debug).unwrap();
        fs::write(debug.join("lesson_01_chunk_02_cutline.json"), b"{}").unwrap();

        // A stray audit outside the debug dir is still not metadata.
        fs::write(chunk.join("old_cutline.json"), b"{}").unwrap();

        let metas = collect_chunk_metas(dir.path()).unwrap();
        assert_eq!(metas, vec![chunk.join("lesson_01_chunk_02.json")]);
    }

    #[test]
    fn walk_order_is_stable() {
        let dir = tempdir().unwrap();
        for lesson in ["lesson_02", "lesson_01"] {
            for chunk in ["chunk_02", "chunk_01"] {
                let d = dir.path().join(lesson).join(chunk);
                fs::create_dir_all(&d).unwrap();
                fs::write(d.join(format!("{lesson}_{chunk}.json")), b"{}").unwrap();
            }
        }
        let metas = collect_chunk_metas(dir.path()).unwrap();
        let names: Vec<_> = metas
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "lesson_01_chunk_01.json",
                "lesson_01_chunk_02.json",
                "lesson_02_chunk_01.json",
                "lesson_02_chunk_02.json",
            ]
        );
    }

    #[test]
    fn missing_tree_is_fatal() {
        let dir = tempdir().unwrap();
        let ws = BookWorkspace::open(dir.path()).unwrap();
        let config = CutlineConfig::default();
        let renderer = PageRenderer::new(&tomecut_pdf::RendererOptions::default());

        struct NoOcr;
        impl OcrEngine for NoOcr {
            fn detect(
                &self,
                _image: &image::RgbImage,
            ) -> tomecut_ocr::Result<Vec<tomecut_ocr::TextDetection>> {
                Ok(Vec::new())
            }
        }

        let err = refine_book_cutlines(&ws, &config, &renderer, &NoOcr).unwrap_err();
        assert!(matches!(err, PipelineError::MissingDir(_)));

        fs::create_dir(ws.chunk_dir()).unwrap();
        let err = refine_book_cutlines(&ws, &config, &renderer, &NoOcr).unwrap_err();
        assert!(matches!(err, PipelineError::NoChunks(_)));
    }
}
