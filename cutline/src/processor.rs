//! Per-chunk orchestration: metadata gates, render, detect, match, cut,
//! write back.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::{debug, info, warn};

use tomecut_ocr::{OcrEngine, TextDetection};
use tomecut_pdf::PageRenderer;

use crate::audit::{CutAudit, CutMode, ImageSize, annotate};
use crate::config::CutlineConfig;
use crate::cut::{SplitImages, resolve_cut_y, split_bottom_only, split_full};
use crate::error::{CutlineError, Result};
use crate::lines::{Line, group_into_lines, median_height, y_tolerance};
use crate::matching::{MatchCandidate, MatchFlags, find_best_candidate, prefix_match_count};
use crate::meta::ChunkMeta;
use crate::text::{build_expected_letters, extract_heading_num};
use crate::update::{
    PdfUpdate, apply_bottom_only_update, apply_content_head_updates, plan_content_head_updates,
};

/// Why a chunk was left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The heading carries no parseable numeral.
    NoHeadingNumber,
    /// Neither a content head nor a forced heading numeral.
    NotApplicable,
    /// The cut is already recorded and reprocessing is off.
    AlreadyProcessed,
    /// The title yields no matchable initials.
    NoExpectedLetters,
}

/// Result of driving one chunk through the pipeline.
#[derive(Debug)]
pub enum ChunkOutcome {
    /// The cut was applied and recorded.
    Applied(Box<CutAudit>),
    /// The chunk was not applicable; nothing was written.
    Skipped(SkipReason),
    /// The heading could not be resolved; debug artifacts were written.
    Failed(Box<CutAudit>),
}

/// Where one chunk's artifacts go, all under a `DebugCutlines` directory
/// next to the metadata file.
#[derive(Debug)]
struct ArtifactPaths {
    dir: PathBuf,
    debug_png: PathBuf,
    audit_json: PathBuf,
    top_png: PathBuf,
    bottom_png: PathBuf,
}

impl ArtifactPaths {
    fn for_chunk(chunk_json: &Path) -> Self {
        let dir = chunk_json
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("DebugCutlines");
        let stem = chunk_json
            .file_stem()
            .map_or_else(String::new, |s| s.to_string_lossy().into_owned());
        Self {
            debug_png: dir.join(format!("{stem}_cutline.png")),
            audit_json: dir.join(format!("{stem}_cutline.json")),
            top_png: dir.join(format!("{stem}_cutline_top.png")),
            bottom_png: dir.join(format!("{stem}_cutline_bot.png")),
            dir,
        }
    }
}

/// Audit fields that are fixed once the chunk's gates have passed;
/// success and failure records are both stamped from this.
struct AuditDraft<'c> {
    chunk_json: &'c Path,
    chunk_pdf: &'c Path,
    heading: &'c str,
    heading_num: u32,
    title: &'c str,
    expected: &'c [char],
    mode: CutMode,
    image_size: ImageSize,
    paths: &'c ArtifactPaths,
    config: &'c CutlineConfig,
}

impl AuditDraft<'_> {
    fn base(&self) -> CutAudit {
        CutAudit {
            failed: false,
            fail_reason: None,
            chunk_json: self.chunk_json.to_path_buf(),
            chunk_pdf: self.chunk_pdf.to_path_buf(),
            heading: self.heading.to_string(),
            heading_num: self.heading_num,
            title: self.title.to_string(),
            expected_letters: self.expected.to_vec(),
            matched: 0,
            prefix_hits: 0,
            observed_initials: Vec::new(),
            strategy: None,
            line_bbox: None,
            y_cut: None,
            mode: self.mode,
            dpi: self.config.dpi,
            offset_px: self.config.offset_px,
            image_size: self.image_size,
            debug_png: self.paths.debug_png.clone(),
            split: None,
            pdf_update: None,
        }
    }
}

/// Drives single chunks through render, detection, matching, and the cut.
pub struct ChunkProcessor<'a> {
    config: &'a CutlineConfig,
    renderer: &'a PageRenderer,
    engine: &'a dyn OcrEngine,
}

impl fmt::Debug for ChunkProcessor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkProcessor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<'a> ChunkProcessor<'a> {
    /// Builds a processor borrowing its collaborators; the engine and
    /// renderer are expensive to construct and shared across chunks.
    #[must_use]
    pub fn new(
        config: &'a CutlineConfig,
        renderer: &'a PageRenderer,
        engine: &'a dyn OcrEngine,
    ) -> Self {
        Self { config, renderer, engine }
    }

    /// Drives one chunk end to end.
    ///
    /// Errors are reserved for environment faults (unreadable metadata,
    /// missing or unrenderable documents, engine failures); everything
    /// the pipeline can reason about comes back as a [`ChunkOutcome`].
    pub fn process(&self, chunk_json: &Path) -> Result<ChunkOutcome> {
        let mut meta = ChunkMeta::load(chunk_json)?;
        let chunk_pdf = chunk_json.with_extension("pdf");
        if !chunk_pdf.exists() {
            return Err(CutlineError::MissingPdf(chunk_pdf));
        }

        let heading = meta.heading.trim().to_string();
        let Some(heading_num) = extract_heading_num(&heading) else {
            debug!(chunk = %chunk_json.display(), "no heading numeral, skipping");
            return Ok(ChunkOutcome::Skipped(SkipReason::NoHeadingNumber));
        };
        let flags = MatchFlags {
            content_head: meta.content_head,
            forced_heading: self.config.force_heading_nums.contains(&heading_num),
        };
        if !flags.content_head && !flags.forced_heading {
            return Ok(ChunkOutcome::Skipped(SkipReason::NotApplicable));
        }
        if !self.config.force_reprocess && meta.is_processed() {
            debug!(chunk = %chunk_json.display(), "cut already recorded, skipping");
            return Ok(ChunkOutcome::Skipped(SkipReason::AlreadyProcessed));
        }

        let title = meta.title.trim().to_string();
        let expected = build_expected_letters(&title);
        if expected.is_empty() {
            warn!(chunk = %chunk_json.display(), "title has no usable initials, skipping");
            return Ok(ChunkOutcome::Skipped(SkipReason::NoExpectedLetters));
        }

        // Clear leftovers from earlier runs of this chunk.
        let paths = ArtifactPaths::for_chunk(chunk_json);
        let _ = fs::remove_dir_all(&paths.dir);
        fs::create_dir_all(&paths.dir)?;

        let image = self.renderer.render_page(&chunk_pdf, 0, self.config.dpi)?;
        let detections: Vec<TextDetection> = self
            .engine
            .detect(&image)?
            .into_iter()
            .filter(|d| d.confidence >= self.config.min_score)
            .collect();

        let mode = if flags.content_head {
            CutMode::ContentHead
        } else {
            CutMode::HeadingBottomOnly
        };
        let draft = AuditDraft {
            chunk_json,
            chunk_pdf: &chunk_pdf,
            heading: &heading,
            heading_num,
            title: &title,
            expected: &expected,
            mode,
            image_size: ImageSize { w: image.width(), h: image.height() },
            paths: &paths,
            config: self.config,
        };

        if detections.is_empty() {
            return fail(&draft, &image, "no_detections", None, None, None);
        }

        let y_tol = y_tolerance(median_height(&detections));
        let lines = group_into_lines(&detections, y_tol);

        let Some(best) =
            find_best_candidate(&detections, &lines, &expected, heading_num, flags, self.config)
        else {
            return fail(&draft, &image, "no_candidate", None, None, None);
        };

        let line = &lines[best.line_index];
        let y_cut = resolve_cut_y(line.bbox.y0, self.config.offset_px, image.height());

        if flags.content_head && !best.strategy.has_heading_evidence() {
            return fail(
                &draft,
                &image,
                "no_heading_evidence",
                Some(&best),
                Some(line),
                Some(y_cut),
            );
        }
        let needed = self.config.min_match_required.min(expected.len());
        if best.matched < needed {
            let reason = format!("low_match_{}_{}", best.matched, expected.len());
            return fail(&draft, &image, &reason, Some(&best), Some(line), Some(y_cut));
        }

        info!(
            chunk = %chunk_json.display(),
            strategy = ?best.strategy,
            matched = best.matched,
            total = expected.len(),
            y_cut,
            "cut line resolved"
        );

        annotate(&image, Some(&line.bbox), Some(y_cut))
            .save(&paths.debug_png)
            .map_err(|e| CutlineError::Image(e.to_string()))?;

        let split = if flags.content_head {
            split_full(&image, y_cut)
        } else {
            split_bottom_only(&image, y_cut)
        };
        split.save(&paths.top_png, &paths.bottom_png)?;

        let pdf_update = self.update_documents(&chunk_pdf, flags.content_head, &split)?;

        let mut audit = draft.base();
        audit.matched = best.matched;
        audit.prefix_hits = prefix_match_count(&best.observed, &expected);
        audit.observed_initials = best.observed.clone();
        audit.strategy = Some(best.strategy);
        audit.line_bbox = Some(line.bbox);
        audit.y_cut = Some(y_cut);
        audit.split = Some(split.outcome);
        audit.pdf_update = Some(pdf_update);
        audit.write(&paths.audit_json)?;

        meta.mark_processed();
        meta.save(chunk_json)?;

        Ok(ChunkOutcome::Applied(Box::new(audit)))
    }

    fn update_documents(
        &self,
        chunk_pdf: &Path,
        content_head: bool,
        split: &SplitImages,
    ) -> Result<PdfUpdate> {
        if self.config.disable_pdf_update {
            return Ok(PdfUpdate::Skipped { reason: "updates disabled".into() });
        }
        if content_head {
            if let (Some(top), Some(bottom)) = (&split.top, &split.bottom) {
                let plan = plan_content_head_updates(chunk_pdf);
                let report =
                    apply_content_head_updates(&plan, top, bottom, self.config.make_pdf_backup)?;
                return Ok(PdfUpdate::Applied(report));
            }
        } else if let Some(bottom) = &split.bottom {
            let report = apply_bottom_only_update(chunk_pdf, bottom, self.config.make_pdf_backup)?;
            return Ok(PdfUpdate::Applied(report));
        }
        Ok(PdfUpdate::Skipped { reason: "split produced no usable pieces".into() })
    }
}

/// Writes failure artifacts (annotated page plus audit record) and wraps
/// them in [`ChunkOutcome::Failed`].
fn fail(
    draft: &AuditDraft<'_>,
    image: &RgbImage,
    reason: &str,
    candidate: Option<&MatchCandidate>,
    line: Option<&Line>,
    y_cut: Option<u32>,
) -> Result<ChunkOutcome> {
    warn!(chunk = %draft.chunk_json.display(), reason, "cut line not resolved");
    annotate(image, line.map(|l| &l.bbox), y_cut)
        .save(&draft.paths.debug_png)
        .map_err(|e| CutlineError::Image(e.to_string()))?;

    let mut audit = draft.base();
    audit.failed = true;
    audit.fail_reason = Some(reason.to_string());
    if let Some(c) = candidate {
        audit.matched = c.matched;
        audit.prefix_hits = prefix_match_count(&c.observed, draft.expected);
        audit.observed_initials = c.observed.clone();
        audit.strategy = Some(c.strategy);
    }
    audit.line_bbox = line.map(|l| l.bbox);
    audit.y_cut = y_cut;
    audit.write(&draft.paths.audit_json)?;
    Ok(ChunkOutcome::Failed(Box::new(audit)))
}
