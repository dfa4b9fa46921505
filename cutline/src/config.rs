use std::collections::BTreeSet;

/// Tuning knobs for boundary refinement.
///
/// Built once per batch run and shared immutably by every component; no
/// field changes while a run is in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct CutlineConfig {
    /// Rasterization density for the first page of each chunk.
    pub dpi: u16,
    /// Pixels to nudge the cut above the heading's top edge, clearing
    /// ascenders and stacked diacritics.
    pub offset_px: i32,
    /// Detections below this confidence are dropped before grouping.
    pub min_score: f32,
    /// Minimum matched initials for a cut (capped at the title length).
    pub min_match_required: usize,
    /// Heading numbers processed even when the chunk is not a content
    /// head; these get a bottom-only split.
    pub force_heading_nums: BTreeSet<u32>,
    /// Maximum horizontal gap between an isolated heading numeral and the
    /// title line it introduces.
    pub heading_gap_max: f32,
    /// Minimum vertical overlap fraction for the isolated-numeral pairing.
    pub heading_min_overlap: f32,
    /// How many following lines the merge strategy may look ahead.
    pub look_ahead: usize,
    /// Compute cuts and write debug artifacts but leave every PDF alone.
    pub disable_pdf_update: bool,
    /// Process chunks even when their processed-flags are already set.
    pub force_reprocess: bool,
    /// Copy each PDF to `<name>.pdf.bak` before its first rewrite.
    pub make_pdf_backup: bool,
}

impl Default for CutlineConfig {
    fn default() -> Self {
        Self {
            dpi: 260,
            offset_px: 10,
            min_score: 0.0,
            min_match_required: 3,
            force_heading_nums: BTreeSet::from([1]),
            heading_gap_max: 220.0,
            heading_min_overlap: 0.25,
            look_ahead: 3,
            disable_pdf_update: false,
            force_reprocess: false,
            make_pdf_backup: false,
        }
    }
}
