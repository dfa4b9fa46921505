//! Heading detection and chunk-boundary refinement.
//!
//! A chunk is a page range cut out of a lesson document around one
//! numbered heading. Page boundaries rarely line up with heading
//! boundaries: the first page of a chunk usually opens with the tail of
//! the previous section. This crate renders that first page, locates the
//! heading line via OCR initials matching, slices the page image just
//! above it, and writes the pieces back into the chunk documents. Every
//! decision, including every failure, leaves an annotated image and a
//! JSON audit record behind.

mod audit;
mod config;
mod cut;
mod error;
mod lines;
mod matching;
mod meta;
mod processor;
mod text;
mod update;

pub use audit::{CutAudit, CutMode, ImageSize, annotate};
pub use config::CutlineConfig;
pub use cut::{SplitOutcome, resolve_cut_y};
pub use error::{CutlineError, Result};
pub use lines::{Line, group_into_lines, median_height, y_tolerance};
pub use matching::{
    MatchCandidate, MatchFlags, Strategy, find_best_candidate, prefix_match_count,
    robust_match_count,
};
pub use meta::ChunkMeta;
pub use processor::{ChunkOutcome, ChunkProcessor, SkipReason};
pub use update::{PageUpdate, PdfUpdate, UpdateReport};
