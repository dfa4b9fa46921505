//! Textbook PDF structuring and chunk-boundary refinement.
//!
//! A scanned textbook runs through four stages, each resumable on its
//! own:
//!
//! 1. **Structure** — ask a generative model for topic and lesson page
//!    ranges and split the book accordingly
//!    ([`extract_book_structure`]).
//! 2. **Chunks** — per lesson, ask for the numbered content sections
//!    and split again, producing one directory per chunk holding its
//!    PDF and metadata ([`split_book_chunks`]).
//! 3. **Cutlines** — render each chunk's first page, locate the heading
//!    with OCR, and move the pixel rows above it back into the previous
//!    chunk ([`refine_book_cutlines`]).
//! 4. **Keywords** — pull per-chunk keyword lists
//!    ([`extract_book_keywords`]).
//!
//! The member crates carry the machinery and are re-exported here:
//! [`cutline`] (the boundary engine), [`ocr`], [`pdf`], and [`gemini`].
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use tomecut::gemini::KeyRing;
//!
//! # fn run() -> tomecut::Result<()> {
//! let ring = KeyRing::from_env("Output/.gemini_key_index")?;
//! let book = Path::new("Input/Tin-hoc-10-ket-noi-tri-thuc.pdf");
//!
//! let stage = tomecut::extract_book_structure(
//!     &ring,
//!     book,
//!     Path::new("Output"),
//!     &std::fs::read_to_string("prompts/structure.txt")?,
//!     "gemini-2.5-flash",
//! )?;
//! println!("{} lessons split", stage.lessons.len());
//!
//! let ws = tomecut::BookWorkspace::open(Path::new("Output/Tin-hoc-10-ket-noi-tri-thuc"))?;
//! let chunks = tomecut::split_book_chunks(
//!     &ring,
//!     &ws,
//!     &std::fs::read_to_string("prompts/chunks.txt")?,
//!     "gemini-2.5-flash",
//!     true,
//! )?;
//! println!("{} chunk PDFs written", chunks.chunk_pdfs.len());
//! # Ok(()) }
//! ```

mod error;
mod extract;
mod keywords;
mod layout;
mod model;
mod postprocess;
mod split;

pub use error::{PipelineError, Result};
pub use extract::{BookExtraction, extract_book_structure, extract_structure};
pub use keywords::{
    KeywordBatchSummary, KeywordEntry, LessonType, extract_book_keywords, normalize_keywords,
};
pub use layout::{BookWorkspace, chunk_dir_name, chunk_stem, file_stem, safe_name, split_pdf_name};
pub use model::{ChunkRange, ChunkSpec, NamedRange, chunk_page_ranges, chunk_specs, named_ranges};
pub use postprocess::{BatchSummary, refine_book_cutlines};
pub use split::{ChunkSplitSummary, SkippedLesson, split_book_chunks, split_named_ranges};

pub use tomecut_cutline as cutline;
pub use tomecut_gemini as gemini;
pub use tomecut_ocr as ocr;
pub use tomecut_pdf as pdf;
