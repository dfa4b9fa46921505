//! PDF handling for the tomecut pipeline.
//!
//! Three concerns live here: extracting contiguous page ranges from a
//! source book ([`RangeSplitter`]), rasterizing single pages for OCR
//! ([`PageRenderer`]), and swapping one page's content for a corrected
//! raster while leaving the rest of the file untouched
//! ([`replace_page_with_image`]).

mod error;
mod render;
mod split;
mod surgeon;

pub use error::{PdfError, Result};
pub use render::{PageRenderer, RendererOptions};
pub use split::RangeSplitter;
pub use surgeon::{VAlign, page_count, replace_page_with_image};
