use thiserror::Error;

/// Errors emitted while splitting, rendering, or rewriting PDF documents.
#[derive(Debug, Error)]
pub enum PdfError {
    /// The input does not decode as a well-formed PDF.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// A rewritten document could not be serialized.
    #[error("failed to write PDF: {0}")]
    Write(String),

    /// Filesystem failure while reading or replacing a document.
    #[error("PDF I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A page index outside the document was requested.
    #[error("page index {index} out of range for a {count}-page document")]
    PageOutOfRange {
        /// Zero-based page index as requested.
        index: usize,
        /// Number of pages actually present.
        count: usize,
    },

    /// An extraction range is empty or extends past the last page.
    #[error("invalid page range {start}..={end} for a {count}-page document")]
    InvalidRange {
        /// First page of the range, one-based.
        start: u32,
        /// Last page of the range, one-based.
        end: u32,
        /// Number of pages actually present.
        count: u32,
    },

    /// No rasterization backend produced an image.
    #[error("page rendering failed: {0}")]
    Render(String),

    /// The replacement image could not be encoded for embedding.
    #[error("failed to encode replacement image: {0}")]
    ImageEncode(String),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, PdfError>;
