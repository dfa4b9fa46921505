use std::path::PathBuf;

use thiserror::Error;

/// Errors emitted while refining chunk boundaries.
#[derive(Debug, Error)]
pub enum CutlineError {
    /// Chunk metadata could not be read or decoded.
    #[error("failed to read chunk metadata {path}: {source}")]
    Meta {
        /// Metadata file that failed.
        path: PathBuf,
        /// Underlying decode or read failure.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The chunk PDF expected next to the metadata file is absent.
    #[error("missing chunk PDF {0}")]
    MissingPdf(PathBuf),

    /// Rendering or rewriting a PDF failed.
    #[error(transparent)]
    Pdf(#[from] tomecut_pdf::PdfError),

    /// The OCR engine failed outright (distinct from returning no text).
    #[error(transparent)]
    Ocr(#[from] tomecut_ocr::OcrError),

    /// An image could not be encoded or written.
    #[error("image write failed: {0}")]
    Image(String),

    /// A JSON payload could not be serialized.
    #[error("JSON encode failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem failure outside the PDF layer.
    #[error("I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, CutlineError>;
