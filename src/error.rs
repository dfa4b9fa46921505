use std::path::PathBuf;

use thiserror::Error;

/// Errors emitted by the book-level pipelines.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A structure or keyword request failed after exhausting key rotation.
    #[error(transparent)]
    Gemini(#[from] tomecut_gemini::GeminiError),

    /// Opening, splitting, or rewriting a PDF failed.
    #[error(transparent)]
    Pdf(#[from] tomecut_pdf::PdfError),

    /// The boundary engine hit an environment fault.
    #[error(transparent)]
    Cutline(#[from] tomecut_cutline::CutlineError),

    /// A manifest or summary could not be serialized or decoded.
    #[error("JSON failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem failure.
    #[error("I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A directory the stage needs does not exist.
    #[error("missing directory {0}")]
    MissingDir(PathBuf),

    /// The lesson directory holds no PDF files to work on.
    #[error("no lesson documents in {0}")]
    NoLessons(PathBuf),

    /// The chunk tree holds no metadata files to work on.
    #[error("no chunk metadata under {0}")]
    NoChunks(PathBuf),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, PipelineError>;
