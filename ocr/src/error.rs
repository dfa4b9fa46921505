use thiserror::Error;

/// Errors emitted by OCR engines.
#[derive(Debug, Error)]
pub enum OcrError {
    /// Engine construction failed (missing or unreadable model files).
    #[error("failed to initialize OCR engine: {0}")]
    Init(String),
    /// Inference over a page image failed.
    #[error("OCR inference failed: {0}")]
    Inference(String),
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, OcrError>;
