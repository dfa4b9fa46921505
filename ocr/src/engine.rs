use image::RgbImage;

use crate::detection::TextDetection;
use crate::error::Result;

/// A text detection + recognition engine.
///
/// Engines are constructed once per batch run and reused across pages; model
/// load dominates their cost, inference is stateless. `detect` takes `&self`
/// so an engine can sit behind a shared reference.
pub trait OcrEngine {
    /// Run OCR over `image`, returning every recognized region.
    ///
    /// An empty vector is a valid result (a blank page is not an error);
    /// engine-level failures surface as [`crate::OcrError`].
    fn detect(&self, image: &RgbImage) -> Result<Vec<TextDetection>>;
}
