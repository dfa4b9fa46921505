//! OCR engine abstraction for the tomecut pipeline.
//!
//! The pipeline only needs one capability from an OCR engine: given a page
//! image, produce a flat list of text detections (box + text + confidence).
//! [`OcrEngine`] is that seam. The PaddleOCR family exposes two incompatible
//! result schemas across its API generations; [`RawOcrResult`] captures both
//! as a closed set of variants and normalizes them in one place.

mod detection;
mod engine;
mod error;
#[cfg(feature = "paddle")]
mod paddle;
mod raw;

pub use detection::{BBox, TextDetection};
pub use engine::OcrEngine;
pub use error::{OcrError, Result};
#[cfg(feature = "paddle")]
pub use paddle::{PaddleEngine, PaddleModelPaths};
pub use raw::RawOcrResult;
