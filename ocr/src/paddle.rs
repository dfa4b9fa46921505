use image::RgbImage;
use oar_ocr::oarocr::{OAROCR, OAROCRBuilder};

use crate::detection::{BBox, TextDetection};
use crate::engine::OcrEngine;
use crate::error::{OcrError, Result};

/// PaddleOCR ONNX model bundle.
#[derive(Debug, Clone)]
pub struct PaddleModelPaths {
    /// Path to the text detection model (.onnx).
    pub det_model_path: String,
    /// Path to the text recognition model (.onnx).
    pub rec_model_path: String,
    /// Path to the recognition character dictionary.
    pub char_dict_path: String,
    /// Optional path to the text line orientation model (.onnx).
    pub cls_model_path: Option<String>,
}

/// In-process PaddleOCR engine.
///
/// Holds the loaded detection + recognition pipeline for the lifetime of a
/// batch run.
#[derive(Debug)]
pub struct PaddleEngine {
    ocr: OAROCR,
}

impl PaddleEngine {
    /// Load the model bundle and build the pipeline.
    pub fn new(models: &PaddleModelPaths) -> Result<Self> {
        let mut builder = OAROCRBuilder::new(
            &models.det_model_path,
            &models.rec_model_path,
            &models.char_dict_path,
        );
        if let Some(cls) = models.cls_model_path.as_deref() {
            builder = builder.with_text_line_orientation_classification(cls);
        }
        let ocr = builder
            .image_batch_size(1)
            .region_batch_size(16)
            .build()
            .map_err(|e| OcrError::Init(e.to_string()))?;
        Ok(Self { ocr })
    }
}

impl OcrEngine for PaddleEngine {
    fn detect(&self, image: &RgbImage) -> Result<Vec<TextDetection>> {
        let mut results = self
            .ocr
            .predict(vec![image.clone()])
            .map_err(|e| OcrError::Inference(e.to_string()))?;
        let Some(result) = results.pop() else {
            return Ok(Vec::new());
        };

        let mut detections = Vec::with_capacity(result.text_regions.len());
        for region in result.text_regions {
            let Some(text) = region.text else { continue };
            let points = &region.bounding_box.points;
            if points.is_empty() {
                continue;
            }
            let mut bbox = BBox::new(f32::MAX, f32::MAX, f32::MIN, f32::MIN);
            for p in points {
                bbox.x0 = bbox.x0.min(p.x);
                bbox.y0 = bbox.y0.min(p.y);
                bbox.x1 = bbox.x1.max(p.x);
                bbox.y1 = bbox.y1.max(p.y);
            }
            detections.push(TextDetection {
                bbox,
                text: text.to_string(),
                confidence: region.confidence.unwrap_or(0.0),
            });
        }
        Ok(detections)
    }
}
