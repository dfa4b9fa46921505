use serde::Deserialize;

use crate::detection::{BBox, TextDetection};

/// Raw per-image result payload from a PaddleOCR-style engine.
///
/// The engine family changed its output schema between API generations:
/// the classic API emits a nested list of `[quad, [text, score]]` entries,
/// the pipeline API emits an object with parallel `rec_*` arrays. Both are
/// accepted here and normalized through [`RawOcrResult::into_detections`],
/// the single dispatch point.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawOcrResult {
    /// Parallel-array shape from the pipeline-style predict API.
    Rich(RichResult),
    /// Nested-list shape from the classic API.
    Simple(Vec<SimpleItem>),
}

/// Pipeline-API result object with parallel recognition arrays.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RichResult {
    /// Recognized text per region.
    #[serde(default)]
    pub rec_texts: Vec<String>,
    /// Recognition confidence per region.
    #[serde(default)]
    pub rec_scores: Vec<f32>,
    /// Recognition polygons (quads), when the engine emits polygons.
    #[serde(default)]
    pub rec_polys: Option<Vec<Vec<[f32; 2]>>>,
    /// Recognition boxes as `[x0, y0, x1, y1]`, when the engine emits boxes.
    #[serde(default)]
    pub rec_boxes: Option<Vec<[f32; 4]>>,
}

/// Classic-API entry: detection quad plus `(text, score)`.
#[derive(Debug, Clone, Deserialize)]
pub struct SimpleItem(pub Vec<[f32; 2]>, pub (String, f32));

impl RawOcrResult {
    /// Parse a raw payload from engine JSON output.
    ///
    /// Returns `None` when the value matches neither shape; callers treat
    /// that the same as an empty detection list.
    #[must_use]
    pub fn from_json(value: serde_json::Value) -> Option<Self> {
        serde_json::from_value(value).ok()
    }

    /// Normalize the payload into flat detections.
    #[must_use]
    pub fn into_detections(self) -> Vec<TextDetection> {
        match self {
            Self::Simple(items) => items
                .into_iter()
                .map(|SimpleItem(quad, (text, score))| TextDetection {
                    bbox: BBox::from_quad(&quad),
                    text,
                    confidence: score,
                })
                .collect(),
            Self::Rich(rich) => rich.into_detections(),
        }
    }
}

impl RichResult {
    fn into_detections(self) -> Vec<TextDetection> {
        let boxes: Vec<BBox> = if let Some(polys) = self.rec_polys {
            polys.iter().map(|quad| BBox::from_quad(quad)).collect()
        } else if let Some(boxes) = self.rec_boxes {
            boxes
                .iter()
                .map(|[x0, y0, x1, y1]| BBox::new(*x0, *y0, *x1, *y1))
                .collect()
        } else {
            return Vec::new();
        };

        // Parallel arrays; zip truncates to the shortest on length skew.
        self.rec_texts
            .into_iter()
            .zip(self.rec_scores)
            .zip(boxes)
            .map(|((text, confidence), bbox)| TextDetection {
                bbox,
                text,
                confidence,
            })
            .collect()
    }
}
