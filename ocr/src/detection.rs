use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in image pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    /// Left edge.
    pub x0: f32,
    /// Top edge.
    pub y0: f32,
    /// Right edge.
    pub x1: f32,
    /// Bottom edge.
    pub y1: f32,
}

impl BBox {
    /// Build a box directly from its edges.
    #[must_use]
    pub const fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Reduce an arbitrary quadrilateral to its axis-aligned hull.
    ///
    /// Detection polygons from OCR engines are free quads; downstream
    /// geometry only needs the min/max extents. An empty point list yields
    /// the zero box.
    #[must_use]
    pub fn from_quad(points: &[[f32; 2]]) -> Self {
        let mut b = Self::new(f32::MAX, f32::MAX, f32::MIN, f32::MIN);
        for [x, y] in points {
            b.x0 = b.x0.min(*x);
            b.y0 = b.y0.min(*y);
            b.x1 = b.x1.max(*x);
            b.y1 = b.y1.max(*y);
        }
        if points.is_empty() {
            return Self::new(0.0, 0.0, 0.0, 0.0);
        }
        b
    }

    /// Box width in pixels (never negative).
    #[must_use]
    pub fn width(&self) -> f32 {
        (self.x1 - self.x0).max(0.0)
    }

    /// Box height in pixels (never negative).
    #[must_use]
    pub fn height(&self) -> f32 {
        (self.y1 - self.y0).max(0.0)
    }

    /// Vertical center of the box.
    #[must_use]
    pub fn center_y(&self) -> f32 {
        (self.y0 + self.y1) / 2.0
    }

    /// Smallest box covering both `self` and `other`.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// One OCR hit: recognized text with its box and confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextDetection {
    /// Bounding box of the recognized region.
    pub bbox: BBox,
    /// Recognized text.
    pub text: String,
    /// Recognition confidence in `0..=1`.
    pub confidence: f32,
}

impl TextDetection {
    /// Build a detection from a quad polygon and recognition output.
    #[must_use]
    pub fn from_quad(points: &[[f32; 2]], text: impl Into<String>, confidence: f32) -> Self {
        Self {
            bbox: BBox::from_quad(points),
            text: text.into(),
            confidence,
        }
    }
}
