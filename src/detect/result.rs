use serde::{Deserialize, Serialize};

use super::waste::WasteType;

/// Axis-aligned box in source-frame pixel coordinates.
///
/// `x1 < x2` and `y1 < y2` by convention; the remote detector does not
/// guarantee it and nothing here enforces it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    /// Same box with `x1 <= x2` and `y1 <= y2`.
    pub fn normalized(&self) -> Self {
        Self {
            x1: self.x1.min(self.x2),
            y1: self.y1.min(self.y2),
            x2: self.x1.max(self.x2),
            y2: self.y1.max(self.y2),
        }
    }

    /// Scale each axis independently.
    pub fn scaled(&self, scale_x: f64, scale_y: f64) -> Self {
        Self {
            x1: self.x1 * scale_x,
            y1: self.y1 * scale_y,
            x2: self.x2 * scale_x,
            y2: self.y2 * scale_y,
        }
    }
}

/// One object observed in a frame.
///
/// `confidence` is whatever scale the detector reports (0..1 or 0..100).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub label: String,
    pub confidence: f64,
    pub bounding_box: BoundingBox,
}

/// The detector's primary result for a frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopPrediction {
    pub label: String,
    pub confidence: f64,
    pub waste_type: WasteType,
}

/// Per-frame summary. Produced fresh by every cycle and never merged.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub top_prediction: Option<TopPrediction>,
    pub detections: Vec<Detection>,
}

impl ClassificationResult {
    pub fn is_empty(&self) -> bool {
        self.top_prediction.is_none() && self.detections.is_empty()
    }
}

/// Latest classification shown next to the live feed.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub label: String,
    pub waste_type: WasteType,
    pub confidence: f64,
    pub detections: Vec<Detection>,
    /// Epoch milliseconds.
    pub detected_at: u64,
}
