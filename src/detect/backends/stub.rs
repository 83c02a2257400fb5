use std::sync::atomic::{AtomicUsize, Ordering};

use crate::detect::backend::Classifier;
use crate::detect::result::{BoundingBox, ClassificationResult, Detection, TopPrediction};
use crate::detect::waste::WasteTypeTable;
use crate::error::ClassifyError;
use crate::frame::EncodedFrame;

/// One scripted answer, expressed relative to the frame so it fits any resolution.
#[derive(Clone, Debug)]
pub struct ScriptedDetection {
    pub label: &'static str,
    pub confidence: f64,
    /// Box as fractions of the frame: (x1, y1, x2, y2).
    pub area: (f64, f64, f64, f64),
}

/// Offline classifier that replays a fixed script, one step per call.
pub struct StubClassifier {
    script: Vec<Vec<ScriptedDetection>>,
    table: WasteTypeTable,
    calls: AtomicUsize,
}

impl StubClassifier {
    pub fn new(script: Vec<Vec<ScriptedDetection>>, table: WasteTypeTable) -> Self {
        Self {
            script,
            table,
            calls: AtomicUsize::new(0),
        }
    }

    /// A short loop of bottle / carry bag / empty frames.
    pub fn demo(table: WasteTypeTable) -> Self {
        Self::new(
            vec![
                vec![ScriptedDetection {
                    label: "bottle",
                    confidence: 0.87,
                    area: (0.30, 0.20, 0.55, 0.85),
                }],
                vec![
                    ScriptedDetection {
                        label: "carry_bag",
                        confidence: 0.74,
                        area: (0.05, 0.10, 0.40, 0.60),
                    },
                    ScriptedDetection {
                        label: "bottle",
                        confidence: 0.52,
                        area: (0.60, 0.30, 0.80, 0.90),
                    },
                ],
                vec![],
            ],
            table,
        )
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Classifier for StubClassifier {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn classify(&self, frame: &EncodedFrame) -> Result<ClassificationResult, ClassifyError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.script.is_empty() {
            return Ok(ClassificationResult::default());
        }
        let step = &self.script[call % self.script.len()];
        let (w, h) = (frame.width as f64, frame.height as f64);
        let detections: Vec<Detection> = step
            .iter()
            .map(|scripted| {
                let (x1, y1, x2, y2) = scripted.area;
                Detection {
                    label: scripted.label.to_string(),
                    confidence: scripted.confidence,
                    bounding_box: BoundingBox::new(x1 * w, y1 * h, x2 * w, y2 * h),
                }
            })
            .collect();
        let top_prediction = detections
            .iter()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
            .map(|best| TopPrediction {
                label: best.label.clone(),
                confidence: best.confidence,
                waste_type: self.table.lookup(&best.label),
            });
        Ok(ClassificationResult {
            top_prediction,
            detections,
        })
    }
}
