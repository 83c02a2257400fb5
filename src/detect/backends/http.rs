//! Remote detector client.
//!
//! `POST {base}/detect` with a multipart body carrying one image file field.
//! The detector answers with snake_case JSON:
//!
//! ```json
//! { "success": true,
//!   "top_prediction": { "label": "bottle", "confidence": 0.91, "waste_type": "non-biodegradable" },
//!   "detections": [ { "label": "bottle", "confidence": 0.91,
//!                     "bounding_box": { "x1": 10, "y1": 20, "x2": 110, "y2": 220 } } ] }
//! ```
//!
//! Missing box coordinates default to 0 instead of failing the frame.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use crate::detect::backend::Classifier;
use crate::detect::result::{BoundingBox, ClassificationResult, Detection, TopPrediction};
use crate::detect::waste::{WasteType, WasteTypeTable};
use crate::error::{ClassifyError, TransportError};
use crate::frame::EncodedFrame;

pub const DEFAULT_CLASSIFIER_URL: &str = "http://127.0.0.1:8000";
pub const DETECT_PATH: &str = "detect";
const FILE_FIELD: &str = "file";

#[derive(Debug, Deserialize)]
struct WireResponse {
    success: bool,
    #[serde(default)]
    top_prediction: Option<WireTopPrediction>,
    #[serde(default)]
    detections: Option<Vec<WireDetection>>,
}

#[derive(Debug, Deserialize)]
struct WireTopPrediction {
    label: String,
    confidence: f64,
    #[serde(default)]
    waste_type: Option<WasteType>,
}

#[derive(Debug, Deserialize)]
struct WireDetection {
    label: String,
    confidence: f64,
    #[serde(default)]
    bounding_box: Option<WireBox>,
}

#[derive(Debug, Default, Deserialize)]
struct WireBox {
    #[serde(default)]
    x1: Option<f64>,
    #[serde(default)]
    y1: Option<f64>,
    #[serde(default)]
    x2: Option<f64>,
    #[serde(default)]
    y2: Option<f64>,
}

impl From<WireBox> for BoundingBox {
    fn from(raw: WireBox) -> Self {
        BoundingBox {
            x1: raw.x1.unwrap_or(0.0),
            y1: raw.y1.unwrap_or(0.0),
            x2: raw.x2.unwrap_or(0.0),
            y2: raw.y2.unwrap_or(0.0),
        }
    }
}

fn translate(
    raw: WireResponse,
    table: &WasteTypeTable,
) -> Result<ClassificationResult, ClassifyError> {
    if !raw.success {
        return Err(ClassifyError::Semantic);
    }
    let detections = raw
        .detections
        .unwrap_or_default()
        .into_iter()
        .map(|det| Detection {
            label: det.label,
            confidence: det.confidence,
            bounding_box: det.bounding_box.unwrap_or_default().into(),
        })
        .collect();
    let top_prediction = raw.top_prediction.map(|top| TopPrediction {
        waste_type: top.waste_type.unwrap_or_else(|| table.lookup(&top.label)),
        label: top.label,
        confidence: top.confidence,
    });
    Ok(ClassificationResult {
        top_prediction,
        detections,
    })
}

/// Parse a detector response body. Exposed for fixtures and the CLI.
pub fn parse_response(
    body: &str,
    table: &WasteTypeTable,
) -> Result<ClassificationResult, ClassifyError> {
    let raw: WireResponse = serde_json::from_str(body)
        .map_err(|err| TransportError::Decode(err.to_string()))?;
    translate(raw, table)
}

/// HTTP client for the remote detector.
#[derive(Clone, Debug)]
pub struct HttpClassifier {
    endpoint: Url,
    agent: ureq::Agent,
    table: WasteTypeTable,
}

impl HttpClassifier {
    pub fn new(base_url: &str, table: WasteTypeTable, timeout: Duration) -> Result<Self> {
        let endpoint = detect_url(base_url)?;
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Ok(Self {
            endpoint,
            agent,
            table,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl Classifier for HttpClassifier {
    fn name(&self) -> &'static str {
        "http"
    }

    fn classify(&self, frame: &EncodedFrame) -> Result<ClassificationResult, ClassifyError> {
        let boundary = format!("----waste-classifier-{:016x}", rand::random::<u64>());
        let body = multipart_body(&boundary, frame);
        let response = self
            .agent
            .request_url("POST", &self.endpoint)
            .set(
                "Content-Type",
                &format!("multipart/form-data; boundary={}", boundary),
            )
            .set("Accept", "application/json")
            .send_bytes(&body);

        let response = match response {
            Ok(response) => response,
            Err(ureq::Error::Status(status, _)) => {
                return Err(TransportError::Status(status).into());
            }
            Err(ureq::Error::Transport(err)) => {
                return Err(TransportError::Io(err.to_string()).into());
            }
        };

        let raw: WireResponse = response
            .into_json()
            .map_err(|err| TransportError::Decode(err.to_string()))?;
        translate(raw, &self.table)
    }
}

/// `{base}/detect`, tolerating a trailing slash on the base.
pub fn detect_url(base_url: &str) -> Result<Url> {
    let base = base_url.trim().trim_end_matches('/');
    Url::parse(&format!("{}/{}", base, DETECT_PATH))
        .with_context(|| format!("invalid classifier url '{}'", base_url))
}

fn multipart_body(boundary: &str, frame: &EncodedFrame) -> Vec<u8> {
    let mut body = Vec::with_capacity(frame.len() + 256);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            FILE_FIELD,
            EncodedFrame::FILE_NAME
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", EncodedFrame::MIME_TYPE).as_bytes());
    body.extend_from_slice(frame.bytes());
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}
