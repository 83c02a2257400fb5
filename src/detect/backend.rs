use crate::error::ClassifyError;
use crate::frame::EncodedFrame;

use super::result::ClassificationResult;

/// Remote classifier seam.
///
/// Implementations are opaque: the detection session only relies on a call
/// either producing a normalized result or failing with a transport or
/// semantic error. Calls may block; the session runs them off the polling
/// thread and never issues two at once.
pub trait Classifier: Send + Sync {
    /// Classifier identifier for logs.
    fn name(&self) -> &'static str;

    fn classify(&self, frame: &EncodedFrame) -> Result<ClassificationResult, ClassifyError>;
}
