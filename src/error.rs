//! Error taxonomy for the detection core.
//!
//! Camera failures abort a session start. Classifier failures are contained
//! inside the polling loop and only surface through throttled notices.

use thiserror::Error;

/// The camera could not be acquired (permission denied, device missing, busy).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unable to access the camera: {reason}")]
pub struct CameraAccessError {
    pub reason: String,
}

impl CameraAccessError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Failure talking to the remote detector at the HTTP layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("classifier request failed with status {0}")]
    Status(u16),
    #[error("classifier request failed: {0}")]
    Io(String),
    #[error("classifier response could not be decoded: {0}")]
    Decode(String),
}

/// Failure of a single `classify` call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The detector answered but flagged the request as failed.
    #[error("classifier response did not succeed")]
    Semantic,
}

impl ClassifyError {
    pub fn is_transport(&self) -> bool {
        matches!(self, ClassifyError::Transport(_))
    }
}

/// Failure to bring a detection session up.
#[derive(Debug, Error)]
pub enum StartError {
    #[error(transparent)]
    Camera(#[from] CameraAccessError),
    #[error("failed to start poll timer: {0}")]
    Timer(String),
}
