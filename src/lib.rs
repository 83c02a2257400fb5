//! Live Waste Classifier
//!
//! This crate runs a camera-driven waste detection loop: frames are grabbed
//! from a live camera on a fixed cadence, sent to a remote object detector,
//! and the answers are turned into bounding-box overlays, a "latest
//! classification" and a short de-duplicated history.
//!
//! # Guarantees
//!
//! 1. **Single flight**: at most one classification request is outstanding.
//!    Ticks that arrive while one is in flight are dropped, not queued.
//! 2. **Prompt release**: stopping a session releases the camera and the poll
//!    timer immediately, from any exit path, exactly once.
//! 3. **No stale writes**: a result that comes back after its session was
//!    stopped or restarted is discarded.
//! 4. **Quiet failures**: detection errors are logged every time but notified
//!    at most once per throttle window.
//!
//! # Module Structure
//!
//! - `ingest`: camera devices and the exclusive `CameraStream`
//! - `frame`: JPEG snapshot encoding
//! - `detect`: detector client, result types and the waste-type table
//! - `session`: the detection session state machine
//! - `overlay`: bounding-box rendering
//! - `history`, `notify`, `format`: classification log, notices and display helpers
//! - `config`, `ui`: runtime configuration and terminal presentation

pub mod config;
pub mod detect;
pub mod error;
pub mod format;
pub mod frame;
pub mod history;
pub mod ingest;
pub mod notify;
pub mod overlay;
pub mod session;
pub mod ui;

pub use config::DetectorConfig;
pub use detect::{
    classifier_for_endpoint, BoundingBox, Classification, ClassificationResult, Classifier,
    Detection, HttpClassifier, StubClassifier, TopPrediction, WasteType, WasteTypeTable,
};
pub use error::{CameraAccessError, ClassifyError, StartError, TransportError};
pub use frame::{EncodedFrame, FrameCapturer};
pub use history::{HistoryEntry, HistoryLog};
pub use ingest::{open_device, CameraDevice, CameraRequest, CameraStream, FacingMode, VideoTrack};
pub use notify::{LogNotifier, Notice, Notifier};
pub use overlay::{ImageSurface, LiveOverlay, OverlayRenderer, Surface, Viewport};
pub use session::{DetectionSession, PollOutcome, SessionPhase, SessionSettings, SkipReason};
