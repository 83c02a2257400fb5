//! Camera devices.
//!
//! This module provides the camera side of a detection session:
//! - `CameraDevice`: something that can be asked for a stream (permission prompt,
//!   device open, snapshot endpoint probe)
//! - `CameraStream`: the single exclusive handle to an acquired camera
//! - `VideoTrack`: one live video track inside a stream
//!
//! Devices are selected by URL:
//! - `stub://...` synthetic camera (demos, tests)
//! - `http(s)://...` JPEG snapshot endpoint (IP webcams)
//! - `/dev/videoN` local V4L2 device (feature: camera-v4l2)
//!
//! A `CameraStream` is released exactly once. `stop()` may be called from any
//! number of exit paths, and dropping the stream releases it as well.

use anyhow::{anyhow, Result};
use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::error::CameraAccessError;

pub mod snapshot;
pub mod synthetic;
#[cfg(feature = "camera-v4l2")]
pub mod v4l2;

pub use snapshot::SnapshotCamera;
pub use synthetic::SyntheticCamera;
#[cfg(feature = "camera-v4l2")]
pub use v4l2::V4l2Camera;

pub const DEFAULT_CAMERA_WIDTH: u32 = 1280;
pub const DEFAULT_CAMERA_HEIGHT: u32 = 720;

/// Which way the requested camera should face.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    User,
    #[default]
    Environment,
}

/// Ideal constraints for a camera request. Devices may deliver something else;
/// the stream reports what it actually delivers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraRequest {
    pub facing: FacingMode,
    pub width: u32,
    pub height: u32,
    pub audio: bool,
}

impl Default for CameraRequest {
    fn default() -> Self {
        Self {
            facing: FacingMode::Environment,
            width: DEFAULT_CAMERA_WIDTH,
            height: DEFAULT_CAMERA_HEIGHT,
            audio: false,
        }
    }
}

/// One live video track.
pub trait VideoTrack: Send {
    fn label(&self) -> &str;

    /// Delivered pixel dimensions, `(0, 0)` until the track is ready.
    fn dimensions(&self) -> (u32, u32);

    /// Current frame, or `None` when no frame is available yet.
    fn grab_frame(&mut self) -> Result<Option<RgbImage>>;

    /// Release the underlying device. Called at most once by `CameraStream`.
    fn stop(&mut self);
}

/// A camera that can be acquired.
pub trait CameraDevice: Send + Sync {
    /// Human-readable device description for logs.
    fn describe(&self) -> String;

    fn open(&self, request: &CameraRequest) -> Result<CameraStream, CameraAccessError>;
}

/// Exclusive handle to an acquired camera.
///
/// Not `Clone`. Tracks are stopped once, by the first of `stop()` or `Drop`.
pub struct CameraStream {
    source: String,
    tracks: Vec<Box<dyn VideoTrack>>,
}

impl CameraStream {
    pub fn new(source: impl Into<String>, tracks: Vec<Box<dyn VideoTrack>>) -> Self {
        Self {
            source: source.into(),
            tracks,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_live(&self) -> bool {
        !self.tracks.is_empty()
    }

    /// Dimensions of the primary video track, `(0, 0)` if unknown or released.
    pub fn dimensions(&self) -> (u32, u32) {
        self.tracks
            .first()
            .map(|track| track.dimensions())
            .unwrap_or((0, 0))
    }

    pub fn primary_track(&mut self) -> Option<&mut (dyn VideoTrack + 'static)> {
        self.tracks.first_mut().map(|track| track.as_mut())
    }

    /// Stop every track. Returns `false` when the stream was already released.
    pub fn stop(&mut self) -> bool {
        if self.tracks.is_empty() {
            return false;
        }
        for mut track in self.tracks.drain(..) {
            log::debug!("camera {}: stopping track {}", self.source, track.label());
            track.stop();
        }
        log::info!("camera {} released", self.source);
        true
    }
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for CameraStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraStream")
            .field("source", &self.source)
            .field("tracks", &self.tracks.len())
            .finish()
    }
}

/// Pick a camera device from its URL.
pub fn open_device(url: &str) -> Result<Box<dyn CameraDevice>> {
    if url.starts_with("stub://") {
        return Ok(Box::new(SyntheticCamera::new(url)));
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        return Ok(Box::new(SnapshotCamera::new(url)?));
    }
    if url.starts_with('/') {
        #[cfg(feature = "camera-v4l2")]
        {
            return Ok(Box::new(V4l2Camera::new(url)));
        }
        #[cfg(not(feature = "camera-v4l2"))]
        {
            return Err(anyhow!(
                "camera device {} requires the camera-v4l2 feature",
                url
            ));
        }
    }
    Err(anyhow!(
        "unsupported camera url '{}'; expected stub://, http(s):// or a device path",
        url
    ))
}
