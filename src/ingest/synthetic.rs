//! Synthetic camera (`stub://`).
//!
//! Produces patterned frames at the requested resolution. Dimensions stay
//! unknown for a short warm-up after open, like a video element that has not
//! loaded its metadata yet.

use anyhow::Result;
use image::{Rgb, RgbImage};
use std::time::{Duration, Instant};

use super::{CameraDevice, CameraRequest, CameraStream, VideoTrack};
use crate::error::CameraAccessError;

const DEFAULT_WARMUP: Duration = Duration::from_millis(200);

#[derive(Clone, Debug)]
pub struct SyntheticCamera {
    url: String,
    warmup: Duration,
    deny: bool,
}

impl SyntheticCamera {
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        // stub://denied simulates a refused permission prompt.
        let deny = url.trim_end_matches('/').ends_with("denied");
        Self {
            url,
            warmup: DEFAULT_WARMUP,
            deny,
        }
    }

    pub fn with_warmup(mut self, warmup: Duration) -> Self {
        self.warmup = warmup;
        self
    }
}

impl CameraDevice for SyntheticCamera {
    fn describe(&self) -> String {
        format!("{} (synthetic)", self.url)
    }

    fn open(&self, request: &CameraRequest) -> Result<CameraStream, CameraAccessError> {
        if self.deny {
            return Err(CameraAccessError::new("permission denied"));
        }
        if request.width == 0 || request.height == 0 {
            return Err(CameraAccessError::new("requested resolution is empty"));
        }
        log::info!(
            "SyntheticCamera: opened {} ({}x{}, facing {:?})",
            self.url,
            request.width,
            request.height,
            request.facing
        );
        let track = SyntheticTrack {
            label: format!("{} video", self.url),
            width: request.width,
            height: request.height,
            ready_at: Instant::now() + self.warmup,
            frame_count: 0,
            scene_state: 0,
        };
        Ok(CameraStream::new(self.url.clone(), vec![Box::new(track)]))
    }
}

struct SyntheticTrack {
    label: String,
    width: u32,
    height: u32,
    ready_at: Instant,
    frame_count: u64,
    /// Simulated scene, changes every 50 frames.
    scene_state: u8,
}

impl VideoTrack for SyntheticTrack {
    fn label(&self) -> &str {
        &self.label
    }

    fn dimensions(&self) -> (u32, u32) {
        if Instant::now() < self.ready_at {
            (0, 0)
        } else {
            (self.width, self.height)
        }
    }

    fn grab_frame(&mut self) -> Result<Option<RgbImage>> {
        if Instant::now() < self.ready_at {
            return Ok(None);
        }
        self.frame_count += 1;
        if self.frame_count.is_multiple_of(50) {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let offset = self.frame_count + self.scene_state as u64;
        let frame = RgbImage::from_fn(self.width, self.height, |x, y| {
            let base = (x as u64 + y as u64 + offset) % 256;
            Rgb([base as u8, (base / 2) as u8, self.scene_state.wrapping_mul(40)])
        });
        Ok(Some(frame))
    }

    fn stop(&mut self) {
        log::debug!("SyntheticCamera: track {} stopped", self.label);
    }
}
