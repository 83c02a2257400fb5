//! JPEG snapshot camera (`http(s)://`).
//!
//! Many IP webcams expose the current frame as a single JPEG at a fixed URL.
//! Opening the camera fetches one snapshot to prove the endpoint answers and
//! to learn the delivered resolution; each grab fetches a fresh snapshot.

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use std::io::Read;
use std::time::Duration;
use url::Url;

use super::{CameraDevice, CameraRequest, CameraStream, VideoTrack};
use crate::error::CameraAccessError;

const MAX_JPEG_BYTES: u64 = 5 * 1024 * 1024;
const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct SnapshotCamera {
    url: Url,
    agent: ureq::Agent,
}

impl SnapshotCamera {
    pub fn new(url: &str) -> Result<Self> {
        let url = Url::parse(url).context("parse snapshot camera url")?;
        let agent = ureq::AgentBuilder::new().timeout(SNAPSHOT_TIMEOUT).build();
        Ok(Self { url, agent })
    }
}

impl CameraDevice for SnapshotCamera {
    fn describe(&self) -> String {
        format!("{} (snapshot)", self.url)
    }

    fn open(&self, request: &CameraRequest) -> Result<CameraStream, CameraAccessError> {
        let first = fetch_snapshot(&self.agent, &self.url)
            .map_err(|err| CameraAccessError::new(format!("{:#}", err)))?;
        let (width, height) = first.dimensions();
        if (width, height) != (request.width, request.height) {
            log::info!(
                "SnapshotCamera: {} delivers {}x{} (requested {}x{})",
                self.url,
                width,
                height,
                request.width,
                request.height
            );
        }
        let track = SnapshotTrack {
            label: self.url.to_string(),
            url: self.url.clone(),
            agent: self.agent.clone(),
            width,
            height,
            stopped: false,
        };
        Ok(CameraStream::new(self.url.to_string(), vec![Box::new(track)]))
    }
}

struct SnapshotTrack {
    label: String,
    url: Url,
    agent: ureq::Agent,
    width: u32,
    height: u32,
    stopped: bool,
}

impl VideoTrack for SnapshotTrack {
    fn label(&self) -> &str {
        &self.label
    }

    fn dimensions(&self) -> (u32, u32) {
        if self.stopped {
            (0, 0)
        } else {
            (self.width, self.height)
        }
    }

    fn grab_frame(&mut self) -> Result<Option<RgbImage>> {
        if self.stopped {
            return Ok(None);
        }
        let frame = fetch_snapshot(&self.agent, &self.url)?;
        self.width = frame.width();
        self.height = frame.height();
        Ok(Some(frame))
    }

    fn stop(&mut self) {
        self.stopped = true;
    }
}

fn fetch_snapshot(agent: &ureq::Agent, url: &Url) -> Result<RgbImage> {
    let response = agent
        .request_url("GET", url)
        .call()
        .with_context(|| format!("fetch jpeg snapshot from {}", url))?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(MAX_JPEG_BYTES)
        .read_to_end(&mut bytes)
        .context("read jpeg snapshot")?;
    if bytes.is_empty() {
        return Err(anyhow!("empty jpeg snapshot"));
    }
    let image = image::load_from_memory(&bytes).context("decode jpeg snapshot")?;
    Ok(image.into_rgb8())
}
