//! V4L2 camera (`/dev/videoN`).
//!
//! Opens the device, negotiates RGB3 at the requested resolution (falling back
//! to whatever format the driver keeps) and memory-maps a small buffer ring.
//! Stopping the track drops the stream and closes the device node.

use anyhow::{Context, Result};
use image::RgbImage;
use ouroboros::self_referencing;

use super::{CameraDevice, CameraRequest, CameraStream, VideoTrack};
use crate::error::CameraAccessError;

const BUFFER_COUNT: u32 = 4;

#[derive(Clone, Debug)]
pub struct V4l2Camera {
    device: String,
}

impl V4l2Camera {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
        }
    }
}

impl CameraDevice for V4l2Camera {
    fn describe(&self) -> String {
        format!("{} (v4l2)", self.device)
    }

    fn open(&self, request: &CameraRequest) -> Result<CameraStream, CameraAccessError> {
        let track = V4l2Track::open(&self.device, request)
            .map_err(|err| CameraAccessError::new(format!("{:#}", err)))?;
        Ok(CameraStream::new(self.device.clone(), vec![Box::new(track)]))
    }
}

#[self_referencing]
struct V4l2State {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

struct V4l2Track {
    label: String,
    state: Option<V4l2State>,
    width: u32,
    height: u32,
}

impl V4l2Track {
    fn open(path: &str, request: &CameraRequest) -> Result<Self> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let device =
            v4l::Device::with_path(path).with_context(|| format!("open v4l2 device {}", path))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = request.width;
        format.height = request.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!("V4l2Camera: failed to set format on {}: {}", path, err);
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };

        let state = V4l2StateTryBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, BUFFER_COUNT)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;

        log::info!(
            "V4l2Camera: opened {} ({}x{})",
            path,
            format.width,
            format.height
        );
        Ok(Self {
            label: path.to_string(),
            state: Some(state),
            width: format.width,
            height: format.height,
        })
    }
}

impl VideoTrack for V4l2Track {
    fn label(&self) -> &str {
        &self.label
    }

    fn dimensions(&self) -> (u32, u32) {
        if self.state.is_some() {
            (self.width, self.height)
        } else {
            (0, 0)
        }
    }

    fn grab_frame(&mut self) -> Result<Option<RgbImage>> {
        use v4l::io::traits::CaptureStream;

        let Some(state) = self.state.as_mut() else {
            return Ok(None);
        };
        let buf = state
            .with_mut(|fields| fields.stream.next().map(|(buf, _meta)| buf.to_vec()))
            .context("capture v4l2 frame")?;
        let expected = (self.width * self.height * 3) as usize;
        if buf.len() < expected {
            log::debug!(
                "V4l2Camera: short frame on {} ({} < {} bytes)",
                self.label,
                buf.len(),
                expected
            );
            return Ok(None);
        }
        Ok(RgbImage::from_raw(
            self.width,
            self.height,
            buf[..expected].to_vec(),
        ))
    }

    fn stop(&mut self) {
        self.state = None;
    }
}
