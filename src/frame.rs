//! Still-frame capture.
//!
//! - `EncodedFrame`: one compressed still ready for upload.
//! - `FrameCapturer`: grabs the current frame of a live track and encodes it.
//!
//! A track that has not reported dimensions yet is the normal "not ready"
//! case: capture yields `None` rather than an error.

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

use crate::ingest::VideoTrack;

/// Default JPEG quality (0.9 on a 0..1 scale).
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Compressed still image of one frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedFrame {
    bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl EncodedFrame {
    pub const MIME_TYPE: &'static str = "image/jpeg";
    pub const FILE_NAME: &'static str = "frame.jpg";

    pub fn from_jpeg(bytes: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            bytes,
            width,
            height,
        }
    }

    /// Read an image from disk. JPEG bytes are kept as they are; any other
    /// format the decoder understands is re-encoded as JPEG so the upload
    /// matches its declared type.
    pub fn from_jpeg_file(path: &std::path::Path) -> Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("read image {}", path.display()))?;
        let decoded = image::load_from_memory(&bytes)
            .with_context(|| format!("decode image {}", path.display()))?;
        if image::guess_format(&bytes).ok() == Some(image::ImageFormat::Jpeg) {
            return Ok(Self::from_jpeg(bytes, decoded.width(), decoded.height()));
        }
        FrameCapturer::default().encode(&decoded.into_rgb8())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Encodes the current frame of a live track.
#[derive(Clone, Copy, Debug)]
pub struct FrameCapturer {
    quality: u8,
}

impl FrameCapturer {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Capture one still, or `None` while the track has no dimensions.
    pub fn capture(&self, track: &mut dyn VideoTrack) -> Result<Option<EncodedFrame>> {
        let (width, height) = track.dimensions();
        if width == 0 || height == 0 {
            return Ok(None);
        }
        let Some(image) = track.grab_frame().context("grab frame")? else {
            return Ok(None);
        };
        if image.width() == 0 || image.height() == 0 {
            return Ok(None);
        }
        self.encode(&image).map(Some)
    }

    pub fn encode(&self, image: &RgbImage) -> Result<EncodedFrame> {
        let mut bytes = Vec::with_capacity(image.as_raw().len() / 8);
        JpegEncoder::new_with_quality(&mut bytes, self.quality)
            .encode_image(image)
            .context("encode jpeg frame")?;
        Ok(EncodedFrame::from_jpeg(bytes, image.width(), image.height()))
    }
}

impl Default for FrameCapturer {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}
