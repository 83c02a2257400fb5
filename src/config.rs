use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::backends::http::DEFAULT_CLASSIFIER_URL;
use crate::detect::{WasteType, WasteTypeTable};
use crate::frame::DEFAULT_JPEG_QUALITY;
use crate::ingest::{CameraRequest, FacingMode, DEFAULT_CAMERA_HEIGHT, DEFAULT_CAMERA_WIDTH};
use crate::session::{SessionSettings, DEFAULT_ERROR_THROTTLE, DEFAULT_POLL_INTERVAL};

pub const CONFIG_ENV: &str = "WASTE_CLASSIFIER_CONFIG";

const DEFAULT_CAMERA_URL: &str = "stub://camera";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    classifier: Option<ClassifierConfigFile>,
    camera: Option<CameraConfigFile>,
    session: Option<SessionConfigFile>,
    overlay: Option<OverlayConfigFile>,
    waste_types: Option<BTreeMap<String, WasteType>>,
}

#[derive(Debug, Deserialize, Default)]
struct ClassifierConfigFile {
    url: Option<String>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    url: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    facing: Option<FacingMode>,
}

#[derive(Debug, Deserialize, Default)]
struct SessionConfigFile {
    poll_interval_ms: Option<u64>,
    error_throttle_ms: Option<u64>,
    jpeg_quality: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
struct OverlayConfigFile {
    font_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub classifier: ClassifierSettings,
    pub camera_url: String,
    pub session: SessionSettings,
    pub overlay_font: Option<PathBuf>,
    pub waste_types: WasteTypeTable,
}

#[derive(Debug, Clone)]
pub struct ClassifierSettings {
    pub url: String,
    pub timeout: Duration,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierSettings {
                url: DEFAULT_CLASSIFIER_URL.to_string(),
                timeout: DEFAULT_REQUEST_TIMEOUT,
            },
            camera_url: DEFAULT_CAMERA_URL.to_string(),
            session: SessionSettings::default(),
            overlay_font: None,
            waste_types: WasteTypeTable::builtin(),
        }
    }
}

impl DetectorConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var(CONFIG_ENV)
            .ok()
            .filter(|path| !path.trim().is_empty());
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: DetectorConfigFile) -> Self {
        let classifier = file.classifier.unwrap_or_default();
        let camera = file.camera.unwrap_or_default();
        let session = file.session.unwrap_or_default();
        Self {
            classifier: ClassifierSettings {
                url: classifier
                    .url
                    .unwrap_or_else(|| DEFAULT_CLASSIFIER_URL.to_string()),
                timeout: classifier
                    .timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            },
            camera_url: camera
                .url
                .unwrap_or_else(|| DEFAULT_CAMERA_URL.to_string()),
            session: SessionSettings {
                poll_interval: session
                    .poll_interval_ms
                    .map(Duration::from_millis)
                    .unwrap_or(DEFAULT_POLL_INTERVAL),
                error_throttle: session
                    .error_throttle_ms
                    .map(Duration::from_millis)
                    .unwrap_or(DEFAULT_ERROR_THROTTLE),
                jpeg_quality: session.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY),
                camera: CameraRequest {
                    facing: camera.facing.unwrap_or_default(),
                    width: camera.width.unwrap_or(DEFAULT_CAMERA_WIDTH),
                    height: camera.height.unwrap_or(DEFAULT_CAMERA_HEIGHT),
                    audio: false,
                },
            },
            overlay_font: file.overlay.and_then(|overlay| overlay.font_path),
            waste_types: WasteTypeTable::builtin()
                .with_overrides(file.waste_types.unwrap_or_default()),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(url) = env_value("CLASSIFIER_API_URL") {
            self.classifier.url = url;
        }
        if let Some(url) = env_value("WASTE_CAMERA_URL") {
            self.camera_url = url;
        }
        if let Some(ms) = env_millis("WASTE_POLL_INTERVAL_MS")? {
            self.session.poll_interval = ms;
        }
        if let Some(ms) = env_millis("WASTE_ERROR_THROTTLE_MS")? {
            self.session.error_throttle = ms;
        }
        if let Some(path) = env_value("WASTE_OVERLAY_FONT") {
            self.overlay_font = Some(PathBuf::from(path));
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        self.classifier.url = self.classifier.url.trim().to_string();
        let url = url::Url::parse(&self.classifier.url)
            .map_err(|e| anyhow!("invalid classifier url '{}': {}", self.classifier.url, e))?;
        if !matches!(url.scheme(), "http" | "https" | "stub") {
            return Err(anyhow!(
                "classifier url must use http, https or stub (got '{}')",
                url.scheme()
            ));
        }
        if self.camera_url.trim().is_empty() {
            return Err(anyhow!("camera url must not be empty"));
        }
        if self.session.poll_interval.is_zero() {
            return Err(anyhow!("poll interval must be greater than zero"));
        }
        if self.session.error_throttle.is_zero() {
            return Err(anyhow!("error throttle window must be greater than zero"));
        }
        if self.classifier.timeout.is_zero() {
            return Err(anyhow!("classifier timeout must be greater than zero"));
        }
        if self.session.camera.width == 0 || self.session.camera.height == 0 {
            return Err(anyhow!("camera resolution must be non-zero"));
        }
        if !(1..=100).contains(&self.session.jpeg_quality) {
            return Err(anyhow!("jpeg quality must be between 1 and 100"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<DetectorConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_millis(key: &str) -> Result<Option<Duration>> {
    match env_value(key) {
        Some(raw) => {
            let ms: u64 = raw
                .parse()
                .map_err(|_| anyhow!("{} must be an integer number of milliseconds", key))?;
            Ok(Some(Duration::from_millis(ms)))
        }
        None => Ok(None),
    }
}
