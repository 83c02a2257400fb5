//! waste_live - live camera waste detection
//!
//! This binary:
//! 1. Loads configuration (file + environment + flags)
//! 2. Acquires the camera and starts the detection session
//! 3. Follows the session on a status line, optionally writing the
//!    bounding-box overlay to a PNG whenever it changes
//! 4. Stops on Ctrl-C or after `--seconds`, releasing the camera, and prints
//!    the classification history as JSON

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use waste_classifier::ui::{Ui, UiMode};
use waste_classifier::{
    classifier_for_endpoint, open_device, DetectionSession, DetectorConfig, ImageSurface,
    LiveOverlay, LogNotifier, OverlayRenderer, Viewport,
};

const REFRESH: Duration = Duration::from_millis(250);
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "waste_live", about = "Classify waste from a live camera")]
struct Args {
    /// Camera URL (stub://..., http(s)://snapshot, /dev/videoN)
    #[arg(long, value_name = "URL")]
    camera: Option<String>,
    /// Classifier base URL (http(s)://... or stub://)
    #[arg(long, value_name = "URL")]
    endpoint: Option<String>,
    /// Stop after this many seconds (default: run until Ctrl-C)
    #[arg(long)]
    seconds: Option<u64>,
    /// Write the overlay to this PNG whenever it changes
    #[arg(long, value_name = "PATH")]
    overlay_out: Option<PathBuf>,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let ui = Ui::new(UiMode::parse(Some(&args.ui)), std::io::stderr().is_terminal());

    let mut cfg = DetectorConfig::load()?;
    if let Some(camera) = args.camera {
        cfg.camera_url = camera;
    }
    if let Some(endpoint) = args.endpoint {
        cfg.classifier.url = endpoint;
    }

    let classifier = {
        let _stage = ui.stage("Connect classifier");
        classifier_for_endpoint(
            &cfg.classifier.url,
            cfg.waste_types.clone(),
            cfg.classifier.timeout,
        )?
    };
    log::info!(
        "classifier: {} ({})",
        classifier.name(),
        cfg.classifier.url
    );
    let device = open_device(&cfg.camera_url)?;

    let mut overlay = match &args.overlay_out {
        Some(_) => {
            let mut surface = ImageSurface::new(1, 1);
            if let Some(font) = &cfg.overlay_font {
                surface = surface.with_font_file(font)?;
            }
            Some(LiveOverlay::new(
                OverlayRenderer::new(cfg.waste_types.clone()),
                surface,
            ))
        }
        None => None,
    };

    let session = DetectionSession::new(
        device,
        Arc::from(classifier),
        Arc::new(LogNotifier),
        cfg.session.clone(),
    );

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("set Ctrl-C handler")?;

    {
        let _stage = ui.stage("Acquire camera");
        session.start()?;
    }

    let deadline = args
        .seconds
        .map(|secs| Instant::now() + Duration::from_secs(secs));
    let mut status = ui.status_line();
    loop {
        match rx.recv_timeout(REFRESH) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                log::info!("shutdown signal received");
                break;
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            break;
        }

        let snapshot = session.snapshot();
        status.update(&snapshot);
        if !snapshot.is_active() {
            break;
        }
        if let (Some(overlay), Some(path)) = (overlay.as_mut(), args.overlay_out.as_deref()) {
            let (width, height) = match snapshot.source_dimensions {
                (0, 0) => (
                    session.settings().camera.width,
                    session.settings().camera.height,
                ),
                dims => dims,
            };
            if overlay.update(&snapshot, Viewport::new(width as f64, height as f64)) {
                overlay.surface().save_png(path)?;
            }
        }
    }
    status.finish();

    session.stop();
    if !session.wait_for_idle(DRAIN_TIMEOUT) {
        log::warn!("classification still outstanding after {:?}", DRAIN_TIMEOUT);
    }

    let snapshot = session.snapshot();
    log::info!(
        "{} cycles, {} history entries",
        session.cycles_started(),
        snapshot.history.len()
    );
    println!("{}", serde_json::to_string_pretty(&snapshot.history)?);
    Ok(())
}
