//! classify_once - send one image to the detector and print the answer as JSON.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;

use waste_classifier::{classifier_for_endpoint, DetectorConfig, EncodedFrame};

#[derive(Parser, Debug)]
#[command(name = "classify_once", about = "Classify a single JPEG image")]
struct Args {
    /// Image to classify
    #[arg(long, value_name = "PATH")]
    image: PathBuf,
    /// Classifier base URL (http(s)://... or stub://)
    #[arg(long, value_name = "URL")]
    endpoint: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = DetectorConfig::load()?;
    if let Some(endpoint) = args.endpoint {
        cfg.classifier.url = endpoint;
    }

    let classifier = classifier_for_endpoint(
        &cfg.classifier.url,
        cfg.waste_types.clone(),
        cfg.classifier.timeout,
    )?;
    let frame = EncodedFrame::from_jpeg_file(&args.image)?;
    log::info!(
        "classifying {} ({}x{}, {} bytes) via {}",
        args.image.display(),
        frame.width,
        frame.height,
        frame.len(),
        cfg.classifier.url
    );

    let result = classifier
        .classify(&frame)
        .map_err(|err| anyhow!("classification failed: {}", err))?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
