pub mod http;
pub mod stub;

pub use http::HttpClassifier;
pub use stub::StubClassifier;

use anyhow::{anyhow, Result};
use std::time::Duration;

use super::backend::Classifier;
use super::waste::WasteTypeTable;

/// Build the classifier for a configured endpoint.
///
/// `stub://` endpoints get the scripted offline classifier, `http(s)://`
/// endpoints the remote detector client.
pub fn classifier_for_endpoint(
    endpoint: &str,
    table: WasteTypeTable,
    timeout: Duration,
) -> Result<Box<dyn Classifier>> {
    if endpoint.starts_with("stub://") {
        return Ok(Box::new(StubClassifier::demo(table)));
    }
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        return Ok(Box::new(HttpClassifier::new(endpoint, table, timeout)?));
    }
    Err(anyhow!(
        "unsupported classifier endpoint '{}'; expected http(s):// or stub://",
        endpoint
    ))
}
