//! User-visible error notices (toasts in a UI, log lines in a headless run).

use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub title: String,
    pub description: String,
}

impl Notice {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn camera_error() -> Self {
        Self::new(
            "Camera Error",
            "Unable to access the camera. Please check permissions and try again.",
        )
    }

    pub fn detection_error(detail: impl Into<String>) -> Self {
        Self::new("Detection Error", detail)
    }
}

/// Receives notices for the user.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Routes notices to the error log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        log::error!("{}: {}", notice.title, notice.description);
    }
}
