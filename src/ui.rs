//! Terminal presentation for the live binary: stage spinners while the
//! camera and classifier come up, then a status line that follows the
//! session.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

use crate::format::{format_clock, format_confidence, format_label};
use crate::session::SessionSnapshot;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

impl UiMode {
    pub fn parse(flag: Option<&str>) -> Self {
        match flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        Self { mode, is_tty }
    }

    fn pretty(&self) -> bool {
        self.is_tty && self.mode != UiMode::Plain
    }

    fn spinner(&self, template: &str) -> ProgressBar {
        let spinner = ProgressBar::new_spinner();
        spinner.set_draw_target(ProgressDrawTarget::stderr());
        spinner.enable_steady_tick(Duration::from_millis(120));
        let style = ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.pretty() {
            let spinner = self.spinner("{spinner} {msg}");
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }

    pub fn status_line(&self) -> StatusLine {
        let bar = self
            .pretty()
            .then(|| self.spinner("{spinner} [{elapsed}] {msg}"));
        StatusLine {
            bar,
            last: String::new(),
        }
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let message = format!("✔ {} ({})", self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

/// One-line summary of the session that only reprints when it changes.
pub struct StatusLine {
    bar: Option<ProgressBar>,
    last: String,
}

impl StatusLine {
    pub fn update(&mut self, snapshot: &SessionSnapshot) {
        let line = describe(snapshot);
        if line == self.last {
            return;
        }
        match &self.bar {
            Some(bar) => bar.set_message(line.clone()),
            None => eprintln!("{line}"),
        }
        self.last = line;
    }

    pub fn finish(self) {
        if let Some(bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}

/// Render the latest classification and detection count for a status line.
pub fn describe(snapshot: &SessionSnapshot) -> String {
    if !snapshot.is_active() {
        return "camera off".to_string();
    }
    let objects = match snapshot.detections.len() {
        1 => "1 object".to_string(),
        n => format!("{n} objects"),
    };
    match &snapshot.latest {
        Some(latest) => format!(
            "{} ({}%) {} | {} | {}",
            format_label(&latest.label),
            format_confidence(latest.confidence),
            latest.waste_type.display_name(),
            objects,
            format_clock(latest.detected_at)
        ),
        None => format!("scanning | {objects}"),
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Classification, WasteType};
    use crate::session::SessionPhase;

    fn snapshot(phase: SessionPhase, latest: Option<Classification>) -> SessionSnapshot {
        SessionSnapshot {
            phase,
            presentation_open: true,
            detections: Vec::new(),
            latest,
            history: Vec::new(),
            source_dimensions: (0, 0),
        }
    }

    #[test]
    fn describes_idle_and_scanning_states() {
        assert_eq!(describe(&snapshot(SessionPhase::Idle, None)), "camera off");
        assert_eq!(
            describe(&snapshot(SessionPhase::Active, None)),
            "scanning | 0 objects"
        );
    }

    #[test]
    fn describes_latest_classification() {
        let latest = Classification {
            label: "carry_bag".to_string(),
            waste_type: WasteType::NonBiodegradable,
            confidence: 0.8,
            detections: Vec::new(),
            detected_at: 3_600_000,
        };
        let line = describe(&snapshot(SessionPhase::Active, Some(latest)));
        assert!(line.starts_with("Carry Bag (80%) "), "{line}");
        assert!(line.ends_with("01:00:00"), "{line}");
    }

    #[test]
    fn parses_ui_flag() {
        assert_eq!(UiMode::parse(Some("plain")), UiMode::Plain);
        assert_eq!(UiMode::parse(Some("pretty")), UiMode::Pretty);
        assert_eq!(UiMode::parse(None), UiMode::Auto);
    }
}
