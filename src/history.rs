//! Bounded, newest-first trail of past top predictions.
//!
//! A record is suppressed when it repeats the most recent entry: same label,
//! confidence within one unit and detected less than five seconds later.

use serde::Serialize;
use std::collections::VecDeque;

use crate::detect::WasteType;

/// Maximum retained entries.
pub const HISTORY_CAPACITY: usize = 20;
/// Window in which a repeat of the latest entry is suppressed.
pub const DUPLICATE_WINDOW_MS: u64 = 5_000;
/// Confidence difference below which two entries count as the same reading.
pub const DUPLICATE_CONFIDENCE_DELTA: f64 = 1.0;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub label: String,
    pub waste_type: WasteType,
    pub confidence: f64,
    /// Epoch milliseconds.
    pub detected_at: u64,
}

impl HistoryEntry {
    pub fn new(label: &str, waste_type: WasteType, confidence: f64, detected_at: u64) -> Self {
        Self {
            id: format!("{}-{}", detected_at, label),
            label: label.to_string(),
            waste_type,
            confidence,
            detected_at,
        }
    }

    fn repeats(&self, latest: &HistoryEntry) -> bool {
        latest.label == self.label
            && (latest.confidence - self.confidence).abs() < DUPLICATE_CONFIDENCE_DELTA
            && self.detected_at.saturating_sub(latest.detected_at) < DUPLICATE_WINDOW_MS
    }
}

#[derive(Clone, Debug, Default)]
pub struct HistoryLog {
    entries: VecDeque<HistoryEntry>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the entry was kept.
    pub fn record(&mut self, entry: HistoryEntry) -> bool {
        if let Some(latest) = self.entries.front() {
            if entry.repeats(latest) {
                return false;
            }
        }
        self.entries.push_front(entry);
        self.entries.truncate(HISTORY_CAPACITY);
        true
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.front()
    }

    /// Newest first.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
