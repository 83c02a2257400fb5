//! Display helpers shared by the overlay, history rows and the CLIs.

use regex::Regex;
use std::sync::OnceLock;

/// `"carry_bag"` -> `"Carry Bag"`. Applying it twice changes nothing.
pub fn format_label(label: &str) -> String {
    static WORD_START_RE: OnceLock<Regex> = OnceLock::new();
    let re = WORD_START_RE.get_or_init(|| Regex::new(r"\b\w").expect("word start regex"));

    let spaced = label.replace('_', " ");
    re.replace_all(&spaced, |caps: &regex::Captures<'_>| caps[0].to_uppercase())
        .into_owned()
}

/// Percentage for a confidence reported on either a 0..1 or a 0..100 scale.
pub fn format_confidence(value: f64) -> u32 {
    if value.is_nan() {
        return 0;
    }
    let scaled = if value > 1.0 { value } else { value * 100.0 };
    scaled.min(100.0).round().max(0.0) as u32
}

/// `HH:MM:SS` (UTC) for an epoch-millisecond timestamp.
pub fn format_clock(epoch_ms: u64) -> String {
    let secs_of_day = (epoch_ms / 1000) % 86_400;
    format!(
        "{:02}:{:02}:{:02}",
        secs_of_day / 3600,
        (secs_of_day / 60) % 60,
        secs_of_day % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_formatting() {
        assert_eq!(format_label("carry_bag"), "Carry Bag");
        assert_eq!(format_label("bottle"), "Bottle");
        assert_eq!(format_label("plastic bottle_cap"), "Plastic Bottle Cap");
        assert_eq!(format_label(""), "");
    }

    #[test]
    fn label_formatting_is_idempotent() {
        for label in ["carry_bag", "e_waste_board", "Mixed_CASE label", "x"] {
            let once = format_label(label);
            assert_eq!(format_label(&once), once);
        }
    }

    #[test]
    fn confidence_scales() {
        assert_eq!(format_confidence(0.87), 87);
        assert_eq!(format_confidence(95.0), 95);
        assert_eq!(format_confidence(150.0), 100);
        assert_eq!(format_confidence(1.0), 100);
        assert_eq!(format_confidence(0.0), 0);
        assert_eq!(format_confidence(f64::NAN), 0);
    }

    #[test]
    fn clock_formatting() {
        assert_eq!(format_clock(0), "00:00:00");
        assert_eq!(format_clock(((13 * 3600 + 5 * 60 + 9) * 1000) + 999), "13:05:09");
    }
}
