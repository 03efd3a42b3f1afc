use chrono::{DateTime, Local};

use crate::constants::TIME_FORMAT;

// Best-effort numeric parse of a sensor payload. Anything unusable reads as 0.
pub fn parse_reading(payload: &[u8]) -> f64 {
    std::str::from_utf8(payload)
        .ok()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

pub fn format_time(at: DateTime<Local>) -> String {
    at.format(TIME_FORMAT).to_string()
}

// Compact display: integers without decimals, everything else with two,
// very large magnitudes in scientific notation.
pub fn format_value(value: f64) -> String {
    if value.abs() >= 1e9 {
        format!("{:.2e}", value)
    } else if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}
