//! Display formatting for the watch face.

use chrono::NaiveDateTime;

const DEGREE: char = '\u{00B0}';

/// Convert a Celsius value to the unit the snapshot asks for.
pub fn to_display_unit(celsius: f64, is_metric: bool) -> f64 {
    if is_metric {
        celsius
    } else {
        celsius * 1.8 + 32.0
    }
}

/// One decimal place and a degree sign, e.g. `68.0°`.
pub fn format_temperature(celsius: f64, is_metric: bool) -> String {
    format!("{:.1}{}", to_display_unit(celsius, is_metric), DEGREE)
}

/// Clock layout for each render mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeFormat {
    /// `HH:MM:SS`
    Interactive,
    /// `HH:MM`
    Ambient,
}

impl TimeFormat {
    fn pattern(self) -> &'static str {
        match self {
            TimeFormat::Interactive => "%H:%M:%S",
            TimeFormat::Ambient => "%H:%M",
        }
    }
}

pub fn format_time(now: NaiveDateTime, format: TimeFormat) -> String {
    now.format(format.pattern()).to_string()
}

/// Upper-case date line, e.g. `SUN,OCT 18 2026`.
pub fn format_date(now: NaiveDateTime) -> String {
    now.format("%a,%b %-d %Y").to_string().to_uppercase()
}
