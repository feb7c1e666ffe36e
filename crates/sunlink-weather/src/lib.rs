//! Weather payload shared by the handheld and the wearable.
//!
//! Defines the [`WeatherSnapshot`] exchanged over the channel, its record
//! layout, the condition-code → icon mapping, and display formatting.

pub mod condition;
pub mod format;
pub mod snapshot;

pub use condition::{icon_for_condition, IconKind};
pub use format::{format_date, format_temperature, format_time, to_display_unit, TimeFormat};
pub use snapshot::{
    ForecastRow, WeatherSnapshot, DESCRIPTION_KEY, IS_METRIC_KEY, LATEST_DATA_PATH, MAX_TEMP_KEY,
    MIN_TEMP_KEY, WEATHER_ID_KEY, WEATHER_PATH,
};
