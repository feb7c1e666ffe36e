use serde::{Deserialize, Serialize};

/// Icon categories the watch face can draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IconKind {
    Storm,
    LightRain,
    Rain,
    Snow,
    Fog,
    Clear,
    LightClouds,
    Cloudy,
    #[default]
    Unknown,
}

impl IconKind {
    /// Resource name of the icon, `None` for [`IconKind::Unknown`] (nothing is drawn).
    pub fn resource_name(self) -> Option<&'static str> {
        match self {
            Self::Storm => Some("ic_storm"),
            Self::LightRain => Some("ic_light_rain"),
            Self::Rain => Some("ic_rain"),
            Self::Snow => Some("ic_snow"),
            Self::Fog => Some("ic_fog"),
            Self::Clear => Some("ic_clear"),
            Self::LightClouds => Some("ic_light_clouds"),
            Self::Cloudy => Some("ic_cloudy"),
            Self::Unknown => None,
        }
    }

    pub fn is_known(self) -> bool {
        self != Self::Unknown
    }
}

/// Map an OpenWeatherMap condition code to an icon category.
///
/// Total: codes outside the known groups resolve to [`IconKind::Unknown`].
/// See: https://openweathermap.org/weather-conditions
pub fn icon_for_condition(code: i32) -> IconKind {
    match code {
        200..=299 => IconKind::Storm,
        300..=321 => IconKind::LightRain,
        500..=504 => IconKind::Rain,
        511 => IconKind::Snow, // Freezing rain
        520..=531 => IconKind::Rain,
        600..=622 => IconKind::Snow,
        701..=761 => IconKind::Fog,
        781 => IconKind::Storm, // Tornado
        800 => IconKind::Clear,
        801 => IconKind::LightClouds,
        802..=804 => IconKind::Cloudy,
        _ => IconKind::Unknown,
    }
}
