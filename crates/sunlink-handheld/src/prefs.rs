use parking_lot::RwLock;
use sunlink_core::{HandheldConfig, UnitSystem};

/// User preferences the agent consults on every publish.
pub trait Preferences: Send + Sync {
    fn preferred_location(&self) -> String;
    fn is_metric(&self) -> bool;
}

/// Preferences held in memory, seeded from `[handheld]` config.
///
/// Values can be changed at runtime; the next publish picks them up.
#[derive(Debug)]
pub struct StaticPreferences {
    location: RwLock<String>,
    units: RwLock<UnitSystem>,
}

impl StaticPreferences {
    pub fn new(location: impl Into<String>, units: UnitSystem) -> Self {
        Self {
            location: RwLock::new(location.into()),
            units: RwLock::new(units),
        }
    }

    pub fn set_location(&self, location: impl Into<String>) {
        *self.location.write() = location.into();
    }

    pub fn set_units(&self, units: UnitSystem) {
        *self.units.write() = units;
    }
}

impl From<&HandheldConfig> for StaticPreferences {
    fn from(config: &HandheldConfig) -> Self {
        Self::new(config.location.clone(), config.units)
    }
}

impl Preferences for StaticPreferences {
    fn preferred_location(&self) -> String {
        self.location.read().clone()
    }

    fn is_metric(&self) -> bool {
        self.units.read().is_metric()
    }
}
