use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// All errors joined into one line
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory
    pub config_dir: PathBuf,

    /// Handheld sync agent settings
    #[serde(default)]
    pub handheld: HandheldConfig,

    /// Watch face settings
    #[serde(default)]
    pub wear: WearConfig,

    /// Loopback transport settings
    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Display unit preference sent along with every snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

impl UnitSystem {
    pub fn is_metric(self) -> bool {
        matches!(self, UnitSystem::Metric)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandheldConfig {
    /// Location setting the forecast rows are keyed by (e.g. a postal code)
    pub location: String,

    pub units: UnitSystem,

    /// SQLite forecast database. Relative paths resolve against `config_dir`.
    pub forecast_db: PathBuf,
}

impl Default for HandheldConfig {
    fn default() -> Self {
        Self {
            location: "94043".to_string(),
            units: UnitSystem::Metric,
            forecast_db: PathBuf::from("forecast.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WearConfig {
    /// Assume a low-bit ambient display until the host reports otherwise
    #[serde(default)]
    pub low_bit_ambient: bool,

    /// Height in pixels icons are scaled to (matches the date text size)
    #[serde(default = "default_icon_height")]
    pub icon_height: u32,
}

fn default_icon_height() -> u32 {
    20
}

impl Default for WearConfig {
    fn default() -> Self {
        Self {
            low_bit_ambient: false,
            icon_height: default_icon_height(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// How long the loopback transport holds non-urgent records before delivery
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
}

fn default_batch_delay_ms() -> u64 {
    30_000
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            batch_delay_ms: default_batch_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sunlink");

        Self {
            config_dir,
            handheld: HandheldConfig::default(),
            wear: WearConfig::default(),
            transport: TransportConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, writing defaults there if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let mut config = Self::default();
            if let Some(parent) = path.parent() {
                config.config_dir = parent.to_path_buf();
            }
            config.save_to(path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Warnings are logged; errors fail the load.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.handheld.location.trim().is_empty() {
            result.add_error("handheld.location", "Location must not be empty");
        }

        if self.handheld.forecast_db.as_os_str().is_empty() {
            result.add_error("handheld.forecast_db", "Forecast database path is empty");
        }

        if self.wear.icon_height == 0 {
            result.add_error("wear.icon_height", "Icon height must be greater than 0");
        } else if self.wear.icon_height > 512 {
            result.add_warning("wear.icon_height", "Icon height is unusually large (>512)");
        }

        if self.transport.batch_delay_ms == 0 {
            result.add_warning(
                "transport.batch_delay_ms",
                "Non-urgent records will be delivered immediately",
            );
        } else if self.transport.batch_delay_ms > 15 * 60 * 1000 {
            result.add_warning(
                "transport.batch_delay_ms",
                "Non-urgent batching window is longer than 15 minutes",
            );
        }

        if tracing_subscriber::EnvFilter::try_new(&self.logging.filter).is_err() {
            result.add_error(
                "logging.filter",
                format!("Invalid log filter: {}", self.logging.filter),
            );
        }

        result
    }

    /// Forecast database path with relative paths resolved against `config_dir`
    pub fn forecast_db_path(&self) -> PathBuf {
        if self.handheld.forecast_db.is_absolute() {
            self.handheld.forecast_db.clone()
        } else {
            self.config_dir.join(&self.handheld.forecast_db)
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("sunlink");

        Ok(config_dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        let result = config.validate();
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
    }

    #[test]
    fn test_empty_location_is_error() {
        let mut config = Config::default();
        config.handheld.location = "   ".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "handheld.location"));
    }

    #[test]
    fn test_zero_icon_height_is_error() {
        let mut config = Config::default();
        config.wear.icon_height = 0;
        assert!(!config.validate().is_valid());
    }

    #[test]
    fn test_zero_batch_delay_is_warning() {
        let mut config = Config::default();
        config.transport.batch_delay_ms = 0;
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "transport.batch_delay_ms"));
    }

    #[test]
    fn test_bad_log_filter_is_error() {
        let mut config = Config::default();
        config.logging.filter = "sunlink=notalevel".to_string();
        assert!(!config.validate().is_valid());
    }

    #[test]
    fn test_load_from_creates_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.config_dir, dir.path());
        assert_eq!(config.handheld.units, UnitSystem::Metric);
    }

    #[test]
    fn test_load_from_reads_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
config_dir = "/tmp/sunlink"

[handheld]
location = "10115"
units = "imperial"
forecast_db = "/var/lib/sunlink/forecast.db"
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.handheld.location, "10115");
        assert!(!config.handheld.units.is_metric());
        assert_eq!(config.wear.icon_height, 20);
        assert_eq!(
            config.forecast_db_path(),
            PathBuf::from("/var/lib/sunlink/forecast.db")
        );
    }

    #[test]
    fn test_relative_db_path_resolves_against_config_dir() {
        let mut config = Config::default();
        config.config_dir = PathBuf::from("/etc/sunlink");
        assert_eq!(
            config.forecast_db_path(),
            PathBuf::from("/etc/sunlink/forecast.db")
        );
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }
}
