use std::error::Error;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::district::NUMBER_PLACEHOLDER;

pub const DEFAULT_ROLLOVER_INTERVAL_DAYS: i64 = 30;
pub const DEFAULT_DISTRICT_COUNT: usize = 3;
pub const DEFAULT_DISTRICT_NAME_TEMPLATE: &str = "Distrito {number}";
pub const DEFAULT_FAMILY_NAME_PREFIX: &str = "Familia ";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumConfig {
    #[serde(default)]
    pub ministering: MinisteringConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinisteringConfig {
    pub rollover_interval_days: i64,
    pub default_district_count: usize,
    pub district_name_template: String,
    pub family_name_prefix: String,
}

impl Default for MinisteringConfig {
    fn default() -> Self {
        Self {
            rollover_interval_days: DEFAULT_ROLLOVER_INTERVAL_DAYS,
            default_district_count: DEFAULT_DISTRICT_COUNT,
            district_name_template: DEFAULT_DISTRICT_NAME_TEMPLATE.to_string(),
            family_name_prefix: DEFAULT_FAMILY_NAME_PREFIX.to_string(),
        }
    }
}

impl QuorumConfig {
    /// Reads the TOML file at `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_toml(&raw),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: QuorumConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let ministering = &self.ministering;
        if ministering.rollover_interval_days <= 0 {
            return Err(ConfigError::Invalid(
                "ministering.rollover_interval_days must be positive".to_string(),
            ));
        }
        if ministering.default_district_count == 0 {
            return Err(ConfigError::Invalid(
                "ministering.default_district_count must be at least 1".to_string(),
            ));
        }
        if !ministering
            .district_name_template
            .contains(NUMBER_PLACEHOLDER)
        {
            return Err(ConfigError::Invalid(format!(
                "ministering.district_name_template must contain '{}'",
                NUMBER_PLACEHOLDER
            )));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Toml(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "unable to read config: {}", err),
            ConfigError::Toml(err) => write!(f, "invalid config TOML: {}", err),
            ConfigError::Invalid(message) => write!(f, "invalid config: {}", message),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::Io(err) => Some(err),
            ConfigError::Toml(err) => Some(err),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        ConfigError::Toml(value)
    }
}
