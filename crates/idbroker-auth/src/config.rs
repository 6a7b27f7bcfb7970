//! Broker configuration.
//!
//! Configuration is read from TOML. Every section carries serde defaults so
//! a partial file only needs to override what differs.
//!
//! # Example (TOML)
//!
//! ```toml
//! [binding]
//! salt = "change-me"
//!
//! [registry]
//! municipality_requester = "login.bib.dk"
//! call_timeout = "5s"
//!
//! [registry.municipality_agencies]
//! "710100" = "Koebenhavns Kommune"
//! "715100" = "Ballerup Kommune"
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration of the broker engine.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Callback token binding.
    pub binding: BindingConfig,

    /// Registry linking and municipality derivation.
    pub registry: RegistryConfig,

    /// Paths used when building links for the login UI.
    pub routes: RoutesConfig,

    /// Logging defaults.
    pub logging: LoggingConfig,
}

/// Configuration of the callback token binder.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BindingConfig {
    /// Fixed salt mixed into every binding hash.
    pub salt: String,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            salt: "idbroker-binding".to_string(),
        }
    }
}

/// Configuration of the registry linker.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Municipality-enabled agencies, keyed by agency code.
    /// The value is the municipality name.
    pub municipality_agencies: BTreeMap<String, String>,

    /// Requester context sent to the municipality validation webservice.
    pub municipality_requester: String,

    /// Upper bound for a single registry or validator call.
    #[serde(with = "humantime_serde")]
    pub call_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            municipality_agencies: BTreeMap::new(),
            municipality_requester: String::new(),
            call_timeout: Duration::from_secs(10),
        }
    }
}

impl RegistryConfig {
    /// Returns `true` if the agency belongs to a municipality-operated library.
    #[must_use]
    pub fn is_municipality_agency(&self, agency_id: &str) -> bool {
        self.municipality_agencies.contains_key(agency_id)
    }

    /// Adds a municipality-enabled agency.
    #[must_use]
    pub fn with_municipality_agency(
        mut self,
        agency_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        self.municipality_agencies
            .insert(agency_id.into(), name.into());
        self
    }

    /// Sets the requester context for municipality validation.
    #[must_use]
    pub fn with_municipality_requester(mut self, requester: impl Into<String>) -> Self {
        self.municipality_requester = requester.into();
        self
    }

    /// Sets the per-call timeout.
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }
}

/// Path configuration for generated links.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutesConfig {
    /// Prefix of every route served by the login service.
    pub version_prefix: String,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            version_prefix: "/v0".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level filter, overridden by `RUST_LOG`.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// The configuration file could not be read.
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML.
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

impl BrokerConfig {
    /// Parses and validates a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed TOML and
    /// `ConfigError::InvalidValue` if validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file cannot be read, otherwise the
    /// errors of [`BrokerConfig::from_toml_str`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - The binding salt is empty
    /// - The registry call timeout is zero
    /// - A municipality agency code is not six digits
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.binding.salt.is_empty() {
            return Err(ConfigError::InvalidValue(
                "binding.salt cannot be empty".to_string(),
            ));
        }

        if self.registry.call_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "registry.call_timeout must be > 0".to_string(),
            ));
        }

        for agency in self.registry.municipality_agencies.keys() {
            if agency.len() != 6 || !agency.chars().all(|c| c.is_ascii_digit()) {
                return Err(ConfigError::InvalidValue(format!(
                    "Invalid municipality agency: '{}'. Must be six digits",
                    agency
                )));
            }
        }

        Ok(())
    }
}
