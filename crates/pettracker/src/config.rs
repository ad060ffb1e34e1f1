//! Configuration management for pettracker.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "pettracker";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "tracker.db";

/// Environment variable prefix.
const ENV_PREFIX: &str = "PETTRACKER_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `PETTRACKER_`, sections split on `__`)
/// 2. TOML config file at `~/.config/pettracker/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Issue notification configuration.
    pub notify: NotifyConfig,
    /// Identity provider configuration.
    pub identity: IdentityConfig,
    /// Page bundle configuration.
    pub router: RouterConfig,
    /// Reverse geocoding configuration.
    pub geo: GeoConfig,
    /// Page timer configuration.
    pub timers: TimerConfig,
    /// Outbound request configuration.
    pub network: NetworkConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/pettracker/tracker.db`
    pub database_path: Option<PathBuf>,
}

/// Where issue notifications are delivered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Webhook endpoint accepting issue events as JSON.
    /// When unset, notifications are only logged.
    pub endpoint: Option<String>,
}

/// OAuth identity provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// OAuth client id. Login is unavailable until this is set.
    pub client_id: Option<String>,
    /// OAuth client secret.
    pub client_secret: Option<String>,
    /// Redirect URI registered with the provider.
    pub redirect_uri: String,
    /// Authorization endpoint.
    pub authorize_url: String,
    /// Token exchange endpoint.
    pub token_url: String,
    /// Identity endpoint.
    pub identity_url: String,
}

/// Page bundle source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Directory holding `pages/<name>/page.html` bundles.
    pub pages_dir: Option<PathBuf>,
    /// Base URL serving page bundles. Takes precedence over `pages_dir`.
    pub pages_base_url: Option<String>,
}

/// Reverse geocoding settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoConfig {
    /// Reverse geocoding endpoint taking `latitude` and `longitude` query parameters.
    pub geocoding_url: String,
}

/// Page timers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    /// Contact page auto-save interval in seconds.
    pub contact_autosave_secs: u64,
    /// Medical page auto-save interval in seconds.
    pub medical_autosave_secs: u64,
    /// Home and location page refresh interval in seconds.
    pub refresh_secs: u64,
}

/// Retry settings for the general-purpose fetch helper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Attempts before giving up.
    pub retry_attempts: u32,
    /// Delay before the first retry in milliseconds; doubles each retry.
    pub retry_base_delay_ms: u64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: "http://localhost/oauth/patreon".to_string(),
            authorize_url: "https://www.patreon.com/oauth2/authorize".to_string(),
            token_url: "https://www.patreon.com/api/oauth2/token".to_string(),
            identity_url: "https://www.patreon.com/api/oauth2/v2/identity".to_string(),
        }
    }
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            geocoding_url: "https://api.bigdatacloud.net/data/reverse-geocode-client".to_string(),
        }
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            contact_autosave_secs: 30,
            medical_autosave_secs: 60,
            refresh_secs: 30,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_base_delay_ms: 1000,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `PETTRACKER_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file).nested())
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        let intervals = [
            ("contact_autosave_secs", self.timers.contact_autosave_secs),
            ("medical_autosave_secs", self.timers.medical_autosave_secs),
            ("refresh_secs", self.timers.refresh_secs),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(Error::ConfigValidation {
                    message: format!("{name} must be greater than 0"),
                });
            }
        }

        if self.network.retry_attempts == 0 {
            return Err(Error::ConfigValidation {
                message: "retry_attempts must be greater than 0".to_string(),
            });
        }

        let mut urls = vec![
            ("identity.redirect_uri", self.identity.redirect_uri.as_str()),
            ("identity.authorize_url", self.identity.authorize_url.as_str()),
            ("identity.token_url", self.identity.token_url.as_str()),
            ("identity.identity_url", self.identity.identity_url.as_str()),
            ("geo.geocoding_url", self.geo.geocoding_url.as_str()),
        ];
        if let Some(endpoint) = &self.notify.endpoint {
            urls.push(("notify.endpoint", endpoint));
        }
        if let Some(base) = &self.router.pages_base_url {
            urls.push(("router.pages_base_url", base));
        }
        for (name, value) in urls {
            if url::Url::parse(value).is_err() {
                return Err(Error::ConfigValidation {
                    message: format!("invalid URL for {name}: {value}"),
                });
            }
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the contact auto-save interval as a Duration.
    #[must_use]
    pub fn contact_autosave(&self) -> Duration {
        Duration::from_secs(self.timers.contact_autosave_secs)
    }

    /// Get the medical auto-save interval as a Duration.
    #[must_use]
    pub fn medical_autosave(&self) -> Duration {
        Duration::from_secs(self.timers.medical_autosave_secs)
    }

    /// Get the page refresh interval as a Duration.
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.timers.refresh_secs)
    }

    /// Get the first retry delay as a Duration.
    #[must_use]
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.network.retry_base_delay_ms)
    }
}
