//! Configuration management for flighttrack.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.
//!
//! The provider credential itself is never part of the configuration, only
//! the *name* of the environment variable holding it. The proxy reads that
//! variable on every request, so a missing key fails lookups, not startup.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::flight::{DEFAULT_FLIGHT_CODE, MIN_FLIGHT_CODE_LEN};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default configuration directory name.
const CONFIG_DIR_NAME: &str = "flighttrack";

/// Prefix for environment variable overrides.
const ENV_PREFIX: &str = "FLIGHTTRACK_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `FLIGHTTRACK_`, sections split on `__`)
/// 2. TOML config file at `~/.config/flighttrack/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Proxy server configuration.
    pub server: ServerConfig,
    /// Upstream flight-data provider configuration.
    pub provider: ProviderConfig,
    /// Polling client configuration.
    pub client: ClientConfig,
}

/// Proxy server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the proxy endpoint listens on.
    pub bind: String,
}

/// Upstream provider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Base URL of the provider's REST API (without the `/flights` path).
    pub base_url: String,
    /// Name of the environment variable holding the access key.
    pub access_key_env: String,
    /// Outbound request timeout in seconds.
    pub timeout_secs: u64,
    /// `User-Agent` sent with every outbound request.
    pub user_agent: String,
}

/// Polling client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the proxy endpoint.
    pub proxy_url: String,
    /// Flight code to track.
    pub flight: String,
    /// Optional flight date to request (`YYYY-MM-DD`).
    pub date: Option<NaiveDate>,
    /// Interval between automatic refreshes in seconds.
    pub refresh_interval_secs: u64,
    /// Client-side abort budget per request in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://api.aviationstack.com/v1".to_string(),
            access_key_env: "AVIATIONSTACK_API_KEY".to_string(),
            timeout_secs: 10,
            user_agent: concat!("flighttrack/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            proxy_url: "http://127.0.0.1:3000".to_string(),
            flight: DEFAULT_FLIGHT_CODE.to_string(),
            date: None,
            refresh_interval_secs: 5 * 60,
            request_timeout_secs: 15,
        }
    }
}

impl Config {
    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
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
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        self.bind_addr()?;

        for (name, url) in [
            ("provider.base_url", &self.provider.base_url),
            ("client.proxy_url", &self.client.proxy_url),
        ] {
            if let Err(e) = reqwest::Url::parse(url) {
                return Err(Error::config_validation(format!(
                    "{name} is not a valid URL ({url}): {e}"
                )));
            }
        }

        if self.provider.access_key_env.trim().is_empty() {
            return Err(Error::config_validation(
                "provider.access_key_env must name an environment variable",
            ));
        }

        for (name, value) in [
            ("provider.timeout_secs", self.provider.timeout_secs),
            ("client.refresh_interval_secs", self.client.refresh_interval_secs),
            ("client.request_timeout_secs", self.client.request_timeout_secs),
        ] {
            if value == 0 {
                return Err(Error::config_validation(format!("{name} must be greater than 0")));
            }
        }

        if self.client.flight.chars().count() < MIN_FLIGHT_CODE_LEN {
            return Err(Error::config_validation(format!(
                "client.flight must be at least {MIN_FLIGHT_CODE_LEN} characters, got '{}'",
                self.client.flight
            )));
        }

        Ok(())
    }

    /// Parse the server bind address.
    ///
    /// # Errors
    ///
    /// Returns an error if `server.bind` is not a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.server.bind.parse().map_err(|e| {
            Error::config_validation(format!(
                "server.bind is not a socket address ({}): {e}",
                self.server.bind
            ))
        })
    }

    /// Get the outbound provider timeout as a Duration.
    #[must_use]
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider.timeout_secs)
    }

    /// Get the polling interval as a Duration.
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.client.refresh_interval_secs)
    }

    /// Get the client-side request budget as a Duration.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.client.request_timeout_secs)
    }
}
