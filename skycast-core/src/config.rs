use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, info};

use crate::{
    cache::{DEFAULT_TTL, memory::DEFAULT_CAPACITY},
    error::ConfigError,
    provider::ProviderId,
    race::DEFAULT_RACE_TIMEOUT,
};

/// Endpoint and credentials for a single provider.
///
/// Both fields are optional on disk; a provider missing either one is still
/// raced but always fails with a configuration error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub ttl_secs: u64,
    pub max_capacity: u64,
    /// Use Redis instead of the in-process store when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis_url: Option<String>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TTL.as_secs(),
            max_capacity: DEFAULT_CAPACITY,
            redis_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceSettings {
    pub timeout_secs: u64,
}

impl Default for RaceSettings {
    fn default() -> Self {
        Self { timeout_secs: DEFAULT_RACE_TIMEOUT.as_secs() }
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Example TOML:
    /// [providers.openweather]
    /// base_url = "https://api.openweathermap.org/data/2.5"
    /// api_key = "..."
    #[serde(default)]
    pub providers: HashMap<String, ProviderSettings>,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub race: RaceSettings,
}

/// Environment variable names for each provider's base URL and API key.
fn provider_env(id: ProviderId) -> (&'static str, &'static str) {
    match id {
        ProviderId::OpenWeather => ("OPENWEATHER_API", "OPENWEATHERMAP_KEY"),
        ProviderId::WeatherApi => ("WEATHER_API", "WEATHERAPI_KEY"),
    }
}

const REDIS_ENV: &str = "REDIS_CLIENT";

impl Config {
    /// Settings for `id`, empty if the provider was never configured.
    pub fn provider_settings(&self, id: ProviderId) -> ProviderSettings {
        self.providers.get(id.as_str()).cloned().unwrap_or_default()
    }

    /// Set/replace base URL and API key for a provider.
    pub fn upsert_provider(&mut self, id: ProviderId, settings: ProviderSettings) {
        self.providers.insert(id.as_str().to_string(), settings);
    }

    pub fn is_provider_configured(&self, id: ProviderId) -> bool {
        let settings = self.provider_settings(id);
        settings.base_url.is_some() && settings.api_key.is_some()
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    pub fn race_timeout(&self) -> Duration {
        Duration::from_secs(self.race.timeout_secs)
    }

    /// Load config from `path`, or return an empty default if it doesn't
    /// exist yet.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            // First run: no config file, return empty.
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_owned(), source })?;

        toml::from_str(&contents)
            .map_err(|source| ConfigError::Parse { path: path.to_owned(), source })
    }

    /// Save config, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| ConfigError::Write { path: parent.to_owned(), source })?;
        }

        let toml = toml::to_string_pretty(self)?;

        fs::write(path, toml).map_err(|source| ConfigError::Write { path: path.to_owned(), source })
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf, ConfigError> {
        let dirs = ProjectDirs::from("dev", "skycast", "skycast").ok_or(ConfigError::NoConfigDir)?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Load `.env` from the working directory into the process environment.
    ///
    /// A missing file is not an error.
    pub fn load_env_file() -> bool {
        match dotenvy::dotenv() {
            Ok(path) => {
                info!(path = %path.display(), "loaded .env file");
                true
            }
            Err(err) => {
                debug!(error = %err, "no .env file loaded");
                false
            }
        }
    }

    /// Override file values with the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Override file values from `lookup`. Empty values count as unset.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        for &id in ProviderId::all() {
            let (url_var, key_var) = provider_env(id);
            let mut settings = self.provider_settings(id);
            let mut touched = false;

            if let Some(url) = lookup(url_var) {
                settings.base_url = Some(url);
                touched = true;
            }
            if let Some(key) = lookup(key_var) {
                settings.api_key = Some(key);
                touched = true;
            }
            if touched {
                self.upsert_provider(id, settings);
            }
        }

        if let Some(addr) = lookup(REDIS_ENV) {
            self.cache.redis_url = Some(redis_url(&addr));
        }

        self
    }
}

/// Accept either a full `redis://` URL or a bare `host:port`.
fn redis_url(addr: &str) -> String {
    if addr.starts_with("redis://") || addr.starts_with("rediss://") {
        addr.to_owned()
    } else {
        format!("redis://{addr}/")
    }
}
