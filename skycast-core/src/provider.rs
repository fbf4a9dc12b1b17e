use crate::{
    Config, WeatherRecord,
    config::ProviderSettings,
    error::{ConfigError, ProviderError},
    provider::{openweather::OpenWeatherProvider, weatherapi::WeatherApiProvider},
    race::Deadline,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::{convert::TryFrom, fmt::Debug, sync::Arc};
use tracing::trace;

pub mod openweather;
pub mod weatherapi;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    OpenWeather,
    WeatherApi,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenWeather => "openweather",
            ProviderId::WeatherApi => "weatherapi",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::OpenWeather, ProviderId::WeatherApi]
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = ConfigError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "openweather" => Ok(ProviderId::OpenWeather),
            "weatherapi" => Ok(ProviderId::WeatherApi),
            _ => Err(ConfigError::UnknownProvider(value.to_owned())),
        }
    }
}

/// One upstream weather source.
///
/// Implementations issue a single request per call and must stop waiting once
/// `deadline` has passed.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    fn id(&self) -> ProviderId;

    async fn fetch(&self, city: &str, deadline: Deadline) -> Result<WeatherRecord, ProviderError>;
}

/// Build every known provider from config.
///
/// Providers with missing credentials are still registered; their fetches fail
/// with [`ProviderError::Configuration`] so the other providers can still win.
pub fn providers_from_config(config: &Config, http: &Client) -> Vec<Arc<dyn WeatherProvider>> {
    ProviderId::all()
        .iter()
        .map(|&id| provider_from_settings(id, config.provider_settings(id), http.clone()))
        .collect()
}

pub fn provider_from_settings(
    id: ProviderId,
    settings: ProviderSettings,
    http: Client,
) -> Arc<dyn WeatherProvider> {
    match id {
        ProviderId::OpenWeather => Arc::new(OpenWeatherProvider::new(settings, http)),
        ProviderId::WeatherApi => Arc::new(WeatherApiProvider::new(settings, http)),
    }
}

/// Resolve `(base_url, api_key)` or report which one is missing.
pub(crate) fn credentials(
    provider: ProviderId,
    settings: &ProviderSettings,
) -> Result<(&str, &str), ProviderError> {
    let base_url = settings
        .base_url
        .as_deref()
        .ok_or(ProviderError::Configuration { provider, setting: "base URL" })?;
    let api_key = settings
        .api_key
        .as_deref()
        .ok_or(ProviderError::Configuration { provider, setting: "API key" })?;

    Ok((base_url.trim_end_matches('/'), api_key))
}

/// Single GET returning a decoded JSON body, bounded by `deadline`.
pub(crate) async fn get_json<T: DeserializeOwned>(
    http: &Client,
    provider: ProviderId,
    url: &str,
    query: &[(&str, &str)],
    deadline: Deadline,
) -> Result<T, ProviderError> {
    trace!(%provider, url, "sending provider request");

    let res = http
        .get(url)
        .query(query)
        .timeout(deadline.remaining())
        .send()
        .await
        .map_err(|source| ProviderError::Transport { provider, source })?;

    let status = res.status();
    let body = res
        .text()
        .await
        .map_err(|source| ProviderError::Transport { provider, source })?;

    if !status.is_success() {
        return Err(ProviderError::Status {
            provider,
            status: status.as_u16(),
            body: truncate_body(&body),
        });
    }

    serde_json::from_str(&body).map_err(|source| ProviderError::Decode { provider, source })
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
