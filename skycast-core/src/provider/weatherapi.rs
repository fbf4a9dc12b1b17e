use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;

use crate::{
    config::ProviderSettings,
    error::ProviderError,
    model::WeatherRecord,
    provider::{ProviderId, credentials, get_json},
    race::Deadline,
};

use super::WeatherProvider;

/// WeatherAPI.com current-conditions client. Reports Celsius, used unrounded.
#[derive(Debug, Clone)]
pub struct WeatherApiProvider {
    settings: ProviderSettings,
    http: Client,
}

impl WeatherApiProvider {
    pub fn new(settings: ProviderSettings, http: Client) -> Self {
        Self { settings, http }
    }
}

#[derive(Debug, Deserialize)]
struct WaLocation {
    name: String,
}

#[derive(Debug, Deserialize)]
struct WaCondition {
    text: String,
}

#[derive(Debug, Deserialize)]
struct WaCurrent {
    temp_c: f64,
    humidity: u8,
    condition: WaCondition,
}

#[derive(Debug, Deserialize)]
struct WaResponse {
    location: WaLocation,
    current: WaCurrent,
}

impl From<WaResponse> for WeatherRecord {
    fn from(parsed: WaResponse) -> Self {
        WeatherRecord {
            city: parsed.location.name,
            temperature_celsius: parsed.current.temp_c,
            humidity_percent: parsed.current.humidity,
            condition: parsed.current.condition.text,
            source: ProviderId::WeatherApi,
            cached: false,
            observed_at: Utc::now(),
        }
    }
}

#[async_trait]
impl WeatherProvider for WeatherApiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::WeatherApi
    }

    async fn fetch(&self, city: &str, deadline: Deadline) -> Result<WeatherRecord, ProviderError> {
        let (base_url, api_key) = credentials(self.id(), &self.settings)?;
        let url = format!("{base_url}/current.json");

        let parsed: WaResponse =
            get_json(&self.http, self.id(), &url, &[("q", city), ("key", api_key)], deadline)
                .await?;

        Ok(parsed.into())
    }
}
