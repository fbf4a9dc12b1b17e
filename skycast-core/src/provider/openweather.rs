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

const KELVIN_OFFSET: f64 = 273.15;

/// OpenWeatherMap current-weather client. Reports Kelvin.
#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    settings: ProviderSettings,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(settings: ProviderSettings, http: Client) -> Self {
        Self { settings, http }
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
}

impl From<OwCurrentResponse> for WeatherRecord {
    fn from(parsed: OwCurrentResponse) -> Self {
        let condition = parsed
            .weather
            .into_iter()
            .next()
            .map(|w| w.description)
            .unwrap_or_else(|| "Unknown".to_string());

        WeatherRecord {
            city: parsed.name,
            temperature_celsius: (parsed.main.temp - KELVIN_OFFSET).round(),
            humidity_percent: parsed.main.humidity,
            condition,
            source: ProviderId::OpenWeather,
            cached: false,
            observed_at: Utc::now(),
        }
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenWeather
    }

    async fn fetch(&self, city: &str, deadline: Deadline) -> Result<WeatherRecord, ProviderError> {
        let (base_url, api_key) = credentials(self.id(), &self.settings)?;
        let url = format!("{base_url}/weather");

        let parsed: OwCurrentResponse = get_json(
            &self.http,
            self.id(),
            &url,
            &[("q", city), ("appid", api_key)],
            deadline,
        )
        .await?;

        Ok(parsed.into())
    }
}
