use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand};
use inquire::{Password, Text};
use skycast_core::{Config, ProviderId, ProviderSettings, WeatherRecord, WeatherService};
use tokio::task::JoinSet;
use tracing::info;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "skycast", version, about = "Current weather, raced across providers")]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure base URL and API key for a specific provider.
    Configure {
        /// Provider short name, e.g. "openweather" or "weatherapi".
        provider: String,
    },

    /// Show current weather for one or more cities.
    Show {
        /// City names, looked up concurrently.
        #[arg(required = true)]
        cities: Vec<String>,

        /// Look every city up this many times (later rounds hit the cache).
        #[arg(long, default_value_t = 1)]
        repeat: u32,
    },

    /// Print the config file location.
    ConfigPath,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { provider } => configure(self.config, &provider),
            Command::Show { cities, repeat } => show(self.config, cities, repeat).await,
            Command::ConfigPath => {
                println!("{}", config_path(self.config)?.display());
                Ok(())
            }
        }
    }
}

fn config_path(explicit: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => Config::config_file_path().context("Failed to locate config file"),
    }
}

fn load_config(explicit: Option<PathBuf>) -> anyhow::Result<Config> {
    let path = config_path(explicit)?;
    Config::load_from(&path).with_context(|| format!("Failed to load {}", path.display()))
}

/// Public endpoints offered as prompt defaults.
fn suggested_base_url(id: ProviderId) -> &'static str {
    match id {
        ProviderId::OpenWeather => "https://api.openweathermap.org/data/2.5",
        ProviderId::WeatherApi => "http://api.weatherapi.com/v1",
    }
}

fn configure(explicit: Option<PathBuf>, provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;
    let path = config_path(explicit)?;
    let mut config = Config::load_from(&path)?;
    let current = config.provider_settings(id);

    let base_url = Text::new(&format!("{id} base URL:"))
        .with_default(current.base_url.as_deref().unwrap_or(suggested_base_url(id)))
        .prompt()
        .context("Failed to read base URL")?;
    let api_key = Password::new(&format!("{id} API key:"))
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    config.upsert_provider(
        id,
        ProviderSettings {
            base_url: Some(base_url.trim().to_owned()),
            api_key: Some(api_key.trim().to_owned()),
        },
    );
    config.save_to(&path)?;

    println!("Saved {id} settings to {}", path.display());
    Ok(())
}

async fn show(explicit: Option<PathBuf>, cities: Vec<String>, repeat: u32) -> anyhow::Result<()> {
    Config::load_env_file();
    let config = load_config(explicit)?.with_env_overrides();

    for id in ProviderId::all() {
        if !config.is_provider_configured(*id) {
            info!(provider = %id, "provider is not configured; run `skycast configure {id}`");
        }
    }

    let service = Arc::new(WeatherService::from_config(&config).context("Failed to set up cache")?);

    for _ in 0..repeat {
        let mut lookups = JoinSet::new();
        for city in cities.iter().cloned() {
            let service = Arc::clone(&service);
            lookups.spawn(async move {
                let result = service.fetch_weather(&city).await;
                (city, result)
            });
        }

        while let Some(joined) = lookups.join_next().await {
            let (city, result) = joined.context("Lookup task failed")?;
            match result {
                Ok(record) => println!("{}", format_record(&record)),
                Err(err) => eprintln!("{city}: {:#}", anyhow::Error::from(err)),
            }
        }
    }

    let stats = service.stats();
    println!(
        "upstream lookups: {}, cache hits: {}",
        stats.api_usage_count, stats.cache_hit_count
    );
    Ok(())
}

fn format_record(record: &WeatherRecord) -> String {
    format!(
        "{}: {}°C, humidity {}%, {} (source: {}{}, observed {})",
        record.city,
        record.temperature_celsius,
        record.humidity_percent,
        record.condition,
        record.source,
        if record.cached { ", cached" } else { "" },
        record.observed_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
    )
}
