use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};
use tracing::debug;

use crate::model::{Condition, CurrentConditions, FetchTarget, ForecastSample, MeasurementUnit};

use super::WeatherProvider;

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: Option<String>,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            http: Client::new(),
        }
    }

    /// Point the client at another host, e.g. a mock server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn query(&self, target: &FetchTarget, unit: MeasurementUnit) -> Result<Vec<(&'static str, String)>> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            anyhow!(
                "No API key configured for OpenWeather.\n\
                 Hint: set OPENWEATHER_API_KEY or run `forecast configure`."
            )
        })?;

        let mut query = match target {
            FetchTarget::Coordinates(c) => vec![
                ("lat", c.latitude().to_string()),
                ("lon", c.longitude().to_string()),
            ],
            FetchTarget::Place(q) => vec![("q", q.as_str().to_string())],
        };
        query.push(("units", unit.as_str().to_string()));
        query.push(("appid", api_key.to_string()));
        Ok(query)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        label: &str,
        target: &FetchTarget,
        unit: MeasurementUnit,
    ) -> Result<T> {
        let query = self.query(target, unit)?;
        let url = format!("{}/data/2.5/{endpoint}", self.base_url);
        debug!("Requesting OpenWeather {label} for {target} ({unit})");

        let res = self
            .http
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("Failed to send request to OpenWeather ({label})"))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("Failed to read OpenWeather {label} response body"))?;

        if !status.is_success() {
            return Err(anyhow!(
                "OpenWeather {label} request failed with status {}: {}",
                status,
                truncate_body(&body),
            ));
        }

        serde_json::from_str(&body).with_context(|| format!("Failed to parse OpenWeather {label} JSON"))
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    #[serde(default)]
    feels_like: Option<f64>,
    temp_max: f64,
    #[serde(default)]
    temp_min: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    id: u32,
    icon: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    dt: i64,
    main: OwMain,
    weather: Vec<OwWeather>,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwMain,
    weather: Vec<OwWeather>,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    list: Vec<OwForecastEntry>,
}

fn first_condition(weather: Vec<OwWeather>) -> Result<Condition> {
    weather
        .into_iter()
        .next()
        .map(|w| Condition {
            code: w.id,
            icon: w.icon,
            description: w.description,
        })
        .ok_or_else(|| anyhow!("OpenWeather response contained no weather condition"))
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn current_conditions(
        &self,
        target: &FetchTarget,
        unit: MeasurementUnit,
    ) -> Result<CurrentConditions> {
        let parsed: OwCurrentResponse = self.get_json("weather", "current weather", target, unit).await?;

        Ok(CurrentConditions {
            location_name: parsed.name,
            temperature: parsed.main.temp,
            feels_like: parsed.main.feels_like.unwrap_or(parsed.main.temp),
            temp_max: parsed.main.temp_max,
            temp_min: parsed.main.temp_min,
            condition: first_condition(parsed.weather)?,
            observed_at: unix_to_utc(parsed.dt).unwrap_or_else(Utc::now),
        })
    }

    async fn forecast(&self, target: &FetchTarget, unit: MeasurementUnit) -> Result<Vec<ForecastSample>> {
        let parsed: OwForecastResponse = self.get_json("forecast", "5-day forecast", target, unit).await?;

        parsed
            .list
            .into_iter()
            .map(|entry| -> Result<ForecastSample> {
                let timestamp = unix_to_utc(entry.dt)
                    .ok_or_else(|| anyhow!("OpenWeather forecast entry has invalid timestamp {}", entry.dt))?;
                Ok(ForecastSample {
                    timestamp,
                    temperature: entry.main.temp,
                    temp_max: entry.main.temp_max,
                    temp_min: entry.main.temp_min,
                    condition: first_condition(entry.weather)?,
                })
            })
            .collect()
    }
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
