use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::ModelError;

/// A validated latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinates")]
pub struct Coordinates {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct RawCoordinates {
    latitude: f64,
    longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ModelError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(ModelError::InvalidLatitude(latitude));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(ModelError::InvalidLongitude(longitude));
        }
        Ok(Self { latitude, longitude })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

impl TryFrom<RawCoordinates> for Coordinates {
    type Error = ModelError;

    fn try_from(raw: RawCoordinates) -> Result<Self, Self::Error> {
        Coordinates::new(raw.latitude, raw.longitude)
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// Free-text city name, resolved to a location by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlaceQuery(String);

impl PlaceQuery {
    pub fn new(text: &str) -> Result<Self, ModelError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ModelError::EmptyPlace);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlaceQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a fetch cycle asks the provider about: a position or a place name, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchTarget {
    Coordinates(Coordinates),
    Place(PlaceQuery),
}

impl FetchTarget {
    pub fn is_place(&self) -> bool {
        matches!(self, FetchTarget::Place(_))
    }
}

impl fmt::Display for FetchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchTarget::Coordinates(c) => fmt::Display::fmt(c, f),
            FetchTarget::Place(q) => fmt::Display::fmt(q, f),
        }
    }
}

/// Unit system requested from the provider. Conversion happens server-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementUnit {
    #[default]
    Metric,
    Imperial,
}

impl MeasurementUnit {
    /// Value of the provider's `units` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasurementUnit::Metric => "metric",
            MeasurementUnit::Imperial => "imperial",
        }
    }

    pub const fn all() -> &'static [MeasurementUnit] {
        &[MeasurementUnit::Metric, MeasurementUnit::Imperial]
    }

    pub fn temperature_symbol(&self) -> &'static str {
        match self {
            MeasurementUnit::Metric => "°C",
            MeasurementUnit::Imperial => "°F",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            MeasurementUnit::Metric => MeasurementUnit::Imperial,
            MeasurementUnit::Imperial => MeasurementUnit::Metric,
        }
    }
}

impl fmt::Display for MeasurementUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeasurementUnit {
    type Err = ModelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "metric" | "c" | "celsius" => Ok(MeasurementUnit::Metric),
            "imperial" | "f" | "fahrenheit" => Ok(MeasurementUnit::Imperial),
            _ => Err(ModelError::UnknownUnit(value.to_string())),
        }
    }
}

/// One weather-condition entry as reported by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub code: u32,
    pub icon: String,
    pub description: String,
}

impl Condition {
    pub fn icon_url(&self) -> String {
        format!("http://openweathermap.org/img/wn/{}@2x.png", self.icon)
    }

    /// Description with its first letter upper-cased ("light rain" -> "Light rain").
    pub fn headline(&self) -> String {
        let mut chars = self.description.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub location_name: String,
    pub temperature: f64,
    pub feels_like: f64,
    pub temp_max: f64,
    /// `None` when the provider did not report a minimum.
    pub temp_min: Option<f64>,
    pub condition: Condition,
    pub observed_at: DateTime<Utc>,
}

/// One raw sub-daily entry of the provider's forecast list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSample {
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub temp_max: f64,
    pub temp_min: Option<f64>,
    pub condition: Condition,
}
