//! Location resolution: device position or a typed place name.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};
use tracing::debug;

use crate::{
    error::SessionError,
    model::{Coordinates, PlaceQuery},
};

/// One-shot source of the device's position.
#[async_trait]
pub trait LocationSensor: Send + Sync + Debug {
    async fn current_position(&self) -> Result<Coordinates>;
}

/// Sensor with a fixed reading, or none at all.
#[derive(Debug, Clone, Default)]
pub struct StaticSensor {
    reading: Option<Coordinates>,
}

impl StaticSensor {
    pub fn new(reading: Option<Coordinates>) -> Self {
        Self { reading }
    }

    pub fn unavailable() -> Self {
        Self { reading: None }
    }
}

#[async_trait]
impl LocationSensor for StaticSensor {
    async fn current_position(&self) -> Result<Coordinates> {
        self.reading.ok_or_else(|| {
            anyhow!(
                "No device location configured.\n\
                 Hint: pass --lat/--lon, set FORECAST_LAT/FORECAST_LON, or run `forecast configure`."
            )
        })
    }
}

#[derive(Debug, Clone)]
pub struct LocationResolver {
    sensor: Arc<dyn LocationSensor>,
}

impl LocationResolver {
    pub fn new(sensor: Arc<dyn LocationSensor>) -> Self {
        Self { sensor }
    }

    /// Waits for the sensor without a timeout; callers add one if needed.
    pub async fn resolve_from_device(&self) -> Result<Coordinates, SessionError> {
        match self.sensor.current_position().await {
            Ok(coords) => {
                debug!("Device location resolved to ({coords})");
                Ok(coords)
            }
            Err(err) => {
                debug!("Device location unavailable: {err:#}");
                Err(SessionError::LocationUnavailable(format!("{err:#}")))
            }
        }
    }

    /// Validation only; the provider turns the name into a location.
    pub fn resolve_from_place_query(text: &str) -> Result<PlaceQuery, SessionError> {
        PlaceQuery::new(text).map_err(|_| SessionError::InvalidQuery)
    }
}
