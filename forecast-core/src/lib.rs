//! Core library for the `forecast` weather widget.
//!
//! This crate defines:
//! - Domain models (coordinates, units, conditions, forecast samples)
//! - Location resolution from a device sensor or a place name
//! - The OpenWeather provider behind the `WeatherProvider` trait
//! - Reduction of the 3-hourly forecast to one entry per day
//! - `WeatherSession`, which runs fetch cycles and publishes the view state
//!
//! It is used by `forecast-cli`, but any rendering layer can drive a session.

pub mod config;
pub mod error;
pub mod location;
pub mod model;
pub mod normalize;
pub mod provider;
pub mod session;

pub use config::Config;
pub use error::{ModelError, SessionError};
pub use location::{LocationResolver, LocationSensor, StaticSensor};
pub use model::{
    Condition, Coordinates, CurrentConditions, FetchTarget, ForecastSample, MeasurementUnit,
    PlaceQuery,
};
pub use normalize::{DailyEntry, DailyForecast, ForecastNormalizer};
pub use provider::{WeatherProvider, provider_from_config};
pub use session::{Snapshot, ViewState, WeatherReport, WeatherSession};
