use thiserror::Error;

use crate::model::FetchTarget;

/// Validation failures for domain values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("latitude {0} is outside -90..=90")]
    InvalidLatitude(f64),

    #[error("longitude {0} is outside -180..=180")]
    InvalidLongitude(f64),

    #[error("place name must not be empty")]
    EmptyPlace,

    #[error("Unknown measurement unit '{0}'. Supported units: metric, imperial.")]
    UnknownUnit(String),
}

/// Failures a session can end a cycle with. None of them is fatal: the
/// session accepts a new trigger after any of these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("Location unavailable: {0}")]
    LocationUnavailable(String),

    #[error("Current conditions for {target} could not be fetched: {reason}")]
    CurrentConditionsFetchFailed { target: FetchTarget, reason: String },

    #[error("Forecast for {target} could not be fetched: {reason}")]
    ForecastFetchFailed { target: FetchTarget, reason: String },

    #[error("Search text must not be empty")]
    InvalidQuery,
}

impl SessionError {
    /// Short message for the rendering layer.
    pub fn user_message(&self) -> &'static str {
        match self {
            SessionError::LocationUnavailable(_) => {
                "Your location is unavailable. Search for a city instead."
            }
            SessionError::CurrentConditionsFetchFailed { target, .. } if target.is_place() => {
                "Error fetching city data"
            }
            SessionError::CurrentConditionsFetchFailed { .. } => "Error fetching weather data",
            SessionError::ForecastFetchFailed { .. } => "Error fetching weather forecast",
            SessionError::InvalidQuery => "Enter a city name to search",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Coordinates, PlaceQuery};

    #[test]
    fn user_message_distinguishes_city_searches() {
        let by_city = SessionError::CurrentConditionsFetchFailed {
            target: FetchTarget::Place(PlaceQuery::new("Nowhere").expect("non-empty")),
            reason: "404".into(),
        };
        assert_eq!(by_city.user_message(), "Error fetching city data");

        let by_position = SessionError::CurrentConditionsFetchFailed {
            target: FetchTarget::Coordinates(Coordinates::new(1.0, 2.0).expect("valid")),
            reason: "timeout".into(),
        };
        assert_eq!(by_position.user_message(), "Error fetching weather data");
    }

    #[test]
    fn display_carries_the_reason() {
        let err = SessionError::ForecastFetchFailed {
            target: FetchTarget::Place(PlaceQuery::new("Rome").expect("non-empty")),
            reason: "status 500".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Rome"));
        assert!(msg.contains("status 500"));
        assert_eq!(err.user_message(), "Error fetching weather forecast");
    }
}
