use crate::{
    Config,
    model::{CurrentConditions, FetchTarget, ForecastSample, MeasurementUnit},
    provider::openweather::OpenWeatherProvider,
};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

pub mod openweather;

/// Read-only weather source. Unit conversion is the provider's job.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn current_conditions(
        &self,
        target: &FetchTarget,
        unit: MeasurementUnit,
    ) -> anyhow::Result<CurrentConditions>;

    /// Raw sub-daily samples in provider order.
    async fn forecast(
        &self,
        target: &FetchTarget,
        unit: MeasurementUnit,
    ) -> anyhow::Result<Vec<ForecastSample>>;
}

/// Construct the provider from config.
///
/// A missing API key does not fail here: every request made through the
/// returned provider fails instead, so the session can report it.
pub fn provider_from_config(config: &Config) -> Arc<dyn WeatherProvider> {
    Arc::new(OpenWeatherProvider::new(config.api_key().map(str::to_owned)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PlaceQuery;

    #[tokio::test]
    async fn provider_from_config_without_key_fails_every_fetch() {
        let cfg = Config::default();
        let provider = provider_from_config(&cfg);
        let target = FetchTarget::Place(PlaceQuery::new("Paris").expect("non-empty"));

        let err = provider
            .current_conditions(&target, MeasurementUnit::Metric)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No API key configured"));

        let err = provider.forecast(&target, MeasurementUnit::Metric).await.unwrap_err();
        assert!(err.to_string().contains("No API key configured"));
    }
}
