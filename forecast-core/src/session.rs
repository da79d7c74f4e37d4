//! Orchestration of location, provider calls and forecast reduction behind
//! one published view state.
//!
//! Every trigger (`start`, `search_city`, `set_unit`, `retry`) issues a new
//! cycle number. A cycle's result is published only if no newer cycle was
//! issued in the meantime, so late responses never overwrite newer state.

use chrono::{Local, TimeZone};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    error::SessionError,
    location::LocationResolver,
    model::{CurrentConditions, FetchTarget, MeasurementUnit},
    normalize::{DailyForecast, ForecastNormalizer},
    provider::WeatherProvider,
};

/// Current conditions paired with the forecast of the same cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReport {
    pub target: FetchTarget,
    pub unit: MeasurementUnit,
    pub current: CurrentConditions,
    pub forecast: DailyForecast,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ViewState {
    #[default]
    Idle,
    Loading,
    Failed(SessionError),
    Ready(WeatherReport),
}

/// What the rendering layer observes. Replaced whole on every transition.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub unit: MeasurementUnit,
    pub view: ViewState,
}

#[derive(Debug, Clone, Copy)]
struct Cycle {
    seq: u64,
    unit: MeasurementUnit,
}

#[derive(Debug, Default)]
struct Inner {
    issued: u64,
    unit: MeasurementUnit,
    last_requested: Option<FetchTarget>,
    last_successful: Option<FetchTarget>,
}

#[derive(Debug)]
pub struct WeatherSession<Tz: TimeZone = Local> {
    provider: Arc<dyn WeatherProvider>,
    resolver: LocationResolver,
    normalizer: ForecastNormalizer<Tz>,
    inner: Mutex<Inner>,
    state: watch::Sender<Snapshot>,
}

impl WeatherSession<Local> {
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        resolver: LocationResolver,
        unit: MeasurementUnit,
    ) -> Self {
        Self::with_normalizer(provider, resolver, unit, ForecastNormalizer::local())
    }
}

impl<Tz: TimeZone> WeatherSession<Tz> {
    pub fn with_normalizer(
        provider: Arc<dyn WeatherProvider>,
        resolver: LocationResolver,
        unit: MeasurementUnit,
        normalizer: ForecastNormalizer<Tz>,
    ) -> Self {
        let (state, _) = watch::channel(Snapshot {
            unit,
            view: ViewState::Idle,
        });

        Self {
            provider,
            resolver,
            normalizer,
            inner: Mutex::new(Inner {
                unit,
                ..Inner::default()
            }),
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state.borrow().clone()
    }

    pub fn unit(&self) -> MeasurementUnit {
        self.inner.lock().unit
    }

    /// Initial load from the device location. Without a location the session
    /// fails with `LocationUnavailable` and waits for a city search.
    pub async fn start(&self) {
        let cycle = self.issue(|_| ());
        info!(seq = cycle.seq, "Starting from device location");
        self.locate_and_run(cycle).await;
    }

    /// Empty or blank text is ignored: no transition, no request.
    pub async fn search_city(&self, name: &str) {
        let query = match LocationResolver::resolve_from_place_query(name) {
            Ok(query) => query,
            Err(err) => {
                debug!("Ignoring city search: {err}");
                return;
            }
        };

        let cycle = self.issue(|_| ());
        info!(seq = cycle.seq, city = %query, "Searching city");
        self.run_cycle(cycle, FetchTarget::Place(query)).await;
    }

    /// Switch units and re-fetch the last successful location. Without one,
    /// the device location is tried again.
    pub async fn set_unit(&self, unit: MeasurementUnit) {
        let mut target = None;
        let cycle = self.issue(|inner| {
            inner.unit = unit;
            target = inner.last_successful.clone();
        });
        info!(seq = cycle.seq, %unit, "Measurement unit changed");

        match target {
            Some(target) => self.run_cycle(cycle, target).await,
            None => self.locate_and_run(cycle).await,
        }
    }

    /// Repeat the last requested fetch, or the device lookup if nothing was requested yet.
    pub async fn retry(&self) {
        let mut target = None;
        let cycle = self.issue(|inner| target = inner.last_requested.clone());
        info!(seq = cycle.seq, "Retrying");

        match target {
            Some(target) => self.run_cycle(cycle, target).await,
            None => self.locate_and_run(cycle).await,
        }
    }

    /// Issue a new cycle number and publish `Loading`, atomically with `update`.
    fn issue(&self, update: impl FnOnce(&mut Inner)) -> Cycle {
        let mut inner = self.inner.lock();
        update(&mut inner);
        inner.issued += 1;
        let cycle = Cycle {
            seq: inner.issued,
            unit: inner.unit,
        };
        self.state.send_replace(Snapshot {
            unit: inner.unit,
            view: ViewState::Loading,
        });
        cycle
    }

    async fn locate_and_run(&self, cycle: Cycle) {
        match self.resolver.resolve_from_device().await {
            Ok(coords) => self.run_cycle(cycle, FetchTarget::Coordinates(coords)).await,
            Err(err) => {
                self.finish(cycle, Err(err));
            }
        }
    }

    async fn run_cycle(&self, cycle: Cycle, target: FetchTarget) {
        {
            let mut inner = self.inner.lock();
            if inner.issued == cycle.seq {
                inner.last_requested = Some(target.clone());
            }
        }

        let result = self.fetch(target, cycle.unit).await;
        self.finish(cycle, result);
    }

    /// Current conditions first; the forecast is only requested if they succeed.
    async fn fetch(
        &self,
        target: FetchTarget,
        unit: MeasurementUnit,
    ) -> Result<WeatherReport, SessionError> {
        let current = self
            .provider
            .current_conditions(&target, unit)
            .await
            .map_err(|err| SessionError::CurrentConditionsFetchFailed {
                target: target.clone(),
                reason: format!("{err:#}"),
            })?;

        let raw = self
            .provider
            .forecast(&target, unit)
            .await
            .map_err(|err| SessionError::ForecastFetchFailed {
                target: target.clone(),
                reason: format!("{err:#}"),
            })?;

        debug!("Reducing {} forecast samples for {target}", raw.len());
        let forecast = self.normalizer.reduce(raw);

        Ok(WeatherReport {
            target,
            unit,
            current,
            forecast,
        })
    }

    /// Publish the outcome if `cycle` is still the latest one. Returns whether it was applied.
    fn finish(&self, cycle: Cycle, result: Result<WeatherReport, SessionError>) -> bool {
        let mut inner = self.inner.lock();
        if inner.issued != cycle.seq {
            warn!(
                seq = cycle.seq,
                latest = inner.issued,
                "Discarding result of superseded fetch cycle"
            );
            return false;
        }

        let view = match result {
            Ok(report) => {
                info!(seq = cycle.seq, target = %report.target, days = report.forecast.len(), "Weather ready");
                inner.last_successful = Some(report.target.clone());
                ViewState::Ready(report)
            }
            Err(err) => {
                warn!(seq = cycle.seq, "Fetch cycle failed: {err}");
                ViewState::Failed(err)
            }
        };

        self.state.send_replace(Snapshot {
            unit: inner.unit,
            view,
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::StaticSensor;
    use crate::model::{Condition, Coordinates, ForecastSample};
    use anyhow::{Result, bail};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    #[derive(Debug, Default)]
    struct MockProvider {
        current_calls: AtomicUsize,
        forecast_calls: AtomicUsize,
        fail_current: bool,
        fail_forecast: bool,
        /// Place names whose current conditions are not found.
        unknown_places: Vec<&'static str>,
        /// Current-conditions calls for this unit wait until notified.
        gate: Option<(MeasurementUnit, Arc<Notify>)>,
    }

    impl MockProvider {
        fn current_calls(&self) -> usize {
            self.current_calls.load(Ordering::SeqCst)
        }

        fn forecast_calls(&self) -> usize {
            self.forecast_calls.load(Ordering::SeqCst)
        }
    }

    fn temperature_for(unit: MeasurementUnit) -> f64 {
        match unit {
            MeasurementUnit::Metric => 20.0,
            MeasurementUnit::Imperial => 68.0,
        }
    }

    fn condition() -> Condition {
        Condition {
            code: 800,
            icon: "01d".into(),
            description: "clear sky".into(),
        }
    }

    #[async_trait]
    impl WeatherProvider for MockProvider {
        async fn current_conditions(
            &self,
            target: &FetchTarget,
            unit: MeasurementUnit,
        ) -> Result<CurrentConditions> {
            self.current_calls.fetch_add(1, Ordering::SeqCst);
            if let Some((gated, notify)) = &self.gate {
                if *gated == unit {
                    notify.notified().await;
                }
            }
            if self.fail_current {
                bail!("status 503 Service Unavailable");
            }
            if let FetchTarget::Place(query) = target {
                if self.unknown_places.iter().any(|place| *place == query.as_str()) {
                    bail!("status 404 city not found");
                }
            }

            let temperature = temperature_for(unit);
            Ok(CurrentConditions {
                location_name: target.to_string(),
                temperature,
                feels_like: temperature - 1.0,
                temp_max: temperature + 2.0,
                temp_min: Some(temperature - 2.0),
                condition: condition(),
                observed_at: DateTime::from_timestamp(0, 0).expect("epoch"),
            })
        }

        async fn forecast(
            &self,
            _target: &FetchTarget,
            unit: MeasurementUnit,
        ) -> Result<Vec<ForecastSample>> {
            self.forecast_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_forecast {
                bail!("status 500 Internal Server Error");
            }

            // Five days at 3-hour steps starting 2024-01-01T00:00Z.
            Ok((0..40)
                .filter_map(|i| DateTime::from_timestamp(1_704_067_200 + i * 3 * 3600, 0))
                .map(|timestamp| ForecastSample {
                    timestamp,
                    temperature: temperature_for(unit),
                    temp_max: temperature_for(unit) + 1.0,
                    temp_min: None,
                    condition: condition(),
                })
                .collect())
        }
    }

    fn paris() -> Coordinates {
        Coordinates::new(48.8566, 2.3522).expect("valid")
    }

    fn session_with(
        provider: Arc<MockProvider>,
        sensor: StaticSensor,
    ) -> WeatherSession<Utc> {
        WeatherSession::with_normalizer(
            provider,
            LocationResolver::new(Arc::new(sensor)),
            MeasurementUnit::Metric,
            ForecastNormalizer::new(Utc),
        )
    }

    fn ready(snapshot: &Snapshot) -> &WeatherReport {
        match &snapshot.view {
            ViewState::Ready(report) => report,
            other => panic!("expected Ready, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn start_with_device_location_becomes_ready() {
        let provider = Arc::new(MockProvider::default());
        let session = session_with(provider.clone(), StaticSensor::new(Some(paris())));
        assert_eq!(session.snapshot().view, ViewState::Idle);

        session.start().await;

        let snapshot = session.snapshot();
        let report = ready(&snapshot);
        assert_eq!(report.target, FetchTarget::Coordinates(paris()));
        assert_eq!(report.unit, MeasurementUnit::Metric);
        assert_eq!(report.current.temperature, 20.0);
        assert_eq!(report.forecast.len(), 5);
        assert_eq!(report.forecast.upcoming(4).len(), 4);
        assert_eq!(provider.current_calls(), 1);
        assert_eq!(provider.forecast_calls(), 1);
    }

    #[tokio::test]
    async fn start_without_location_fails_and_fetches_nothing() {
        let provider = Arc::new(MockProvider::default());
        let session = session_with(provider.clone(), StaticSensor::unavailable());

        session.start().await;

        assert!(matches!(
            session.snapshot().view,
            ViewState::Failed(SessionError::LocationUnavailable(_))
        ));
        assert_eq!(provider.current_calls(), 0);

        // A city search recovers from it.
        session.search_city("Paris").await;
        assert_eq!(ready(&session.snapshot()).current.location_name, "Paris");
    }

    #[tokio::test]
    async fn failing_current_conditions_never_fetches_forecast() {
        let provider = Arc::new(MockProvider {
            fail_current: true,
            ..MockProvider::default()
        });
        let session = session_with(provider.clone(), StaticSensor::unavailable());

        session.search_city("Atlantis").await;

        match session.snapshot().view {
            ViewState::Failed(err @ SessionError::CurrentConditionsFetchFailed { .. }) => {
                assert_eq!(err.user_message(), "Error fetching city data");
                assert!(err.to_string().contains("503"));
            }
            other => panic!("expected current-conditions failure, got {other:?}"),
        }
        assert_eq!(provider.current_calls(), 1);
        assert_eq!(provider.forecast_calls(), 0);
    }

    #[tokio::test]
    async fn failing_forecast_is_not_a_partial_ready() {
        let provider = Arc::new(MockProvider {
            fail_forecast: true,
            ..MockProvider::default()
        });
        let session = session_with(provider.clone(), StaticSensor::new(Some(paris())));

        session.start().await;

        assert!(matches!(
            session.snapshot().view,
            ViewState::Failed(SessionError::ForecastFetchFailed { .. })
        ));
        assert_eq!(provider.current_calls(), 1);
        assert_eq!(provider.forecast_calls(), 1);
    }

    #[tokio::test]
    async fn empty_search_is_a_silent_no_op() {
        let provider = Arc::new(MockProvider::default());
        let session = session_with(provider.clone(), StaticSensor::unavailable());
        let mut rx = session.subscribe();

        session.search_city("").await;
        session.search_city("   ").await;

        assert_eq!(session.snapshot(), Snapshot::default());
        assert!(!rx.has_changed().expect("sender alive"));
        assert_eq!(provider.current_calls(), 0);
        assert_eq!(provider.forecast_calls(), 0);
    }

    #[tokio::test]
    async fn set_unit_refetches_last_successful_target() {
        let provider = Arc::new(MockProvider::default());
        let session = session_with(provider.clone(), StaticSensor::unavailable());

        session.search_city("Oslo").await;
        session.set_unit(MeasurementUnit::Imperial).await;

        let snapshot = session.snapshot();
        assert_eq!(snapshot.unit, MeasurementUnit::Imperial);
        let report = ready(&snapshot);
        assert_eq!(report.current.location_name, "Oslo");
        assert_eq!(report.unit, MeasurementUnit::Imperial);
        assert_eq!(report.current.temperature, 68.0);
        assert_eq!(provider.current_calls(), 2);
        assert_eq!(provider.forecast_calls(), 2);
    }

    #[tokio::test]
    async fn set_unit_refetches_newest_successful_search() {
        let provider = Arc::new(MockProvider::default());
        let session = session_with(provider.clone(), StaticSensor::new(Some(paris())));

        session.start().await;
        session.search_city("Oslo").await;
        session.set_unit(MeasurementUnit::Imperial).await;

        // Oslo replaced the device position as the latest successful target.
        assert_eq!(ready(&session.snapshot()).current.location_name, "Oslo");
        assert_eq!(session.unit(), MeasurementUnit::Imperial);
    }

    #[tokio::test]
    async fn set_unit_after_failed_search_uses_last_successful_target() {
        let provider = Arc::new(MockProvider {
            unknown_places: vec!["Atlantis"],
            ..MockProvider::default()
        });
        let session = session_with(provider.clone(), StaticSensor::new(Some(paris())));

        session.start().await;
        assert!(matches!(session.snapshot().view, ViewState::Ready(_)));

        session.search_city("Atlantis").await;
        assert!(matches!(
            session.snapshot().view,
            ViewState::Failed(SessionError::CurrentConditionsFetchFailed { .. })
        ));

        session.set_unit(MeasurementUnit::Imperial).await;

        let snapshot = session.snapshot();
        assert_eq!(snapshot.unit, MeasurementUnit::Imperial);
        let report = ready(&snapshot);
        assert_eq!(report.target, FetchTarget::Coordinates(paris()));
        assert_eq!(report.unit, MeasurementUnit::Imperial);
        assert_eq!(report.current.temperature, 68.0);
        assert_eq!(provider.current_calls(), 3);
        assert_eq!(provider.forecast_calls(), 2);
    }

    #[tokio::test]
    async fn overlapping_unit_changes_latest_wins() {
        let gate = Arc::new(Notify::new());
        let provider = Arc::new(MockProvider {
            gate: Some((MeasurementUnit::Imperial, gate.clone())),
            ..MockProvider::default()
        });
        let session = session_with(provider.clone(), StaticSensor::unavailable());
        session.search_city("Vienna").await;

        // The imperial request is held back until the metric one has completed.
        tokio::join!(session.set_unit(MeasurementUnit::Imperial), async {
            session.set_unit(MeasurementUnit::Metric).await;
            gate.notify_one();
        });

        let snapshot = session.snapshot();
        assert_eq!(snapshot.unit, MeasurementUnit::Metric);
        let report = ready(&snapshot);
        assert_eq!(report.unit, MeasurementUnit::Metric);
        assert_eq!(report.current.temperature, 20.0);
        // The stale imperial cycle still ran to completion.
        assert_eq!(provider.current_calls(), 3);
        assert_eq!(provider.forecast_calls(), 3);
    }

    #[tokio::test]
    async fn late_ready_does_not_overwrite_newer_failure() {
        let gate = Arc::new(Notify::new());
        let provider = Arc::new(MockProvider {
            gate: Some((MeasurementUnit::Metric, gate.clone())),
            ..MockProvider::default()
        });
        let session = session_with(provider.clone(), StaticSensor::unavailable());

        // The metric search is held back while the unit change fails on the
        // missing device location.
        tokio::join!(session.search_city("Quito"), async {
            session.set_unit(MeasurementUnit::Imperial).await;
            gate.notify_one();
        });

        let snapshot = session.snapshot();
        assert_eq!(snapshot.unit, MeasurementUnit::Imperial);
        assert!(matches!(
            snapshot.view,
            ViewState::Failed(SessionError::LocationUnavailable(_))
        ));
        assert_eq!(provider.forecast_calls(), 1);
    }

    #[tokio::test]
    async fn retry_repeats_last_requested_target() {
        let provider = Arc::new(MockProvider {
            fail_forecast: true,
            ..MockProvider::default()
        });
        let session = session_with(provider.clone(), StaticSensor::unavailable());

        session.search_city("Lima").await;
        session.retry().await;

        match session.snapshot().view {
            ViewState::Failed(SessionError::ForecastFetchFailed { target, .. }) => {
                assert_eq!(target.to_string(), "Lima");
            }
            other => panic!("expected forecast failure, got {other:?}"),
        }
        assert_eq!(provider.current_calls(), 2);
    }

    #[tokio::test]
    async fn subscribers_see_loading_then_result() {
        let provider = Arc::new(MockProvider::default());
        let session = session_with(provider, StaticSensor::unavailable());
        let mut rx = session.subscribe();

        session.search_city("Nairobi").await;

        assert!(rx.has_changed().expect("sender alive"));
        let seen = rx.borrow_and_update().clone();
        assert!(matches!(seen.view, ViewState::Ready(_)));
    }
}
