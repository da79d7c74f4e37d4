//! Text rendering of a session snapshot. Pure: same snapshot, same output.

use chrono::Datelike;
use forecast_core::{DailyEntry, MeasurementUnit, Snapshot, ViewState, WeatherReport};

/// Number of days shown after the current one.
pub const FORECAST_DAYS: usize = 4;

pub fn render(snapshot: &Snapshot) -> String {
    match &snapshot.view {
        ViewState::Idle => "Search for a city to see the weather.".to_string(),
        ViewState::Loading => "Loading...".to_string(),
        ViewState::Failed(err) => format!("{}\n  {err}", err.user_message()),
        ViewState::Ready(report) => render_report(report),
    }
}

fn render_report(report: &WeatherReport) -> String {
    let unit = report.unit;
    let current = &report.current;

    let mut lines = vec![
        "Weather Forecast".to_string(),
        format!("{}, Today", current.location_name),
        format!("  {}", temperature(current.temperature, unit)),
        format!("  Max:        {}", temperature(current.temp_max, unit)),
        format!("  Min:        {}", optional_temperature(current.temp_min, unit)),
        format!("  Feels Like: {}", temperature(current.feels_like, unit)),
        format!("  Condition:  {}", current.condition.headline()),
        format!("  Icon:       {}", current.condition.icon_url()),
    ];

    let upcoming = report.forecast.upcoming(FORECAST_DAYS);
    if !upcoming.is_empty() {
        lines.push(String::new());
        lines.push(format!("{FORECAST_DAYS}-Day Forecast"));
        lines.extend(upcoming.iter().map(|entry| forecast_line(entry, unit)));
    }

    lines.join("\n")
}

fn forecast_line(entry: &DailyEntry, unit: MeasurementUnit) -> String {
    let date = entry.date;
    let sample = &entry.sample;
    format!(
        "  {:<10} {:>10}  Max: {:>6}  Min: {:>6}  {}  {}",
        date.format("%A").to_string(),
        format!("{}/{}/{}", date.month(), date.day(), date.year()),
        temperature(sample.temp_max, unit),
        optional_temperature(sample.temp_min, unit),
        sample.condition.headline(),
        sample.condition.icon_url(),
    )
}

fn temperature(value: f64, unit: MeasurementUnit) -> String {
    let rounded = value.round();
    // Avoid printing "-0".
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{rounded:.0} {}", unit.temperature_symbol())
}

fn optional_temperature(value: Option<f64>, unit: MeasurementUnit) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| temperature(v, unit))
}
