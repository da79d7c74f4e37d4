use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use forecast_core::{
    Config, Coordinates, LocationResolver, MeasurementUnit, Snapshot, StaticSensor, ViewState,
    WeatherSession, provider_from_config,
};
use inquire::{Confirm, CustomType, InquireError, Password, Select, Text};
use std::{fmt, future::Future, sync::Arc};
use tokio::sync::watch;
use tracing::debug;

use crate::{position, render::render};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "forecast", version, about = "Current weather and a 4-day forecast")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure the API key, default units and home location.
    Configure,

    /// Show weather for the current location or a city.
    Show {
        /// City name; if absent, the device location is used.
        #[arg(long, conflicts_with_all = ["lat", "lon"])]
        city: Option<String>,

        #[command(flatten)]
        options: SessionArgs,
    },

    /// Interactive widget: search cities, toggle units, retry.
    Interactive {
        #[command(flatten)]
        options: SessionArgs,
    },
}

#[derive(Debug, Args)]
pub struct SessionArgs {
    /// Device latitude, overrides FORECAST_LAT and the configured home.
    #[arg(long, allow_negative_numbers = true, requires = "lon")]
    lat: Option<f64>,

    /// Device longitude, overrides FORECAST_LON and the configured home.
    #[arg(long, allow_negative_numbers = true, requires = "lat")]
    lon: Option<f64>,

    /// Measurement units: metric or imperial. Defaults to the configured units.
    #[arg(long, short)]
    units: Option<MeasurementUnit>,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show { city, options } => {
                let session = build_session(&options)?;
                let mut rx = session.subscribe();
                match city {
                    Some(city) => with_progress(&mut rx, session.search_city(&city)).await,
                    None => with_progress(&mut rx, session.start()).await,
                }
                println!("{}", render(&session.snapshot()));
                Ok(())
            }
            Command::Interactive { options } => {
                let session = build_session(&options)?;
                interactive(&session).await
            }
        }
    }
}

fn build_session(options: &SessionArgs) -> Result<WeatherSession> {
    let config = Config::load()?;
    let device = position::configured_position(
        (options.lat, options.lon),
        position::position_from_env(),
        &config,
    )?;
    let unit = options.units.unwrap_or(config.units);
    debug!(%unit, has_device_position = device.is_some(), has_api_key = config.has_api_key(), "Session configured");

    let resolver = LocationResolver::new(Arc::new(StaticSensor::new(device)));
    Ok(WeatherSession::new(provider_from_config(&config), resolver, unit))
}

/// Runs `action`, printing the loading state whenever the session enters it.
async fn with_progress<F>(rx: &mut watch::Receiver<Snapshot>, action: F)
where
    F: Future<Output = ()>,
{
    tokio::pin!(action);
    loop {
        tokio::select! {
            _ = &mut action => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    action.await;
                    break;
                }
                let snapshot = rx.borrow_and_update().clone();
                if snapshot.view == ViewState::Loading {
                    eprintln!("{}", render(&snapshot));
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Action {
    Search,
    SwitchUnit(MeasurementUnit),
    Retry,
    Quit,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Search => f.write_str("Search city"),
            Action::SwitchUnit(unit) => {
                write!(f, "Switch to {unit} ({})", unit.temperature_symbol())
            }
            Action::Retry => f.write_str("Retry"),
            Action::Quit => f.write_str("Quit"),
        }
    }
}

fn is_cancel(err: &InquireError) -> bool {
    matches!(
        err,
        InquireError::OperationCanceled | InquireError::OperationInterrupted
    )
}

async fn interactive(session: &WeatherSession) -> Result<()> {
    let mut rx = session.subscribe();
    with_progress(&mut rx, session.start()).await;

    loop {
        println!("{}\n", render(&session.snapshot()));

        let actions = vec![
            Action::Search,
            Action::SwitchUnit(session.unit().toggled()),
            Action::Retry,
            Action::Quit,
        ];
        let action = match Select::new("What next?", actions).prompt() {
            Ok(action) => action,
            Err(err) if is_cancel(&err) => break,
            Err(err) => return Err(err.into()),
        };

        match action {
            Action::Search => {
                let city = match Text::new("City:").prompt() {
                    Ok(city) => city,
                    Err(err) if is_cancel(&err) => continue,
                    Err(err) => return Err(err.into()),
                };
                with_progress(&mut rx, session.search_city(&city)).await;
            }
            Action::SwitchUnit(unit) => with_progress(&mut rx, session.set_unit(unit)).await,
            Action::Retry => with_progress(&mut rx, session.retry()).await,
            Action::Quit => break,
        }
    }

    Ok(())
}

fn configure() -> Result<()> {
    let mut config = Config::load_file()?;

    let prompt = if config.has_api_key() {
        "OpenWeather API key (leave empty to keep the current one):"
    } else {
        "OpenWeather API key:"
    };
    let api_key = Password::new(prompt).without_confirmation().prompt()?;
    if !api_key.trim().is_empty() {
        config.set_api_key(api_key.trim().to_string());
    }

    let units = MeasurementUnit::all().to_vec();
    let cursor = units.iter().position(|u| *u == config.units).unwrap_or(0);
    config.units = Select::new("Default units:", units)
        .with_starting_cursor(cursor)
        .prompt()?;

    let set_home = Confirm::new("Use a fixed home location when no position is given?")
        .with_default(config.home.is_some())
        .prompt()?;
    config.home = if set_home {
        let latitude = CustomType::<f64>::new("Latitude:").prompt()?;
        let longitude = CustomType::<f64>::new("Longitude:").prompt()?;
        Some(Coordinates::new(latitude, longitude).context("Invalid home location")?)
    } else {
        None
    };

    config.save()?;
    println!(
        "Configuration saved to {}",
        Config::config_file_path()?.display()
    );
    Ok(())
}
