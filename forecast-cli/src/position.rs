//! Where the "device" position comes from on a terminal.

use anyhow::{Context, Result, bail};
use forecast_core::{Config, Coordinates};

pub const LAT_ENV: &str = "FORECAST_LAT";
pub const LON_ENV: &str = "FORECAST_LON";

/// First available of: command-line flags, environment, config `home`.
pub fn configured_position(
    flags: (Option<f64>, Option<f64>),
    env: (Option<String>, Option<String>),
    config: &Config,
) -> Result<Option<Coordinates>> {
    if let (Some(lat), Some(lon)) = flags {
        return Ok(Some(Coordinates::new(lat, lon).context("Invalid --lat/--lon")?));
    }

    match env {
        (Some(lat), Some(lon)) => {
            let lat: f64 = lat
                .trim()
                .parse()
                .with_context(|| format!("{LAT_ENV} is not a number: {lat}"))?;
            let lon: f64 = lon
                .trim()
                .parse()
                .with_context(|| format!("{LON_ENV} is not a number: {lon}"))?;
            let coords = Coordinates::new(lat, lon)
                .with_context(|| format!("Invalid {LAT_ENV}/{LON_ENV}"))?;
            Ok(Some(coords))
        }
        (Some(_), None) | (None, Some(_)) => {
            bail!("{LAT_ENV} and {LON_ENV} must be set together")
        }
        (None, None) => Ok(config.home),
    }
}

pub fn position_from_env() -> (Option<String>, Option<String>) {
    (std::env::var(LAT_ENV).ok(), std::env::var(LON_ENV).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_home() -> Config {
        Config {
            home: Some(Coordinates::new(10.0, 20.0).expect("valid")),
            ..Config::default()
        }
    }

    #[test]
    fn flags_take_precedence() {
        let pos = configured_position(
            (Some(1.0), Some(2.0)),
            (Some("3".into()), Some("4".into())),
            &config_with_home(),
        )
        .expect("valid position");

        assert_eq!(pos, Some(Coordinates::new(1.0, 2.0).expect("valid")));
    }

    #[test]
    fn env_before_config_home() {
        let pos = configured_position(
            (None, None),
            (Some(" -33.87 ".into()), Some("151.21".into())),
            &config_with_home(),
        )
        .expect("valid position");

        assert_eq!(pos, Some(Coordinates::new(-33.87, 151.21).expect("valid")));
    }

    #[test]
    fn falls_back_to_home_then_nothing() {
        let home = configured_position((None, None), (None, None), &config_with_home())
            .expect("valid position");
        assert_eq!(home, Some(Coordinates::new(10.0, 20.0).expect("valid")));

        let none = configured_position((None, None), (None, None), &Config::default())
            .expect("valid position");
        assert_eq!(none, None);
    }

    #[test]
    fn rejects_bad_input() {
        let cfg = Config::default();
        assert!(configured_position((Some(95.0), Some(0.0)), (None, None), &cfg).is_err());
        assert!(configured_position((None, None), (Some("north".into()), Some("0".into())), &cfg).is_err());
        assert!(configured_position((None, None), (Some("1".into()), None), &cfg).is_err());
    }
}
