use crate::{
    Config,
    error::Result,
    http::CachedClient,
    model::{ForecastRequest, HourlyForecast},
    provider::openmeteo::OpenMeteoProvider,
};
use async_trait::async_trait;
use std::fmt::Debug;
use tracing::warn;

pub mod openmeteo;

#[async_trait]
pub trait ForecastProvider: Send + Sync + Debug {
    async fn hourly(&self, request: &ForecastRequest) -> Result<HourlyForecast>;
}

/// Build the request described by the `[location]` and `[forecast]` sections.
pub fn request_from_config(config: &Config) -> ForecastRequest {
    ForecastRequest {
        timezone: config.forecast.timezone.clone(),
        past_days: config.forecast.past_days,
        forecast_days: config.forecast.forecast_days,
        ..ForecastRequest::hourly_temperature_humidity(
            config.location.latitude,
            config.location.longitude,
        )
    }
}

/// Construct the Open-Meteo provider with the retry/cache policy from config.
pub fn provider_from_config(config: &Config) -> Result<Box<dyn ForecastProvider>> {
    let cache_dir = match config.cache_dir() {
        Ok(dir) => Some(dir),
        Err(e) => {
            warn!(error = %e, "No cache directory available, caching disabled");
            None
        }
    };

    let http = CachedClient::new(config.http.clone(), cache_dir)?;
    Ok(Box::new(OpenMeteoProvider::new(config.forecast.base_url.clone(), http)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HUMIDITY, TEMPERATURE};

    #[test]
    fn request_from_config_uses_location_and_window() {
        let mut cfg = Config::default();
        cfg.location.latitude = 52.52;
        cfg.forecast.past_days = 2;

        let req = request_from_config(&cfg);
        assert_eq!(req.latitude, 52.52);
        assert_eq!(req.longitude, 30.5238);
        assert_eq!(req.past_days, 2);
        assert_eq!(req.forecast_days, 1);
        assert_eq!(req.variables, vec![TEMPERATURE, HUMIDITY]);
    }

    #[test]
    fn provider_from_config_builds_with_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut cfg = Config::default();
        cfg.http.cache_dir = Some(dir.path().to_path_buf());

        assert!(provider_from_config(&cfg).is_ok());
    }
}
