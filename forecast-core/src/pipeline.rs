use tracing::info;

use crate::{
    Config,
    error::Result,
    model::{DeliveryResult, ForecastRequest},
    notifier::Notifier,
    provider::{ForecastProvider, provider_from_config, request_from_config},
    report::{DEFAULT_WINDOW, Report},
};

/// Fetches the hourly forecast and renders the trailing window as text.
#[derive(Debug)]
pub struct WeatherFetcher {
    provider: Box<dyn ForecastProvider>,
    request: ForecastRequest,
    window: usize,
}

impl WeatherFetcher {
    pub fn new(provider: Box<dyn ForecastProvider>, request: ForecastRequest) -> Self {
        Self { provider, request, window: DEFAULT_WINDOW }
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let provider = provider_from_config(config)?;
        Ok(Self::new(provider, request_from_config(config)).with_window(config.forecast.rows))
    }

    pub fn request(&self) -> &ForecastRequest {
        &self.request
    }

    pub async fn fetch(&self) -> Result<Report> {
        let forecast = self.provider.hourly(&self.request).await?;

        let loc = &forecast.location;
        info!(
            "Coordinates {}°N {}°E, elevation {} m asl, timezone {} {} (UTC offset {} s)",
            loc.latitude,
            loc.longitude,
            loc.elevation,
            loc.timezone,
            loc.timezone_abbreviation,
            loc.utc_offset_seconds
        );

        let rows = forecast.series.rows()?;
        Ok(Report::from_rows(&rows, self.window, loc.utc_offset_seconds))
    }

    pub async fn fetch_report(&self) -> Result<String> {
        Ok(self.fetch().await?.render())
    }
}

/// One fetch-and-notify cycle. The notifier is only called when the report was built.
pub async fn run_once(fetcher: &WeatherFetcher, notifier: &dyn Notifier) -> Result<DeliveryResult> {
    let report = fetcher.fetch_report().await?;
    notifier.send(&report).await
}
