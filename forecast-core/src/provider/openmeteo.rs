use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, instrument};

use crate::{
    error::{DigestError, Result},
    http::CachedClient,
    model::{ForecastLocation, ForecastRequest, HourlyForecast, HourlySeries},
};

use super::ForecastProvider;

/// Slot width assumed when the API returns a single timestamp.
const DEFAULT_INTERVAL_SECS: i64 = 3600;

#[derive(Debug, Clone)]
pub struct OpenMeteoProvider {
    base_url: String,
    http: CachedClient,
}

impl OpenMeteoProvider {
    /// `base_url` is the API root, e.g. `https://api.open-meteo.com/v1`.
    pub fn new(base_url: impl Into<String>, http: CachedClient) -> Self {
        Self { base_url: base_url.into(), http }
    }

    fn forecast_url(&self) -> String {
        format!("{}/forecast", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OmResponse {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    elevation: f64,
    #[serde(default)]
    timezone: String,
    #[serde(default)]
    timezone_abbreviation: String,
    #[serde(default)]
    utc_offset_seconds: i32,
    hourly: Option<OmHourly>,
}

#[derive(Debug, Deserialize)]
struct OmHourly {
    time: Vec<i64>,
    /// Every other key is a variable name mapped to its value array.
    #[serde(flatten)]
    variables: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct OmError {
    reason: String,
}

fn unix_to_utc(ts: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
        .ok_or_else(|| DigestError::DataShape(format!("timestamp {ts} is out of range")))
}

fn axis_overflow() -> DigestError {
    DigestError::DataShape("hourly time axis is out of range".to_string())
}

/// Derive start, interval and end from the unix-time axis, insisting on even spacing.
fn time_axis(time: &[i64]) -> Result<(DateTime<Utc>, i64, DateTime<Utc>)> {
    let Some(&first) = time.first() else {
        let epoch = DateTime::<Utc>::UNIX_EPOCH;
        return Ok((epoch, DEFAULT_INTERVAL_SECS, epoch));
    };

    let interval = match time.get(1) {
        Some(&second) => second.checked_sub(first).ok_or_else(axis_overflow)?,
        None => DEFAULT_INTERVAL_SECS,
    };
    if interval <= 0 {
        return Err(DigestError::DataShape(format!(
            "hourly time axis is not increasing (interval {interval}s)"
        )));
    }

    for (i, pair) in time.windows(2).enumerate() {
        if pair[1].checked_sub(pair[0]) != Some(interval) {
            return Err(DigestError::DataShape(format!(
                "hourly time axis is irregular at slot {}: expected {interval}s step",
                i + 1
            )));
        }
    }

    let start = unix_to_utc(first)?;
    let span = i64::try_from(time.len())
        .ok()
        .and_then(|len| interval.checked_mul(len))
        .and_then(TimeDelta::try_seconds)
        .ok_or_else(axis_overflow)?;
    let end = start.checked_add_signed(span).ok_or_else(axis_overflow)?;
    Ok((start, interval, end))
}

fn decode_variable(name: &str, raw: &serde_json::Value) -> Result<Vec<f64>> {
    let values: Vec<Option<f64>> = serde_json::from_value(raw.clone()).map_err(|e| {
        DigestError::DataShape(format!("variable '{name}' is not a numeric array: {e}"))
    })?;

    values
        .into_iter()
        .enumerate()
        .map(|(i, v)| {
            v.ok_or_else(|| {
                DigestError::DataShape(format!("variable '{name}' has no value at slot {i}"))
            })
        })
        .collect()
}

/// Decode a forecast body, looking up each requested variable by name.
pub fn decode_forecast(body: &str, request: &ForecastRequest) -> Result<HourlyForecast> {
    let parsed: OmResponse = serde_json::from_str(body)
        .map_err(|source| DigestError::Decode { what: "Open-Meteo forecast", source })?;

    let hourly = parsed
        .hourly
        .ok_or_else(|| DigestError::DataShape("response contains no hourly block".to_string()))?;

    let mut values = HashMap::with_capacity(request.variables.len());
    for name in &request.variables {
        let raw = hourly.variables.get(name).ok_or_else(|| {
            DigestError::DataShape(format!("requested variable '{name}' missing from response"))
        })?;
        values.insert(name.clone(), decode_variable(name, raw)?);
    }

    let (start, interval, end) = time_axis(&hourly.time)?;
    let series = HourlySeries::new(start, end, interval, values)?;

    Ok(HourlyForecast {
        location: ForecastLocation {
            latitude: parsed.latitude,
            longitude: parsed.longitude,
            elevation: parsed.elevation,
            timezone: parsed.timezone,
            timezone_abbreviation: parsed.timezone_abbreviation,
            utc_offset_seconds: parsed.utc_offset_seconds,
        },
        series,
    })
}

#[async_trait]
impl ForecastProvider for OpenMeteoProvider {
    #[instrument(skip(self, request), fields(lat = %request.latitude, lon = %request.longitude))]
    async fn hourly(&self, request: &ForecastRequest) -> Result<HourlyForecast> {
        let url = self.forecast_url();
        debug!(url = %url, variables = ?request.variables, "Fetching hourly forecast");

        let body = self.http.get_text(&url, &request.query()).await.map_err(|err| match err {
            // Open-Meteo explains 4xx errors in a JSON `reason` field.
            DigestError::HttpStatus { url, status, body } => {
                let body = serde_json::from_str::<OmError>(&body).map(|e| e.reason).unwrap_or(body);
                DigestError::HttpStatus { url, status, body }
            }
            other => other,
        })?;

        decode_forecast(&body, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> ForecastRequest {
        ForecastRequest::hourly_temperature_humidity(50.4547, 30.5238)
    }

    fn body(temps: serde_json::Value, humidity: serde_json::Value, time: Vec<i64>) -> String {
        json!({
            "latitude": 50.45,
            "longitude": 30.52,
            "elevation": 179.0,
            "utc_offset_seconds": 7200,
            "timezone": "Europe/Kyiv",
            "timezone_abbreviation": "EET",
            "hourly_units": { "time": "unixtime", "temperature_2m": "°C" },
            "hourly": {
                "time": time,
                "temperature_2m": temps,
                "relative_humidity_2m": humidity
            }
        })
        .to_string()
    }

    #[test]
    fn decodes_location_and_series() {
        let time = vec![1_705_276_800, 1_705_280_400, 1_705_284_000];
        let b = body(json!([1.0, 2.5, 3.0]), json!([80, 81, 82]), time);
        let forecast = decode_forecast(&b, &request()).expect("should decode");

        assert_eq!(forecast.location.timezone, "Europe/Kyiv");
        assert_eq!(forecast.location.utc_offset_seconds, 7200);
        assert_eq!(forecast.series.interval_seconds(), 3600);
        assert_eq!(forecast.series.slot_count(), 3);
        assert_eq!(forecast.series.start().timestamp(), 1_705_276_800);
        assert_eq!(forecast.series.end().timestamp(), 1_705_276_800 + 3 * 3600);

        let rows = forecast.series.rows().expect("rows");
        assert_eq!(rows[1].temp, 2.5);
        assert_eq!(rows[2].humidity, 82.0);
    }

    #[test]
    fn variables_are_matched_by_name_not_position() {
        let b = json!({
            "latitude": 50.45,
            "longitude": 30.52,
            "hourly": {
                "relative_humidity_2m": [90, 91],
                "time": [0, 3600],
                "temperature_2m": [-4.0, -5.0]
            }
        })
        .to_string();

        let rows = decode_forecast(&b, &request()).unwrap().series.rows().unwrap();
        assert_eq!(rows[0].temp, -4.0);
        assert_eq!(rows[0].humidity, 90.0);
    }

    #[test]
    fn length_mismatch_is_data_shape_error() {
        let b = body(json!([1.0, 2.0, 3.0]), json!([80, 81]), vec![0, 3600, 7200]);
        let err = decode_forecast(&b, &request()).unwrap_err();
        assert!(err.is_data_shape(), "got {err:?}");
    }

    #[test]
    fn missing_variable_is_data_shape_error() {
        let b = json!({
            "latitude": 0.0,
            "longitude": 0.0,
            "hourly": { "time": [0], "temperature_2m": [1.0] }
        })
        .to_string();

        let err = decode_forecast(&b, &request()).unwrap_err();
        assert!(err.to_string().contains("relative_humidity_2m"));
    }

    #[test]
    fn null_value_is_data_shape_error() {
        let b = body(json!([1.0, null]), json!([80, 81]), vec![0, 3600]);
        assert!(decode_forecast(&b, &request()).unwrap_err().is_data_shape());
    }

    #[test]
    fn irregular_time_axis_is_rejected() {
        let b = body(json!([1.0, 2.0, 3.0]), json!([1, 2, 3]), vec![0, 3600, 9000]);
        assert!(decode_forecast(&b, &request()).unwrap_err().is_data_shape());
    }

    #[test]
    fn huge_step_is_data_shape_error() {
        let b = body(json!([1.0, 2.0]), json!([1, 2]), vec![0, 9_000_000_000_000]);
        assert!(decode_forecast(&b, &request()).unwrap_err().is_data_shape());
    }

    #[test]
    fn overflowing_step_is_data_shape_error() {
        let b = body(json!([1.0, 2.0]), json!([1, 2]), vec![i64::MIN, i64::MAX]);
        assert!(decode_forecast(&b, &request()).unwrap_err().is_data_shape());
    }

    #[test]
    fn empty_hourly_block_is_an_empty_series() {
        let b = body(json!([]), json!([]), vec![]);
        let forecast = decode_forecast(&b, &request()).expect("empty is fine");
        assert!(forecast.series.rows().unwrap().is_empty());
    }

    #[test]
    fn invalid_json_is_decode_error() {
        let err = decode_forecast("not json", &request()).unwrap_err();
        assert!(matches!(err, DigestError::Decode { .. }));
    }

    #[test]
    fn forecast_url_ignores_trailing_slash() {
        let http = CachedClient::new(Default::default(), None).unwrap();
        let provider = OpenMeteoProvider::new("http://localhost:1234/v1/", http);
        assert_eq!(provider.forecast_url(), "http://localhost:1234/v1/forecast");
    }
}
