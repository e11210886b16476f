use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{DigestError, Result};

pub const TEMPERATURE: &str = "temperature_2m";
pub const HUMIDITY: &str = "relative_humidity_2m";

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRequest {
    pub latitude: f64,
    pub longitude: f64,
    /// Hourly variables, in the order they are sent upstream.
    pub variables: Vec<String>,
    pub timezone: String,
    pub past_days: u8,
    pub forecast_days: u8,
}

impl ForecastRequest {
    /// Temperature and humidity for the given point, one day back and one ahead.
    pub fn hourly_temperature_humidity(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            variables: vec![TEMPERATURE.to_string(), HUMIDITY.to_string()],
            timezone: "auto".to_string(),
            past_days: 1,
            forecast_days: 1,
        }
    }

    /// Query pairs for the forecast endpoint.
    pub fn query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("latitude", self.latitude.to_string()),
            ("longitude", self.longitude.to_string()),
            ("hourly", self.variables.join(",")),
            ("timezone", self.timezone.clone()),
            ("past_days", self.past_days.to_string()),
            ("forecast_days", self.forecast_days.to_string()),
            ("timeformat", "unixtime".to_string()),
        ]
    }
}

/// Location metadata echoed back by the forecast endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
    pub timezone: String,
    pub timezone_abbreviation: String,
    pub utc_offset_seconds: i32,
}

/// Regularly spaced hourly values over `[start, end)`.
#[derive(Debug, Clone)]
pub struct HourlySeries {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    interval_seconds: i64,
    values: HashMap<String, Vec<f64>>,
}

impl HourlySeries {
    /// Build a series, checking that every variable has exactly one value per slot.
    pub fn new(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        interval_seconds: i64,
        values: HashMap<String, Vec<f64>>,
    ) -> Result<Self> {
        if interval_seconds <= 0 {
            return Err(DigestError::DataShape(format!(
                "hourly interval must be positive, got {interval_seconds}s"
            )));
        }
        if end < start {
            return Err(DigestError::DataShape(format!(
                "hourly block ends ({end}) before it starts ({start})"
            )));
        }

        let series = Self { start, end, interval_seconds, values };
        let slots = series.slot_count();

        for (name, vals) in &series.values {
            if vals.len() != slots {
                return Err(DigestError::DataShape(format!(
                    "variable '{name}' has {} values, expected {slots}",
                    vals.len()
                )));
            }
        }

        Ok(series)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn interval_seconds(&self) -> i64 {
        self.interval_seconds
    }

    /// Number of slots in the half-open interval.
    pub fn slot_count(&self) -> usize {
        let span = (self.end - self.start).num_seconds();
        // Ceiling division: a trailing partial slot still starts inside the interval.
        ((span + self.interval_seconds - 1) / self.interval_seconds) as usize
    }

    pub fn timestamps(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        (0..self.slot_count() as i64)
            .map(move |i| self.start + Duration::seconds(i * self.interval_seconds))
    }

    pub fn values(&self, variable: &str) -> Option<&[f64]> {
        self.values.get(variable).map(Vec::as_slice)
    }

    fn require(&self, variable: &str) -> Result<&[f64]> {
        self.values(variable).ok_or_else(|| {
            DigestError::DataShape(format!("variable '{variable}' missing from hourly data"))
        })
    }

    /// Zip timestamps with temperature and humidity, one row per slot.
    pub fn rows(&self) -> Result<Vec<ReportRow>> {
        let temps = self.require(TEMPERATURE)?;
        let humidity = self.require(HUMIDITY)?;

        Ok(self
            .timestamps()
            .zip(temps.iter().zip(humidity))
            .map(|(date, (&temp, &humidity))| ReportRow { date, temp, humidity })
            .collect())
    }
}

/// Decoded forecast for a single location.
#[derive(Debug, Clone)]
pub struct HourlyForecast {
    pub location: ForecastLocation,
    pub series: HourlySeries,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReportRow {
    pub date: DateTime<Utc>,
    pub temp: f64,
    pub humidity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMessage {
    pub chat_id: String,
    pub text: String,
}

/// Raw outcome of a delivery call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResult {
    pub status: u16,
    pub body: String,
}

impl DeliveryResult {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn series(slots: usize, humidity_len: usize) -> Result<HourlySeries> {
        let start = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        let end = start + Duration::hours(slots as i64);
        let values = HashMap::from([
            (TEMPERATURE.to_string(), (0..slots).map(|i| i as f64).collect()),
            (HUMIDITY.to_string(), vec![50.0; humidity_len]),
        ]);
        HourlySeries::new(start, end, 3600, values)
    }

    #[test]
    fn query_preserves_variable_order() {
        let req = ForecastRequest::hourly_temperature_humidity(50.4547, 30.5238);
        let query = req.query();

        let hourly = query.iter().find(|(k, _)| *k == "hourly").map(|(_, v)| v.as_str());
        assert_eq!(hourly, Some("temperature_2m,relative_humidity_2m"));
        assert!(query.contains(&("past_days", "1".to_string())));
        assert!(query.contains(&("forecast_days", "1".to_string())));
        assert!(query.contains(&("timezone", "auto".to_string())));
    }

    #[test]
    fn rows_are_spaced_by_interval() {
        let s = series(24, 24).expect("valid series");
        let rows = s.rows().expect("rows");

        assert_eq!(rows.len(), 24);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.date, s.start() + Duration::seconds(i as i64 * 3600));
            assert_eq!(row.temp, i as f64);
        }
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let err = series(24, 23).unwrap_err();
        assert!(err.is_data_shape(), "got {err:?}");
    }

    #[test]
    fn empty_interval_has_no_rows() {
        let s = series(0, 0).expect("empty series is valid");
        assert_eq!(s.slot_count(), 0);
        assert!(s.rows().expect("rows").is_empty());
    }

    #[test]
    fn missing_variable_is_data_shape_error() {
        let start = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        let values = HashMap::from([(TEMPERATURE.to_string(), vec![1.0])]);
        let s = HourlySeries::new(start, start + Duration::hours(1), 3600, values).unwrap();

        assert!(s.rows().unwrap_err().is_data_shape());
    }

    #[test]
    fn non_positive_interval_is_rejected() {
        let start = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        assert!(HourlySeries::new(start, start, 0, HashMap::new()).is_err());
    }
}
