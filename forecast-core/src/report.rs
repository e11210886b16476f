//! Text rendering of the trailing hourly window.
//!
//! Values are shown with one decimal digit. The rows holding the lowest and
//! highest temperature of the window get a `min` / `max` marker; ties mark
//! every tied row.

use chrono::{FixedOffset, Offset, Utc};
use std::fmt;

use crate::model::ReportRow;

pub const DEFAULT_WINDOW: usize = 10;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extreme {
    Min,
    Max,
    /// Every row has the same temperature.
    MinMax,
}

impl Extreme {
    pub fn label(&self) -> &'static str {
        match self {
            Extreme::Min => "min",
            Extreme::Max => "max",
            Extreme::MinMax => "min max",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Report {
    rows: Vec<ReportRow>,
    offset: FixedOffset,
}

impl Report {
    /// Keep the last `window` rows; dates render in the given UTC offset.
    pub fn from_rows(rows: &[ReportRow], window: usize, utc_offset_seconds: i32) -> Self {
        let skip = rows.len().saturating_sub(window);
        let offset = FixedOffset::east_opt(utc_offset_seconds).unwrap_or_else(|| Utc.fix());

        Self { rows: rows[skip..].to_vec(), offset }
    }

    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    pub fn min_temp(&self) -> Option<f64> {
        self.rows.iter().map(|r| r.temp).reduce(f64::min)
    }

    pub fn max_temp(&self) -> Option<f64> {
        self.rows.iter().map(|r| r.temp).reduce(f64::max)
    }

    /// Marker for each row, aligned with `rows()`.
    pub fn extremes(&self) -> Vec<Option<Extreme>> {
        let (Some(min), Some(max)) = (self.min_temp(), self.max_temp()) else {
            return Vec::new();
        };

        self.rows
            .iter()
            .map(|r| match (r.temp == min, r.temp == max) {
                (true, true) => Some(Extreme::MinMax),
                (true, false) => Some(Extreme::Min),
                (false, true) => Some(Extreme::Max),
                (false, false) => None,
            })
            .collect()
    }

    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: Vec<[String; 3]> = self
            .rows
            .iter()
            .map(|r| {
                [
                    r.date.with_timezone(&self.offset).format(DATE_FORMAT).to_string(),
                    format!("{:.1}", r.temp),
                    format!("{:.1}", r.humidity),
                ]
            })
            .collect();

        let header = ["date", "temp", "humidity"];
        let mut widths = header.map(str::len);
        for row in &cells {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(cell.len());
            }
        }

        write!(
            f,
            "{:<w0$}  {:>w1$}  {:>w2$}",
            header[0],
            header[1],
            header[2],
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2]
        )?;

        for (row, extreme) in cells.iter().zip(self.extremes()) {
            write!(
                f,
                "\n{:<w0$}  {:>w1$}  {:>w2$}",
                row[0],
                row[1],
                row[2],
                w0 = widths[0],
                w1 = widths[1],
                w2 = widths[2]
            )?;
            if let Some(extreme) = extreme {
                write!(f, "  {}", extreme.label())?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn rows(temps: &[f64]) -> Vec<ReportRow> {
        let start = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        temps
            .iter()
            .enumerate()
            .map(|(i, &temp)| ReportRow {
                date: start + Duration::hours(i as i64),
                temp,
                humidity: 70.0 + i as f64,
            })
            .collect()
    }

    fn data_lines(text: &str) -> Vec<&str> {
        text.lines().skip(1).collect()
    }

    #[test]
    fn keeps_last_ten_of_twenty_four() {
        let all = rows(&(0..24).map(|i| i as f64).collect::<Vec<_>>());
        let report = Report::from_rows(&all, DEFAULT_WINDOW, 0);

        assert_eq!(report.rows().len(), 10);
        assert_eq!(report.rows()[0].date, all[14].date);
        assert_eq!(report.rows()[9].date, all[23].date);
        assert_eq!(data_lines(&report.render()).len(), 10);
    }

    #[test]
    fn short_series_shows_every_row() {
        let report = Report::from_rows(&rows(&[1.0, 2.0, 3.0]), DEFAULT_WINDOW, 0);
        assert_eq!(report.rows().len(), 3);
    }

    #[test]
    fn empty_series_renders_header_only() {
        let report = Report::from_rows(&[], DEFAULT_WINDOW, 0);
        assert_eq!(report.render(), "date  temp  humidity");
        assert!(report.extremes().is_empty());
    }

    #[test]
    fn numbers_have_exactly_one_decimal() {
        let report = Report::from_rows(&rows(&[21.0, 21.04, -3.456]), DEFAULT_WINDOW, 0);
        let text = report.render();

        assert!(text.contains("21.0"));
        assert!(!text.contains("21.04"));
        assert!(text.contains("-3.5"));
        assert!(text.contains("70.0"));
    }

    #[test]
    fn flags_min_and_max_rows() {
        let report = Report::from_rows(&rows(&[5.0, -1.0, 8.0, 3.0]), DEFAULT_WINDOW, 0);
        let lines = data_lines(&report.render())
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();

        assert!(lines[1].ends_with("  min"));
        assert!(lines[2].ends_with("  max"));
        assert!(!lines[0].ends_with("min") && !lines[0].ends_with("max"));
        assert!(!lines[3].ends_with("min") && !lines[3].ends_with("max"));
    }

    #[test]
    fn flagged_rows_bound_the_window() {
        let report = Report::from_rows(&rows(&[4.0, 9.5, 2.0, 9.5, 2.0, 7.0]), DEFAULT_WINDOW, 0);
        let extremes = report.extremes();

        for (row, extreme) in report.rows().iter().zip(&extremes) {
            match extreme {
                Some(Extreme::Max) => assert!(report.rows().iter().all(|o| row.temp >= o.temp)),
                Some(Extreme::Min) => assert!(report.rows().iter().all(|o| row.temp <= o.temp)),
                _ => {}
            }
        }
        // Ties flag every tied row.
        assert_eq!(extremes.iter().filter(|e| **e == Some(Extreme::Max)).count(), 2);
        assert_eq!(extremes.iter().filter(|e| **e == Some(Extreme::Min)).count(), 2);
    }

    #[test]
    fn constant_temperature_is_both_min_and_max() {
        let report = Report::from_rows(&rows(&[3.0, 3.0]), DEFAULT_WINDOW, 0);
        assert_eq!(report.extremes(), vec![Some(Extreme::MinMax); 2]);
        assert!(report.render().lines().nth(1).unwrap().ends_with("min max"));
    }

    #[test]
    fn extremes_only_consider_the_window() {
        // The global minimum sits outside the last two rows.
        let report = Report::from_rows(&rows(&[-20.0, 5.0, 6.0]), 2, 0);
        assert_eq!(report.extremes(), vec![Some(Extreme::Min), Some(Extreme::Max)]);
    }

    #[test]
    fn dates_use_location_offset() {
        let report = Report::from_rows(&rows(&[1.0]), DEFAULT_WINDOW, 7200);
        assert!(report.render().contains("2024-01-15 02:00"));
    }
}
