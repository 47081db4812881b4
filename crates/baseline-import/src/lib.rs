use std::collections::BTreeMap;
use std::fmt;

use baseline_core::{MetricSeries, MetricType, TimeSeriesPoint};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;

mod csv_import;
mod demo;
mod health_export;

pub use csv_import::{import_csv, parse_csv, parse_csv_bytes, write_csv};
pub use demo::{DemoOptions, sample_csv, sample_series};
pub use health_export::{import_health_export, parse_health_export, parse_health_export_bytes};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRow {
    pub line: usize,
    pub reason: String,
}

impl fmt::Display for MalformedRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.reason)
    }
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("input is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("malformed row at {0}")]
    MalformedRow(MalformedRow),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImportOutcome {
    pub series: Vec<MetricSeries>,
    pub skipped: Vec<MalformedRow>,
}

impl ImportOutcome {
    pub fn point_count(&self) -> usize {
        self.series.iter().map(MetricSeries::len).sum()
    }

    /// Fails on the first skipped row instead of tolerating it.
    pub fn into_strict(self) -> Result<Vec<MetricSeries>, ImportError> {
        match self.skipped.into_iter().next() {
            Some(row) => Err(ImportError::MalformedRow(row)),
            None => Ok(self.series),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct SeriesBuckets {
    points: BTreeMap<MetricType, Vec<TimeSeriesPoint>>,
    skipped: Vec<MalformedRow>,
}

impl SeriesBuckets {
    pub(crate) fn push(&mut self, metric: MetricType, point: TimeSeriesPoint) {
        self.points.entry(metric).or_default().push(point);
    }

    pub(crate) fn skip(&mut self, line: usize, reason: impl Into<String>) {
        let row = MalformedRow {
            line,
            reason: reason.into(),
        };
        tracing::warn!(line = row.line, reason = %row.reason, "skipping malformed row");
        self.skipped.push(row);
    }

    pub(crate) fn finish(self) -> ImportOutcome {
        ImportOutcome {
            series: self
                .points
                .into_iter()
                .map(|(metric, points)| MetricSeries::new(metric, points))
                .collect(),
            skipped: self.skipped,
        }
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS ±HHMM`, and naive
/// `YYYY-MM-DD[ HH:MM[:SS]]` values. Naive values are read as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S %z") {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn parse_timestamp_supports_rfc3339_offsets_and_naive_dates() {
        let expected = Utc
            .with_ymd_and_hms(2025, 11, 1, 7, 30, 0)
            .single()
            .expect("valid timestamp");

        assert_eq!(parse_timestamp("2025-11-01T07:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2025-11-01T08:30:00+01:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-11-01 00:30:00 -0700"), Some(expected));
        assert_eq!(parse_timestamp("2025-11-01 07:30"), Some(expected));
        assert_eq!(parse_timestamp(" 2025-11-01 07:30:00 "), Some(expected));
        assert_eq!(
            parse_timestamp("2025-11-01"),
            Utc.with_ymd_and_hms(2025, 11, 1, 0, 0, 0).single()
        );
        assert_eq!(parse_timestamp("11/01/2025"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn strict_outcome_fails_on_first_skipped_row() {
        let outcome = ImportOutcome {
            series: Vec::new(),
            skipped: vec![
                MalformedRow {
                    line: 3,
                    reason: "unknown metric 'steps'".to_owned(),
                },
                MalformedRow {
                    line: 9,
                    reason: "missing value".to_owned(),
                },
            ],
        };

        let err = outcome.into_strict().expect_err("strict import should fail");
        assert_eq!(
            err.to_string(),
            "malformed row at line 3: unknown metric 'steps'"
        );
        assert!(ImportOutcome::default().into_strict().is_ok());
    }
}
