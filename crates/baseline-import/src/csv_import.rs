use std::fs;
use std::path::Path;

use baseline_core::{MetricSeries, MetricType, TimeSeriesPoint};
use chrono::SecondsFormat;
use csv::{Position, ReaderBuilder, StringRecord, Terminator, Trim, WriterBuilder};

use crate::{ImportError, ImportOutcome, SeriesBuckets, parse_timestamp};

const CSV_HEADER: [&str; 3] = ["date", "metric", "value"];

pub fn import_csv(path: impl AsRef<Path>) -> Result<ImportOutcome, ImportError> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    let outcome = parse_csv_bytes(bytes)?;
    tracing::info!(
        path = %path.display(),
        metrics = outcome.series.len(),
        points = outcome.point_count(),
        skipped = outcome.skipped.len(),
        "imported CSV"
    );
    Ok(outcome)
}

pub fn parse_csv_bytes(bytes: Vec<u8>) -> Result<ImportOutcome, ImportError> {
    let text = String::from_utf8(bytes)?;
    Ok(parse_csv(&text))
}

/// Parses `date,metric,value` rows. A first record naming both `date` and
/// `metric` is treated as a header. Extra trailing fields are ignored.
pub fn parse_csv(text: &str) -> ImportOutcome {
    let mut buckets = SeriesBuckets::default();
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let mut first = true;
    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(err) => {
                buckets.skip(
                    line_at(text, err.position()),
                    format!("unreadable row: {err}"),
                );
                continue;
            }
        };
        if std::mem::take(&mut first) && is_header(&record) {
            continue;
        }
        let line_number = line_at(text, record.position());
        if let Some((metric, point)) = row_point(&record, line_number, &mut buckets) {
            buckets.push(metric, point);
        }
    }

    buckets.finish()
}

/// A record's position precedes any blank lines the reader skipped, so the
/// line is counted up to the first non-blank byte.
fn line_at(text: &str, position: Option<&Position>) -> usize {
    let start = position.map_or(0, |position| position.byte() as usize);
    let rest = text.get(start..).unwrap_or_default();
    let blank = rest.len() - rest.trim_start_matches(['\r', '\n']).len();
    1 + text
        .get(..start + blank)
        .unwrap_or_default()
        .matches('\n')
        .count()
}

fn is_header(record: &StringRecord) -> bool {
    let mut has_date = false;
    let mut has_metric = false;
    for field in record {
        let lowered = field.to_ascii_lowercase();
        has_date |= lowered.contains("date");
        has_metric |= lowered.contains("metric");
    }
    has_date && has_metric
}

fn row_point(
    record: &StringRecord,
    line_number: usize,
    buckets: &mut SeriesBuckets,
) -> Option<(MetricType, TimeSeriesPoint)> {
    let (Some(date), Some(metric), Some(value)) = (record.get(0), record.get(1), record.get(2))
    else {
        buckets.skip(
            line_number,
            format!("expected 3 fields, found {}", record.len()),
        );
        return None;
    };

    let metric = match metric.parse::<MetricType>() {
        Ok(metric) => metric,
        Err(reason) => {
            buckets.skip(line_number, reason);
            return None;
        }
    };
    let Some(timestamp) = parse_timestamp(date) else {
        buckets.skip(line_number, format!("unparsable date '{date}'"));
        return None;
    };
    let value = match value.parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => {
            buckets.skip(line_number, format!("unparsable value '{value}'"));
            return None;
        }
    };

    Some((metric, TimeSeriesPoint::new(timestamp, value)))
}

/// Renders a batch as `date,metric,value` rows with RFC 3339 UTC dates.
pub fn write_csv(series: &[MetricSeries]) -> Result<String, ImportError> {
    let mut writer = WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(CSV_HEADER)?;
    for current in series {
        for point in &current.points {
            let date = point.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true);
            let value = format!("{:.3}", point.value);
            writer.write_record([date.as_str(), current.metric.as_str(), value.as_str()])?;
        }
    }

    let bytes = writer.into_inner().map_err(|err| err.into_error())?;
    Ok(String::from_utf8(bytes)?)
}
