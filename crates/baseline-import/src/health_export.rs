use std::collections::HashMap;
use std::fs;
use std::path::Path;

use baseline_core::{MetricType, TimeSeriesPoint};

use crate::{ImportError, ImportOutcome, SeriesBuckets, parse_timestamp};

const RECORD_TAG: &str = "<Record";
const ZIP_SIGNATURE: &[u8] = b"PK\x03\x04";
const MMOL_TO_MG_DL: f64 = 18.0;
const LB_TO_KG: f64 = 0.453_592_37;

pub fn import_health_export(path: impl AsRef<Path>) -> Result<ImportOutcome, ImportError> {
    let path = path.as_ref();
    let is_zip = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
    if is_zip {
        return Err(zip_not_supported());
    }

    let outcome = parse_health_export_bytes(fs::read(path)?)?;
    tracing::info!(
        path = %path.display(),
        metrics = outcome.series.len(),
        points = outcome.point_count(),
        skipped = outcome.skipped.len(),
        "imported health export"
    );
    Ok(outcome)
}

pub fn parse_health_export_bytes(bytes: Vec<u8>) -> Result<ImportOutcome, ImportError> {
    if bytes.starts_with(ZIP_SIGNATURE) {
        return Err(zip_not_supported());
    }
    let text = String::from_utf8(bytes)?;
    Ok(parse_health_export(&text))
}

/// Scans `<Record .../>` elements. Record types outside the supported
/// metrics are ignored; supported records with bad dates or values are
/// reported as skipped rows.
pub fn parse_health_export(text: &str) -> ImportOutcome {
    let mut buckets = SeriesBuckets::default();
    let mut cursor = 0;
    let mut line = 1;

    while let Some(offset) = text[cursor..].find(RECORD_TAG) {
        let start = cursor + offset;
        line += text[cursor..start].matches('\n').count();
        let attrs_start = start + RECORD_TAG.len();
        let Some(end) = tag_end(text, attrs_start) else {
            buckets.skip(line, "unterminated Record element");
            break;
        };
        cursor = end + 1;

        let body = &text[attrs_start..end];
        if !body.starts_with(|ch: char| ch.is_whitespace() || ch == '/') {
            line += body.matches('\n').count();
            continue;
        }

        let attributes = parse_attributes(body.trim_end_matches('/'));
        if let Some((metric, point)) = record_point(&attributes, line, &mut buckets) {
            buckets.push(metric, point);
        }
        line += body.matches('\n').count();
    }

    buckets.finish()
}

/// Byte offset of the `>` closing a tag. A `>` inside a quoted attribute
/// value does not close it.
fn tag_end(text: &str, from: usize) -> Option<usize> {
    let mut quote = None;
    text.get(from..)?
        .char_indices()
        .find_map(|(idx, ch)| {
            match (quote, ch) {
                (None, '"' | '\'') => quote = Some(ch),
                (Some(open), _) if open == ch => quote = None,
                (None, '>') => return Some(from + idx),
                _ => {}
            }
            None
        })
}

fn record_point(
    attributes: &HashMap<String, String>,
    line: usize,
    buckets: &mut SeriesBuckets,
) -> Option<(MetricType, TimeSeriesPoint)> {
    let metric = metric_for_type(attributes.get("type")?)?;

    let Some(raw_date) = attributes.get("startDate") else {
        buckets.skip(line, format!("{metric} record without startDate"));
        return None;
    };
    let Some(timestamp) = parse_timestamp(raw_date) else {
        buckets.skip(line, format!("unparsable date '{raw_date}'"));
        return None;
    };
    let raw_value = attributes.get("value").map(String::as_str).unwrap_or_default();
    let value = match raw_value.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => {
            buckets.skip(line, format!("unparsable value '{raw_value}'"));
            return None;
        }
    };

    let unit = attributes
        .get("unit")
        .map(|unit| unit.to_ascii_lowercase())
        .unwrap_or_default();
    let value = match metric {
        MetricType::Glucose if unit.contains("mmol") => value * MMOL_TO_MG_DL,
        MetricType::Weight if unit.contains("lb") => value * LB_TO_KG,
        _ => value,
    };

    Some((metric, TimeSeriesPoint::new(timestamp, value)))
}

fn metric_for_type(record_type: &str) -> Option<MetricType> {
    match record_type {
        "HKQuantityTypeIdentifierRestingHeartRate" => Some(MetricType::RestingHeartRate),
        "HKQuantityTypeIdentifierOxygenSaturation" => Some(MetricType::OxygenSaturation),
        "HKQuantityTypeIdentifierBodyMass" => Some(MetricType::Weight),
        "HKQuantityTypeIdentifierBloodGlucose" => Some(MetricType::Glucose),
        "HKQuantityTypeIdentifierBloodPressureSystolic" => Some(MetricType::BloodPressureSystolic),
        "HKQuantityTypeIdentifierBloodPressureDiastolic" => {
            Some(MetricType::BloodPressureDiastolic)
        }
        // sleep analysis is a category record with no numeric value
        _ => None,
    }
}

fn parse_attributes(body: &str) -> HashMap<String, String> {
    let mut attributes = HashMap::new();
    let mut rest = body;

    loop {
        rest = rest.trim_start();
        let Some(eq) = rest.find('=') else {
            break;
        };
        let name = rest[..eq].trim();
        let after = rest[eq + 1..].trim_start();
        let Some(quote) = after.chars().next().filter(|ch| *ch == '"' || *ch == '\'') else {
            break;
        };
        let Some(close) = after[1..].find(quote) else {
            break;
        };
        attributes.insert(name.to_owned(), unescape(&after[1..1 + close]));
        rest = &after[close + 2..];
    }

    attributes
}

fn unescape(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn zip_not_supported() -> ImportError {
    ImportError::UnsupportedFormat(
        "zip archives are not supported; unzip the export and select export.xml".to_owned(),
    )
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn parse_attributes_handles_both_quote_styles_and_entities() {
        let attributes = parse_attributes(
            r#" type="HKQuantityTypeIdentifierBodyMass" sourceName='Scale &amp; Co' value = "70""#,
        );
        assert_eq!(
            attributes.get("type").map(String::as_str),
            Some("HKQuantityTypeIdentifierBodyMass")
        );
        assert_eq!(
            attributes.get("sourceName").map(String::as_str),
            Some("Scale & Co")
        );
        assert_eq!(attributes.get("value").map(String::as_str), Some("70"));
    }

    #[test]
    fn converts_mmol_glucose_and_pound_body_mass() {
        let outcome = parse_health_export(
            r#"<HealthData>
 <Record type="HKQuantityTypeIdentifierBloodGlucose" unit="mmol/L" startDate="2025-11-01 08:00:00 +0000" value="5.5"/>
 <Record type="HKQuantityTypeIdentifierBodyMass" unit="lb" startDate="2025-11-01T07:00:00Z" value="160"/>
</HealthData>"#,
        );

        assert!(outcome.skipped.is_empty());
        let glucose = outcome
            .series
            .iter()
            .find(|series| series.metric == MetricType::Glucose)
            .expect("glucose series");
        assert!((glucose.points[0].value - 99.0).abs() < 1e-9);
        assert_eq!(
            glucose.points[0].timestamp,
            Utc.with_ymd_and_hms(2025, 11, 1, 8, 0, 0)
                .single()
                .expect("valid timestamp")
        );

        let weight = outcome
            .series
            .iter()
            .find(|series| series.metric == MetricType::Weight)
            .expect("weight series");
        assert!((weight.points[0].value - 72.5747792).abs() < 1e-6);
    }

    #[test]
    fn unsupported_record_types_and_similar_tags_are_ignored() {
        let outcome = parse_health_export(
            r#"<RecordSet count="1">
<Record type="HKCategoryTypeIdentifierSleepAnalysis" startDate="2025-11-01T22:00:00Z" value="HKCategoryValueSleepAnalysisAsleep"/>
<Record type="HKQuantityTypeIdentifierStepCount" startDate="2025-11-01T22:00:00Z" value="1200"/>
</RecordSet>"#,
        );
        assert!(outcome.series.is_empty());
        assert!(outcome.skipped.is_empty());
    }

    #[test]
    fn bad_values_on_supported_records_are_reported_with_line_numbers() {
        let outcome = parse_health_export(
            "<HealthData>\n\
             <Record type=\"HKQuantityTypeIdentifierRestingHeartRate\" startDate=\"2025-11-01T07:00:00Z\" value=\"58\"/>\n\
             <Record type=\"HKQuantityTypeIdentifierRestingHeartRate\" startDate=\"someday\" value=\"58\"/>\n\
             <Record type=\"HKQuantityTypeIdentifierRestingHeartRate\" startDate=\"2025-11-02T07:00:00Z\"/>\n\
             </HealthData>",
        );

        assert_eq!(outcome.point_count(), 1);
        assert_eq!(
            outcome.skipped,
            vec![
                crate::MalformedRow {
                    line: 3,
                    reason: "unparsable date 'someday'".to_owned(),
                },
                crate::MalformedRow {
                    line: 4,
                    reason: "unparsable value ''".to_owned(),
                },
            ]
        );
    }

    #[test]
    fn raw_angle_brackets_inside_attribute_values_stay_in_the_tag() {
        let outcome = parse_health_export(
            r#"<HealthData>
<Record type="HKQuantityTypeIdentifierRestingHeartRate" sourceName="Watch > Phone" startDate="2025-11-01T07:00:00Z" value="61"/>
<Record type="HKQuantityTypeIdentifierRestingHeartRate" sourceName='a>b "c"' startDate="2025-11-02T07:00:00Z" value="63"/>
</HealthData>"#,
        );

        assert!(outcome.skipped.is_empty(), "{:?}", outcome.skipped);
        assert_eq!(outcome.point_count(), 2);
        assert_eq!(outcome.series[0].points[1].value, 63.0);
        assert_eq!(tag_end(r#"<Record a=">" b='>'/>"#, 7), Some(20));
        assert_eq!(tag_end(r#"<Record a=">"#, 7), None);
    }

    #[test]
    fn zip_payloads_are_rejected() {
        let err = parse_health_export_bytes(b"PK\x03\x04rest-of-archive".to_vec())
            .expect_err("zip should be rejected");
        assert!(matches!(err, ImportError::UnsupportedFormat(_)));
    }
}
