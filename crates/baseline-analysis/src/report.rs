use std::path::Path;

use baseline_config::{DriftConfig, load_workspace_config};
use baseline_core::{DriftDirection, DriftEvent, MetricSeries, MetricType};
use baseline_store::Store;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::AnalysisError;
use crate::detector::{DriftOutcome, SkipReason, evaluate_drift};

const DRIFT_REPORT_SCHEMA_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DriftReportSummary {
    pub metrics_analyzed: u32,
    pub drifts_detected: u32,
    pub upward: u32,
    pub downward: u32,
    pub with_data_warnings: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedMetric {
    pub metric: MetricType,
    #[serde(flatten)]
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    pub schema_version: String,
    pub analyzed_at: DateTime<Utc>,
    pub config: DriftConfig,
    pub summary: DriftReportSummary,
    pub events: Vec<DriftEvent>,
    pub skipped: Vec<SkippedMetric>,
}

#[derive(Debug, Clone)]
pub struct DriftAnalyzer {
    config: DriftConfig,
}

impl DriftAnalyzer {
    pub fn new(workspace: impl AsRef<Path>) -> Result<Self, AnalysisError> {
        let config = load_workspace_config(workspace.as_ref())?;
        Ok(Self {
            config: config.drift,
        })
    }

    pub fn with_config(config: DriftConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DriftConfig {
        &self.config
    }

    pub fn detect(&self, series: &MetricSeries) -> Option<DriftEvent> {
        crate::detector::detect_drift(series, &self.config)
    }

    pub fn report(&self, store: &impl Store) -> DriftReport {
        self.report_series(store.all_series())
    }

    /// Runs detection once per series. Each call is independent, so the
    /// event set does not depend on iteration order; only the final sort does.
    pub fn report_series<'a>(
        &self,
        series: impl IntoIterator<Item = &'a MetricSeries>,
    ) -> DriftReport {
        let mut summary = DriftReportSummary::default();
        let mut events = Vec::new();
        let mut skipped = Vec::new();

        for current in series {
            summary.metrics_analyzed += 1;
            match evaluate_drift(current, &self.config) {
                DriftOutcome::Detected(event) => {
                    tracing::info!(
                        metric = %event.metric,
                        direction = event.direction.as_str(),
                        z_score = event.z_score,
                        "drift detected"
                    );
                    events.push(event);
                }
                DriftOutcome::Skipped(reason) => {
                    tracing::debug!(
                        metric = %current.metric,
                        reason = reason.as_str(),
                        "no drift"
                    );
                    skipped.push(SkippedMetric {
                        metric: current.metric,
                        reason,
                    });
                }
            }
        }

        events.sort_by(|left, right| {
            left.event_date
                .cmp(&right.event_date)
                .then_with(|| left.metric.cmp(&right.metric))
        });
        skipped.sort_by(|left, right| left.metric.cmp(&right.metric));

        summary.drifts_detected = events.len() as u32;
        summary.upward = events
            .iter()
            .filter(|event| event.direction == DriftDirection::Up)
            .count() as u32;
        summary.downward = summary.drifts_detected - summary.upward;
        summary.with_data_warnings = events
            .iter()
            .filter(|event| event.missing_data_warning.is_some())
            .count() as u32;

        DriftReport {
            schema_version: DRIFT_REPORT_SCHEMA_VERSION.to_owned(),
            analyzed_at: Utc::now(),
            config: self.config.clone(),
            summary,
            events,
            skipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use baseline_config::{baseline_dir, config_path};
    use baseline_core::TimeSeriesPoint;
    use baseline_store::MemoryStore;
    use chrono::{Duration, TimeZone};
    use tempfile::tempdir;

    use super::*;

    fn day(offset: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0)
            .single()
            .expect("valid timestamp")
            + Duration::days(offset)
    }

    /// Daily series ending `end_offset` days after the epoch day, stepping by
    /// `shift` for the last eight readings.
    fn stepped(metric: MetricType, base: f64, shift: f64, end_offset: i64) -> MetricSeries {
        let start = end_offset - 29;
        let points = (start..=end_offset)
            .map(|offset| {
                let noise = if offset % 2 == 0 { -0.5 } else { 0.5 };
                let level = if offset > end_offset - 8 { base + shift } else { base };
                TimeSeriesPoint::new(day(offset), level + noise)
            })
            .collect();
        MetricSeries::new(metric, points)
    }

    #[test]
    fn report_collects_events_sorted_by_event_date() {
        let mut store = MemoryStore::default();
        store.ingest(&[
            stepped(MetricType::Weight, 72.0, 3.0, 40),
            stepped(MetricType::RestingHeartRate, 58.0, 8.0, 35),
            stepped(MetricType::SleepDuration, 7.2, -1.5, 38),
            stepped(MetricType::Glucose, 95.0, 0.0, 30),
            MetricSeries::new(
                MetricType::OxygenSaturation,
                vec![TimeSeriesPoint::new(day(0), 97.0)],
            ),
        ]);

        let report = DriftAnalyzer::with_config(DriftConfig::default()).report(&store);

        let order = report
            .events
            .iter()
            .map(|event| event.metric)
            .collect::<Vec<_>>();
        assert_eq!(
            order,
            vec![
                MetricType::RestingHeartRate,
                MetricType::SleepDuration,
                MetricType::Weight,
            ]
        );
        assert_eq!(
            report.summary,
            DriftReportSummary {
                metrics_analyzed: 5,
                drifts_detected: 3,
                upward: 2,
                downward: 1,
                with_data_warnings: 0,
            }
        );
        assert_eq!(
            report
                .skipped
                .iter()
                .map(|entry| (entry.metric, entry.reason.as_str()))
                .collect::<Vec<_>>(),
            vec![
                (MetricType::OxygenSaturation, "too_few_points"),
                (MetricType::Glucose, "below_threshold"),
            ]
        );
        assert_eq!(report.schema_version, "1.0");
    }

    #[test]
    fn events_on_the_same_date_are_ordered_by_metric() {
        let series = [
            stepped(MetricType::BloodPressureDiastolic, 76.0, 6.0, 30),
            stepped(MetricType::BloodPressureSystolic, 118.0, 10.0, 30),
        ];
        let analyzer = DriftAnalyzer::with_config(DriftConfig::default());

        let forward = analyzer.report_series(series.iter());
        let backward = analyzer.report_series(series.iter().rev());

        assert_eq!(forward.events, backward.events);
        assert_eq!(
            forward.events.first().map(|event| event.metric),
            Some(MetricType::BloodPressureSystolic)
        );
    }

    #[test]
    fn analyzer_reads_thresholds_from_workspace_config() {
        let temp = tempdir().expect("tempdir");
        fs::create_dir_all(baseline_dir(temp.path())).expect("create .baseline");
        fs::write(config_path(temp.path()), "[drift]\nz_threshold = 50.0\n").expect("write config");

        let analyzer = DriftAnalyzer::new(temp.path()).expect("analyzer");
        assert_eq!(analyzer.config().z_threshold, 50.0);
        assert!(
            analyzer
                .detect(&stepped(MetricType::RestingHeartRate, 58.0, 8.0, 30))
                .is_none()
        );

        let lenient = DriftAnalyzer::with_config(DriftConfig::default());
        assert!(
            lenient
                .detect(&stepped(MetricType::RestingHeartRate, 58.0, 8.0, 30))
                .is_some()
        );
    }

    #[test]
    fn analyzer_surfaces_config_parse_errors() {
        let temp = tempdir().expect("tempdir");
        fs::create_dir_all(baseline_dir(temp.path())).expect("create .baseline");
        fs::write(config_path(temp.path()), "[drift\n").expect("write config");

        let err = DriftAnalyzer::new(temp.path()).expect_err("invalid TOML should fail");
        assert!(matches!(err, AnalysisError::Config(_)));
    }

    #[test]
    fn report_serializes_skip_reasons_inline() {
        let analyzer = DriftAnalyzer::with_config(DriftConfig::default());
        let short = MetricSeries::new(
            MetricType::Glucose,
            (0..4)
                .map(|offset| TimeSeriesPoint::new(day(offset), 100.0))
                .collect(),
        );
        let report = analyzer.report_series([&short]);
        let value = serde_json::to_value(&report).expect("serialize report");

        assert_eq!(value["skipped"][0]["metric"], "glucose");
        assert_eq!(value["skipped"][0]["reason"], "too_few_points");
        assert_eq!(value["skipped"][0]["count"], 4);
        assert_eq!(value["events"].as_array().map(Vec::len), Some(0));
    }
}
