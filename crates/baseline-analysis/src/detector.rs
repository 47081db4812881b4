use std::borrow::Cow;

use baseline_config::DriftConfig;
use baseline_core::{DRIFT_METHOD, DriftDirection, DriftEvent, MetricSeries, TimeSeriesPoint};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

const MIN_RECENT_POINTS: usize = 3;
const MIN_BASELINE_STD: f64 = 0.001;
const CONFIDENCE_Z_SATURATION: f64 = 4.0;
const SPARSE_RECENT_DENSITY: f64 = 0.5;
const SPARSE_BASELINE_DENSITY: f64 = 0.3;
const MILLIS_PER_DAY: f64 = 86_400_000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    TooFewPoints { count: usize, required: usize },
    SparseRecentWindow { count: usize, required: usize },
    SparseBaselineWindow { count: usize, required: usize },
    BelowThreshold { z_score: f64, threshold: f64 },
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TooFewPoints { .. } => "too_few_points",
            Self::SparseRecentWindow { .. } => "sparse_recent_window",
            Self::SparseBaselineWindow { .. } => "sparse_baseline_window",
            Self::BelowThreshold { .. } => "below_threshold",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DriftOutcome {
    Detected(DriftEvent),
    Skipped(SkipReason),
}

impl DriftOutcome {
    pub fn into_event(self) -> Option<DriftEvent> {
        match self {
            Self::Detected(event) => Some(event),
            Self::Skipped(_) => None,
        }
    }
}

/// Compares the trailing recent window of `series` against the baseline
/// window that precedes it. Returns at most one event.
pub fn detect_drift(series: &MetricSeries, config: &DriftConfig) -> Option<DriftEvent> {
    match evaluate_drift(series, config) {
        DriftOutcome::Detected(event) => {
            tracing::info!(
                metric = %event.metric,
                direction = event.direction.as_str(),
                z_score = event.z_score,
                confidence = event.confidence,
                "drift detected"
            );
            Some(event)
        }
        DriftOutcome::Skipped(reason) => {
            tracing::debug!(metric = %series.metric, reason = reason.as_str(), "no drift");
            None
        }
    }
}

pub fn evaluate_drift(series: &MetricSeries, config: &DriftConfig) -> DriftOutcome {
    let points: Cow<'_, [TimeSeriesPoint]> = if series.is_sorted() {
        Cow::Borrowed(series.points.as_slice())
    } else {
        Cow::Owned(series.sorted_points())
    };

    if points.len() < config.min_data_points {
        return DriftOutcome::Skipped(SkipReason::TooFewPoints {
            count: points.len(),
            required: config.min_data_points,
        });
    }
    let Some(latest) = points.last().map(|point| point.timestamp) else {
        return DriftOutcome::Skipped(SkipReason::TooFewPoints {
            count: 0,
            required: config.min_data_points,
        });
    };

    let recent_start = window_start(latest, config.recent_window_days);
    let baseline_start = window_start(latest, config.baseline_window_days);

    let recent = points
        .iter()
        .filter(|point| point.timestamp >= recent_start)
        .collect::<Vec<_>>();
    let baseline = points
        .iter()
        .filter(|point| point.timestamp >= baseline_start && point.timestamp < recent_start)
        .map(|point| point.value)
        .collect::<Vec<_>>();

    if recent.len() < MIN_RECENT_POINTS {
        return DriftOutcome::Skipped(SkipReason::SparseRecentWindow {
            count: recent.len(),
            required: MIN_RECENT_POINTS,
        });
    }
    if baseline.len() < config.min_data_points {
        return DriftOutcome::Skipped(SkipReason::SparseBaselineWindow {
            count: baseline.len(),
            required: config.min_data_points,
        });
    }

    let recent_values = recent.iter().map(|point| point.value).collect::<Vec<_>>();
    let baseline_mean = mean(&baseline);
    let baseline_std = population_std(&baseline);
    let recent_mean = mean(&recent_values);

    let z_score = if baseline_std > MIN_BASELINE_STD {
        (recent_mean - baseline_mean) / baseline_std
    } else {
        0.0
    };
    let percent_change = if baseline_mean != 0.0 {
        (recent_mean - baseline_mean) / baseline_mean.abs() * 100.0
    } else {
        0.0
    };

    let data_density = coverage(recent.len(), config.recent_window_days);
    let baseline_density = coverage(
        baseline.len(),
        config.baseline_window_days - config.recent_window_days,
    );

    let missing_data_warning = if data_density < SPARSE_RECENT_DENSITY {
        Some(format!(
            "Limited recent data ({} points in last {} days)",
            recent.len(),
            config.recent_window_days
        ))
    } else if baseline_density < SPARSE_BASELINE_DENSITY {
        Some(format!(
            "Sparse baseline data ({} points in baseline)",
            baseline.len()
        ))
    } else {
        None
    };

    if z_score.abs() < config.z_threshold {
        return DriftOutcome::Skipped(SkipReason::BelowThreshold {
            z_score,
            threshold: config.z_threshold,
        });
    }

    let direction = if z_score > 0.0 {
        DriftDirection::Up
    } else {
        DriftDirection::Down
    };
    let start_date = recent.first().map_or(latest, |point| point.timestamp);
    let confidence = (z_score.abs() / CONFIDENCE_Z_SATURATION).min(1.0)
        * (0.5 + 0.5 * data_density.min(baseline_density));

    DriftOutcome::Detected(DriftEvent {
        metric: series.metric,
        event_date: latest,
        direction,
        magnitude: (recent_mean - baseline_mean).abs(),
        before_mean: baseline_mean,
        after_mean: recent_mean,
        confidence,
        method: DRIFT_METHOD.to_owned(),
        z_score,
        percent_change,
        data_density,
        start_date,
        missing_data_warning,
    })
}

/// Windows reaching past the representable range start at the earliest
/// representable instant.
fn window_start(latest: DateTime<Utc>, days: f64) -> DateTime<Utc> {
    TimeDelta::try_milliseconds((days * MILLIS_PER_DAY).round() as i64)
        .and_then(|span| latest.checked_sub_signed(span))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Fraction of the expected one-reading-per-day coverage, capped at 1.
/// A non-positive span counts as fully covered.
fn coverage(count: usize, expected_days: f64) -> f64 {
    if expected_days <= 0.0 {
        return 1.0;
    }
    (count as f64 / expected_days).min(1.0)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = mean(values);
    let variance =
        values.iter().map(|value| (value - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}
