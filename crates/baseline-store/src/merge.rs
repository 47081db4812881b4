use std::collections::BTreeMap;

use baseline_config::DedupGranularity;
use baseline_core::{MetricSeries, TimeSeriesPoint};
use chrono::{DateTime, Utc};

use crate::{IngestSummary, SeriesMap};

/// Merges `incoming` into a copy of `existing` and returns the updated map.
/// Metrics absent from `incoming` are carried over untouched.
pub fn merge_series(
    existing: &SeriesMap,
    incoming: &[MetricSeries],
    granularity: DedupGranularity,
) -> SeriesMap {
    let mut updated = existing.clone();
    merge_into(&mut updated, incoming, granularity);
    updated
}

pub(crate) fn merge_into(
    store: &mut SeriesMap,
    incoming: &[MetricSeries],
    granularity: DedupGranularity,
) -> IngestSummary {
    let mut summary = IngestSummary::default();

    for series in incoming {
        summary.points_received += series.points.len();
        let finite = series
            .points
            .iter()
            .filter(|point| point.value.is_finite())
            .copied()
            .collect::<Vec<_>>();
        let skipped = series.points.len() - finite.len();
        if skipped > 0 {
            tracing::warn!(
                metric = %series.metric,
                skipped,
                "dropping points with non-finite values"
            );
            summary.non_finite_skipped += skipped;
        }

        let existing = store
            .remove(&series.metric)
            .map(|stored| stored.points)
            .unwrap_or_default();
        let before = existing.len() + finite.len();
        let collapsed = group_points(existing, finite, granularity);
        let duplicates = before - collapsed.len();

        tracing::debug!(
            metric = %series.metric,
            points = collapsed.len(),
            duplicates,
            granularity = granularity.as_str(),
            "merged series"
        );

        summary.metrics_updated += 1;
        summary.duplicates_collapsed += duplicates;
        store.insert(series.metric, MetricSeries::new(series.metric, collapsed));
    }

    summary.points_stored = store.values().map(MetricSeries::len).sum();
    summary
}

#[derive(Debug, Clone)]
struct Bucket {
    timestamp: DateTime<Utc>,
    stored: Vec<f64>,
    incoming: Vec<f64>,
}

impl Bucket {
    fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            stored: Vec::new(),
            incoming: Vec::new(),
        }
    }

    /// An incoming group whose mean equals the stored value leaves the stored
    /// value as is, so re-ingesting a batch never drifts by rounding.
    fn value(&self) -> f64 {
        match (mean(&self.stored), mean(&self.incoming)) {
            (Some(stored), Some(incoming)) if stored != incoming => {
                mean(self.stored.iter().chain(&self.incoming)).unwrap_or(stored)
            }
            (Some(stored), _) => stored,
            (None, incoming) => incoming.unwrap_or_default(),
        }
    }
}

/// Groups points sharing a bucket key, averages each group and returns them
/// strictly ascending. A group keeps its earliest timestamp.
pub fn collapse_points(
    points: impl IntoIterator<Item = TimeSeriesPoint>,
    granularity: DedupGranularity,
) -> Vec<TimeSeriesPoint> {
    group_points(Vec::new(), points, granularity)
}

fn group_points(
    stored: impl IntoIterator<Item = TimeSeriesPoint>,
    incoming: impl IntoIterator<Item = TimeSeriesPoint>,
    granularity: DedupGranularity,
) -> Vec<TimeSeriesPoint> {
    let tagged = stored
        .into_iter()
        .map(|point| (point, true))
        .chain(incoming.into_iter().map(|point| (point, false)));

    let mut buckets = BTreeMap::<(i64, u32), Bucket>::new();
    for (point, from_store) in tagged {
        let bucket = buckets
            .entry(bucket_key(point.timestamp, granularity))
            .or_insert_with(|| Bucket::at(point.timestamp));
        bucket.timestamp = bucket.timestamp.min(point.timestamp);
        if from_store {
            bucket.stored.push(point.value);
        } else {
            bucket.incoming.push(point.value);
        }
    }

    buckets
        .into_values()
        .map(|bucket| TimeSeriesPoint::new(bucket.timestamp, bucket.value()))
        .collect()
}

/// Mean anchored at the first value. Equal values average to themselves
/// exactly.
fn mean<'a>(values: impl IntoIterator<Item = &'a f64>) -> Option<f64> {
    let mut values = values.into_iter();
    let first = *values.next()?;
    let (offset, count) = values.fold((0.0, 1_usize), |(offset, count), value| {
        (offset + (value - first), count + 1)
    });
    Some(first + offset / count as f64)
}

fn bucket_key(timestamp: DateTime<Utc>, granularity: DedupGranularity) -> (i64, u32) {
    match granularity {
        DedupGranularity::Exact => (timestamp.timestamp(), timestamp.timestamp_subsec_nanos()),
        DedupGranularity::Second => (timestamp.timestamp(), 0),
        DedupGranularity::Minute => (timestamp.timestamp().div_euclid(60), 0),
    }
}

#[cfg(test)]
mod tests {
    use baseline_core::MetricType;
    use chrono::{Duration, TimeZone};

    use super::*;

    fn at(hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, hour, minute, second)
            .single()
            .expect("valid timestamp")
    }

    fn point(timestamp: DateTime<Utc>, value: f64) -> TimeSeriesPoint {
        TimeSeriesPoint::new(timestamp, value)
    }

    fn values(points: &[TimeSeriesPoint]) -> Vec<f64> {
        points.iter().map(|point| point.value).collect()
    }

    #[test]
    fn identical_readings_collapse_to_one_point() {
        let collapsed = collapse_points(
            vec![point(at(8, 0, 0), 61.0), point(at(8, 0, 0), 61.0)],
            DedupGranularity::Exact,
        );
        assert_eq!(collapsed, vec![point(at(8, 0, 0), 61.0)]);
    }

    #[test]
    fn conflicting_readings_average() {
        let collapsed = collapse_points(
            vec![
                point(at(9, 0, 0), 70.0),
                point(at(8, 0, 0), 60.0),
                point(at(8, 0, 0), 63.0),
            ],
            DedupGranularity::Exact,
        );
        assert_eq!(values(&collapsed), vec![61.5, 70.0]);
        assert_eq!(collapsed[0].timestamp, at(8, 0, 0));
    }

    #[test]
    fn exact_granularity_keeps_sub_second_jitter_apart() {
        let base = at(8, 0, 0);
        let jittered = base + Duration::milliseconds(250);
        let exact = collapse_points(
            vec![point(base, 60.0), point(jittered, 62.0)],
            DedupGranularity::Exact,
        );
        assert_eq!(exact.len(), 2);

        let by_second = collapse_points(
            vec![point(jittered, 62.0), point(base, 60.0)],
            DedupGranularity::Second,
        );
        assert_eq!(by_second, vec![point(base, 61.0)]);
    }

    #[test]
    fn minute_granularity_uses_earliest_timestamp_in_bucket() {
        let collapsed = collapse_points(
            vec![
                point(at(8, 0, 45), 64.0),
                point(at(8, 0, 5), 60.0),
                point(at(8, 1, 0), 90.0),
            ],
            DedupGranularity::Minute,
        );
        assert_eq!(
            collapsed,
            vec![point(at(8, 0, 5), 62.0), point(at(8, 1, 0), 90.0)]
        );
    }

    #[test]
    fn equal_values_average_to_themselves() {
        for value in [0.1, 58.3, 7.15, 1e-300, -3.3] {
            assert_eq!(mean(&[value, value, value]), Some(value));
        }
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn stored_value_survives_a_matching_incoming_group() {
        let mut store = SeriesMap::new();
        let batch = [MetricSeries::new(
            MetricType::Weight,
            vec![
                point(at(7, 0, 0), 0.1),
                point(at(7, 0, 0), 0.2),
                point(at(7, 0, 0), 0.7),
            ],
        )];
        merge_into(&mut store, &batch, DedupGranularity::Exact);
        let first = store.clone();

        merge_into(&mut store, &batch, DedupGranularity::Exact);
        assert_eq!(store, first);

        merge_into(
            &mut store,
            &[MetricSeries::new(
                MetricType::Weight,
                vec![point(at(7, 0, 0), 1.0)],
            )],
            DedupGranularity::Exact,
        );
        let merged = store
            .get(&MetricType::Weight)
            .map(|series| values(&series.points))
            .expect("merged weight");
        let stored = first
            .get(&MetricType::Weight)
            .and_then(|series| series.latest())
            .map(|point| point.value)
            .expect("stored weight");
        assert_eq!(merged.len(), 1);
        assert!((merged[0] - (stored + 1.0) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn merge_series_leaves_unrelated_metrics_untouched() {
        let mut existing = SeriesMap::new();
        let weight = MetricSeries::new(MetricType::Weight, vec![point(at(7, 0, 0), 72.0)]);
        existing.insert(MetricType::Weight, weight.clone());

        let incoming = vec![MetricSeries::new(
            MetricType::Glucose,
            vec![point(at(7, 0, 0), 95.0)],
        )];
        let updated = merge_series(&existing, &incoming, DedupGranularity::Exact);

        assert_eq!(updated.get(&MetricType::Weight), Some(&weight));
        assert_eq!(updated.len(), 2);
        assert_eq!(existing.len(), 1);
    }

    #[test]
    fn non_finite_values_are_dropped_and_counted() {
        let mut store = SeriesMap::new();
        let summary = merge_into(
            &mut store,
            &[MetricSeries::new(
                MetricType::Glucose,
                vec![
                    point(at(7, 0, 0), f64::NAN),
                    point(at(7, 0, 0), 100.0),
                    point(at(8, 0, 0), f64::INFINITY),
                ],
            )],
            DedupGranularity::Exact,
        );

        assert_eq!(summary.non_finite_skipped, 2);
        assert_eq!(summary.points_received, 3);
        assert_eq!(summary.points_stored, 1);
        assert_eq!(
            store.get(&MetricType::Glucose).map(|series| values(&series.points)),
            Some(vec![100.0])
        );
    }
}
