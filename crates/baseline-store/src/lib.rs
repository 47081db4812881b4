use std::collections::BTreeMap;

use baseline_config::{DedupGranularity, MergeConfig};
use baseline_core::{MetricSeries, MetricType};
use serde::{Deserialize, Serialize};

mod merge;

pub use merge::{collapse_points, merge_series};

pub type SeriesMap = BTreeMap<MetricType, MetricSeries>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct IngestSummary {
    pub metrics_updated: usize,
    pub points_received: usize,
    pub points_stored: usize,
    pub duplicates_collapsed: usize,
    pub non_finite_skipped: usize,
}

impl IngestSummary {
    pub fn absorb(&mut self, other: IngestSummary) {
        self.metrics_updated += other.metrics_updated;
        self.points_received += other.points_received;
        self.duplicates_collapsed += other.duplicates_collapsed;
        self.non_finite_skipped += other.non_finite_skipped;
        self.points_stored = other.points_stored;
    }
}

pub trait Store {
    fn ingest(&mut self, batch: &[MetricSeries]) -> IngestSummary;
    fn series(&self, metric: MetricType) -> Option<&MetricSeries>;
    fn all_series(&self) -> Vec<&MetricSeries>;
    fn clear(&mut self);
}

/// Session-scoped series store. Every stored series is strictly ascending by
/// timestamp.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    series: SeriesMap,
    granularity: DedupGranularity,
}

impl MemoryStore {
    pub fn new(granularity: DedupGranularity) -> Self {
        Self {
            series: SeriesMap::new(),
            granularity,
        }
    }

    pub fn from_config(config: &MergeConfig) -> Self {
        Self::new(config.granularity)
    }

    pub fn granularity(&self) -> DedupGranularity {
        self.granularity
    }

    pub fn snapshot(&self) -> &SeriesMap {
        &self.series
    }

    pub fn metric_count(&self) -> usize {
        self.series.len()
    }
}

impl Store for MemoryStore {
    fn ingest(&mut self, batch: &[MetricSeries]) -> IngestSummary {
        merge::merge_into(&mut self.series, batch, self.granularity)
    }

    fn series(&self, metric: MetricType) -> Option<&MetricSeries> {
        self.series.get(&metric)
    }

    fn all_series(&self) -> Vec<&MetricSeries> {
        self.series.values().collect()
    }

    fn clear(&mut self) {
        self.series.clear();
    }
}
