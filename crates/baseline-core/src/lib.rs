use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DRIFT_METHOD: &str = "baseline-comparison";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    RestingHeartRate,
    SleepDuration,
    OxygenSaturation,
    Weight,
    Glucose,
    BloodPressureSystolic,
    BloodPressureDiastolic,
}

impl MetricType {
    pub const ALL: [MetricType; 7] = [
        Self::RestingHeartRate,
        Self::SleepDuration,
        Self::OxygenSaturation,
        Self::Weight,
        Self::Glucose,
        Self::BloodPressureSystolic,
        Self::BloodPressureDiastolic,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::RestingHeartRate => "resting_heart_rate",
            Self::SleepDuration => "sleep_duration",
            Self::OxygenSaturation => "oxygen_saturation",
            Self::Weight => "weight",
            Self::Glucose => "glucose",
            Self::BloodPressureSystolic => "blood_pressure_systolic",
            Self::BloodPressureDiastolic => "blood_pressure_diastolic",
        }
    }
}

impl std::fmt::Display for MetricType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MetricType {
    type Err = String;

    /// Accepts the snake_case identifiers and the camelCase spellings used by
    /// older exports (`restingHeartRate`).
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value
            .trim()
            .chars()
            .filter(|ch| *ch != '_' && *ch != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "restingheartrate" => Ok(Self::RestingHeartRate),
            "sleepduration" => Ok(Self::SleepDuration),
            "oxygensaturation" => Ok(Self::OxygenSaturation),
            "weight" => Ok(Self::Weight),
            "glucose" => Ok(Self::Glucose),
            "bloodpressuresystolic" => Ok(Self::BloodPressureSystolic),
            "bloodpressurediastolic" => Ok(Self::BloodPressureDiastolic),
            _ => Err(format!("unknown metric '{}'", value.trim())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl TimeSeriesPoint {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Points are kept strictly ascending by timestamp once a series has been
/// through the store; series handed in by importers may be unordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    pub metric: MetricType,
    pub points: Vec<TimeSeriesPoint>,
}

impl MetricSeries {
    pub fn new(metric: MetricType, points: Vec<TimeSeriesPoint>) -> Self {
        Self { metric, points }
    }

    pub fn empty(metric: MetricType) -> Self {
        Self::new(metric, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn is_sorted(&self) -> bool {
        self.points
            .windows(2)
            .all(|pair| pair[0].timestamp < pair[1].timestamp)
    }

    pub fn sorted_points(&self) -> Vec<TimeSeriesPoint> {
        let mut points = self.points.clone();
        points.sort_by_key(|point| point.timestamp);
        points
    }

    pub fn latest(&self) -> Option<&TimeSeriesPoint> {
        self.points.iter().max_by_key(|point| point.timestamp)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftDirection {
    Up,
    Down,
}

impl DriftDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Self::Up => "increased",
            Self::Down => "decreased",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftEvent {
    pub metric: MetricType,
    pub event_date: DateTime<Utc>,
    pub direction: DriftDirection,
    pub magnitude: f64,
    pub before_mean: f64,
    pub after_mean: f64,
    pub confidence: f64,
    pub method: String,
    pub z_score: f64,
    pub percent_change: f64,
    pub data_density: f64,
    pub start_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_data_warning: Option<String>,
}

impl DriftEvent {
    pub fn summary(&self, label: &str) -> String {
        format!(
            "{label} {} by {:.1}%",
            self.direction.verb(),
            self.percent_change.abs()
        )
    }

    pub fn explanation(&self, label: &str, z_threshold: f64) -> String {
        let mut lines = vec![
            format!("What changed: {label} {} from baseline", self.direction.verb()),
            format!(
                "When it started: around {}",
                self.start_date.format("%Y-%m-%d")
            ),
            format!(
                "How big: {:.1}% change (z-score: {:.2})",
                self.percent_change.abs(),
                self.z_score
            ),
            format!("Why flagged: |z| >= {z_threshold:.1} against the baseline window"),
        ];
        if let Some(warning) = &self.missing_data_warning {
            lines.push(format!("Data warning: {warning}"));
        }
        lines.join("\n")
    }
}
