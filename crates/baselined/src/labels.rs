use baseline_core::MetricType;

/// Display metadata for a metric. Kept out of the core model so detection
/// never depends on presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricLabel {
    pub display_name: &'static str,
    pub unit: &'static str,
    pub precision: usize,
}

impl MetricLabel {
    pub fn format_value(&self, value: f64) -> String {
        format!("{value:.precision$} {}", self.unit, precision = self.precision)
    }
}

pub fn metric_label(metric: MetricType) -> MetricLabel {
    let (display_name, unit, precision) = match metric {
        MetricType::RestingHeartRate => ("Resting HR", "bpm", 0),
        MetricType::SleepDuration => ("Sleep Duration", "hr", 2),
        MetricType::OxygenSaturation => ("SpO₂", "%", 1),
        MetricType::Weight => ("Weight", "kg", 1),
        MetricType::Glucose => ("Glucose", "mg/dL", 0),
        MetricType::BloodPressureSystolic => ("BP Systolic", "mmHg", 0),
        MetricType::BloodPressureDiastolic => ("BP Diastolic", "mmHg", 0),
    };
    MetricLabel {
        display_name,
        unit,
        precision,
    }
}
