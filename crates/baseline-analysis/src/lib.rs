mod detector;
mod report;

use thiserror::Error;

pub use detector::{DriftOutcome, SkipReason, detect_drift, evaluate_drift};
pub use report::{DriftAnalyzer, DriftReport, DriftReportSummary, SkippedMetric};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("config error: {0}")]
    Config(#[from] baseline_config::ConfigError),
}
