use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const BASELINE_DIR_NAME: &str = ".baseline";
pub const CONFIG_FILE_NAME: &str = "config.toml";

pub const DEFAULT_BASELINE_WINDOW_DAYS: f64 = 30.0;
pub const DEFAULT_RECENT_WINDOW_DAYS: f64 = 7.0;
pub const DEFAULT_Z_THRESHOLD: f64 = 2.0;
pub const DEFAULT_MIN_DATA_POINTS: usize = 5;
pub const DEFAULT_MIN_SEPARATION_DAYS: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DedupGranularity {
    #[default]
    Exact,
    Second,
    Minute,
}

impl DedupGranularity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Second => "second",
            Self::Minute => "minute",
        }
    }
}

impl std::str::FromStr for DedupGranularity {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "exact" => Ok(Self::Exact),
            "second" => Ok(Self::Second),
            "minute" => Ok(Self::Minute),
            other => Err(format!(
                "invalid dedup granularity '{other}', expected one of: exact, second, minute"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BaselineConfig {
    #[serde(default)]
    pub drift: DriftConfig,
    #[serde(default)]
    pub merge: MergeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftConfig {
    #[serde(default = "default_baseline_window_days")]
    pub baseline_window_days: f64,
    #[serde(default = "default_recent_window_days")]
    pub recent_window_days: f64,
    #[serde(default = "default_z_threshold")]
    pub z_threshold: f64,
    #[serde(default = "default_min_data_points")]
    pub min_data_points: usize,
    /// Carried for spacing repeated events apart; detection does not read it.
    #[serde(default = "default_min_separation_days")]
    pub min_separation_days: f64,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            baseline_window_days: DEFAULT_BASELINE_WINDOW_DAYS,
            recent_window_days: DEFAULT_RECENT_WINDOW_DAYS,
            z_threshold: DEFAULT_Z_THRESHOLD,
            min_data_points: DEFAULT_MIN_DATA_POINTS,
            min_separation_days: DEFAULT_MIN_SEPARATION_DAYS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MergeConfig {
    #[serde(default)]
    pub granularity: DedupGranularity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("failed to serialize config TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

pub fn baseline_dir(workspace_root: impl AsRef<Path>) -> PathBuf {
    workspace_root.as_ref().join(BASELINE_DIR_NAME)
}

pub fn config_path(workspace_root: impl AsRef<Path>) -> PathBuf {
    baseline_dir(workspace_root).join(CONFIG_FILE_NAME)
}

pub fn load_workspace_config(
    workspace_root: impl AsRef<Path>,
) -> Result<BaselineConfig, ConfigError> {
    let path = config_path(workspace_root);
    if !path.exists() {
        return Ok(BaselineConfig::default());
    }

    let raw = fs::read_to_string(path)?;
    let parsed: BaselineConfig = toml::from_str(&raw)?;
    Ok(normalize_config(parsed))
}

pub fn ensure_workspace_config(
    workspace_root: impl AsRef<Path>,
) -> Result<BaselineConfig, ConfigError> {
    let workspace_root = workspace_root.as_ref();
    fs::create_dir_all(baseline_dir(workspace_root))?;

    let path = config_path(workspace_root);
    if path.exists() {
        return load_workspace_config(workspace_root);
    }

    let config = BaselineConfig::default();
    let content = toml::to_string_pretty(&config)?;
    fs::write(path, content)?;

    Ok(config)
}

pub fn validate_config(config: &BaselineConfig) -> Vec<ConfigWarning> {
    let drift = &config.drift;
    let mut warnings = Vec::new();

    if drift.recent_window_days >= drift.baseline_window_days {
        warnings.push(ConfigWarning {
            code: "drift.empty_baseline_window",
            message: format!(
                "recent_window_days ({}) is not shorter than baseline_window_days ({}); no baseline points can be selected",
                drift.recent_window_days, drift.baseline_window_days
            ),
        });
    }
    if drift.min_data_points < 2 {
        warnings.push(ConfigWarning {
            code: "drift.min_data_points_low",
            message: format!(
                "min_data_points = {} yields a degenerate baseline standard deviation",
                drift.min_data_points
            ),
        });
    }
    if drift.min_separation_days != DEFAULT_MIN_SEPARATION_DAYS {
        warnings.push(ConfigWarning {
            code: "drift.min_separation_unused",
            message: "min_separation_days is recorded but not applied by detection".to_owned(),
        });
    }

    warnings
}

fn default_baseline_window_days() -> f64 {
    DEFAULT_BASELINE_WINDOW_DAYS
}

fn default_recent_window_days() -> f64 {
    DEFAULT_RECENT_WINDOW_DAYS
}

fn default_z_threshold() -> f64 {
    DEFAULT_Z_THRESHOLD
}

fn default_min_data_points() -> usize {
    DEFAULT_MIN_DATA_POINTS
}

fn default_min_separation_days() -> f64 {
    DEFAULT_MIN_SEPARATION_DAYS
}

fn positive_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        fallback
    }
}

fn normalize_config(mut config: BaselineConfig) -> BaselineConfig {
    let drift = &mut config.drift;
    drift.baseline_window_days =
        positive_or(drift.baseline_window_days, DEFAULT_BASELINE_WINDOW_DAYS);
    drift.recent_window_days = positive_or(drift.recent_window_days, DEFAULT_RECENT_WINDOW_DAYS);
    drift.z_threshold = positive_or(drift.z_threshold, DEFAULT_Z_THRESHOLD);
    if !drift.min_separation_days.is_finite() || drift.min_separation_days < 0.0 {
        drift.min_separation_days = DEFAULT_MIN_SEPARATION_DAYS;
    }

    config
}
