use baseline_core::{MetricSeries, MetricType, TimeSeriesPoint};
use chrono::{Days, NaiveDate};

use crate::{ImportError, write_csv};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoOptions {
    pub days: u32,
    pub shift_days: u32,
    pub seed: u64,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            days: 120,
            shift_days: 6,
            seed: 42,
        }
    }
}

struct Profile {
    metric: MetricType,
    base: f64,
    shift: f64,
    noise: f64,
    floor: f64,
    ceiling: f64,
}

const PROFILES: [Profile; 7] = [
    Profile {
        metric: MetricType::RestingHeartRate,
        base: 58.0,
        shift: 8.0,
        noise: 2.0,
        floor: 40.0,
        ceiling: f64::MAX,
    },
    Profile {
        metric: MetricType::SleepDuration,
        base: 7.2,
        shift: -1.0,
        noise: 0.25,
        floor: 3.0,
        ceiling: f64::MAX,
    },
    Profile {
        metric: MetricType::OxygenSaturation,
        base: 97.0,
        shift: -1.5,
        noise: 0.3,
        floor: 90.0,
        ceiling: 100.0,
    },
    Profile {
        metric: MetricType::Weight,
        base: 72.0,
        shift: 3.0,
        noise: 0.4,
        floor: 40.0,
        ceiling: f64::MAX,
    },
    Profile {
        metric: MetricType::Glucose,
        base: 95.0,
        shift: 20.0,
        noise: 5.0,
        floor: 60.0,
        ceiling: f64::MAX,
    },
    Profile {
        metric: MetricType::BloodPressureSystolic,
        base: 118.0,
        shift: 10.0,
        noise: 4.0,
        floor: 80.0,
        ceiling: f64::MAX,
    },
    Profile {
        metric: MetricType::BloodPressureDiastolic,
        base: 76.0,
        shift: 6.0,
        noise: 3.0,
        floor: 50.0,
        ceiling: f64::MAX,
    },
];

/// One noon reading per day for every metric, ending on `end`. The last
/// `shift_days` readings carry each metric's step shift.
pub fn sample_series(end: NaiveDate, options: DemoOptions) -> Vec<MetricSeries> {
    let mut rng = fastrand::Rng::with_seed(options.seed);
    let first_shifted = options.days.saturating_sub(options.shift_days);
    let dates = (0..options.days)
        .filter_map(|index| {
            let back = u64::from(options.days - 1 - index);
            end.checked_sub_days(Days::new(back))
                .and_then(|date| date.and_hms_opt(12, 0, 0))
                .map(|naive| naive.and_utc())
        })
        .collect::<Vec<_>>();

    PROFILES
        .iter()
        .map(|profile| {
            let points = dates
                .iter()
                .enumerate()
                .map(|(index, timestamp)| {
                    let shift = if index as u32 >= first_shifted {
                        profile.shift
                    } else {
                        0.0
                    };
                    let noise = (symmetric(&mut rng) + symmetric(&mut rng)) * 0.5 * profile.noise;
                    let value =
                        (profile.base + shift + noise).clamp(profile.floor, profile.ceiling);
                    TimeSeriesPoint::new(*timestamp, value)
                })
                .collect();
            MetricSeries::new(profile.metric, points)
        })
        .collect()
}

fn symmetric(rng: &mut fastrand::Rng) -> f64 {
    rng.f64() * 2.0 - 1.0
}

pub fn sample_csv(end: NaiveDate, options: DemoOptions) -> Result<String, ImportError> {
    write_csv(&sample_series(end, options))
}
