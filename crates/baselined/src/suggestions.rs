use baseline_core::MetricType;
use serde::Serialize;

/// Prompts shown next to a drift. They frame a conversation with a
/// clinician and are never a diagnosis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SuggestionBundle {
    pub questions: &'static [&'static str],
    pub follow_ups: &'static [&'static str],
}

pub fn suggestions(metric: MetricType) -> SuggestionBundle {
    let (questions, follow_ups): (&'static [&'static str], &'static [&'static str]) = match metric
    {
        MetricType::RestingHeartRate => (
            &[
                "Any recent illness, fever, or infection?",
                "Changes in training intensity, stress, or caffeine intake?",
                "Any new medications or supplements?",
                "Changes in sleep quality or duration?",
            ],
            &[
                "Discuss an ECG or rhythm evaluation if symptoms are present.",
                "Consider thyroid function tests per clinician judgment.",
                "Review training load and recovery.",
            ],
        ),
        MetricType::SleepDuration => (
            &[
                "Have your bedtimes or wake times changed recently?",
                "Any issues with insomnia or frequent awakenings?",
                "Changes in work schedule, travel, or stress?",
            ],
            &[
                "Discuss sleep hygiene and possible sleep study if indicated.",
                "Consider screening for mood or anxiety if appropriate.",
            ],
        ),
        MetricType::OxygenSaturation => (
            &[
                "Any shortness of breath, cough, or respiratory symptoms?",
                "Changes in altitude or travel?",
                "Any new wearables or sensor placement changes?",
            ],
            &[
                "Discuss pulse oximetry recheck and correlation with clinical context.",
                "Consider pulmonary evaluation if persistent and symptomatic.",
            ],
        ),
        MetricType::Weight => (
            &[
                "Any changes in diet, appetite, or fluid intake?",
                "Changes in activity level?",
                "Any swelling, bloating, or GI symptoms?",
            ],
            &[
                "Discuss trend consistency and body composition context.",
                "Consider metabolic labs per clinician judgment.",
            ],
        ),
        MetricType::Glucose => (
            &[
                "Any changes in diet or carbohydrate intake?",
                "Missed medications or changes to dosing?",
                "Any infections, stress, or illness?",
            ],
            &[
                "Discuss SMBG/CGM review and A1c if appropriate.",
                "Consider medication review with clinician.",
            ],
        ),
        MetricType::BloodPressureSystolic | MetricType::BloodPressureDiastolic => (
            &[
                "Any headaches, dizziness, or vision changes?",
                "Changes in salt intake or hydration?",
                "Any missed doses of BP medications?",
            ],
            &[
                "Discuss home BP cuff calibration and technique.",
                "Consider ambulatory BP monitoring per clinician judgment.",
            ],
        ),
    };
    SuggestionBundle {
        questions,
        follow_ups,
    }
}
