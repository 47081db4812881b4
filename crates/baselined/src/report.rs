use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use baseline_analysis::{DriftAnalyzer, DriftReport};
use baseline_config::{BaselineConfig, config_path, ensure_workspace_config, validate_config};
use baseline_core::{MetricSeries, MetricType};
use baseline_import::{DemoOptions, ImportOutcome, import_csv, import_health_export, sample_series};
use baseline_store::{IngestSummary, MemoryStore, Store};
use chrono::Utc;
use serde::Serialize;

use crate::cli::{ReportArgs, ReportFormat};
use crate::labels::metric_label;
use crate::suggestions::{SuggestionBundle, suggestions};

#[derive(Debug, Serialize)]
struct ReportOutput<'a> {
    #[serde(flatten)]
    report: &'a DriftReport,
    suggestions: BTreeMap<MetricType, SuggestionBundle>,
}

impl<'a> ReportOutput<'a> {
    fn new(report: &'a DriftReport) -> Self {
        let suggestions = report
            .events
            .iter()
            .map(|event| (event.metric, suggestions(event.metric)))
            .collect();
        Self {
            report,
            suggestions,
        }
    }
}

pub fn run_report_command(workspace: &Path, args: ReportArgs, out: &mut impl Write) -> Result<()> {
    let mut config = ensure_workspace_config(workspace).with_context(|| {
        format!(
            "failed to load or create workspace config at {}",
            config_path(workspace).display()
        )
    })?;
    apply_overrides(&mut config, &args);
    for warning in validate_config(&config) {
        eprintln!(
            "baseline config warning [{}]: {}",
            warning.code, warning.message
        );
    }

    let mut store = MemoryStore::from_config(&config.merge);
    let mut ingest = IngestSummary::default();
    let mut rows_skipped = 0;

    for path in &args.csv {
        let outcome = import_csv(path)
            .with_context(|| format!("failed to import CSV {}", path.display()))?;
        let batch = accept(outcome, args.strict, &mut rows_skipped)
            .with_context(|| format!("rejected CSV {}", path.display()))?;
        ingest.absorb(store.ingest(&batch));
    }
    for path in &args.health_export {
        let outcome = import_health_export(path)
            .with_context(|| format!("failed to import health export {}", path.display()))?;
        let batch = accept(outcome, args.strict, &mut rows_skipped)
            .with_context(|| format!("rejected health export {}", path.display()))?;
        ingest.absorb(store.ingest(&batch));
    }
    if args.demo {
        let options = DemoOptions {
            seed: args.demo_seed,
            ..DemoOptions::default()
        };
        ingest.absorb(store.ingest(&sample_series(Utc::now().date_naive(), options)));
    }

    tracing::info!(
        metrics = store.metric_count(),
        points_received = ingest.points_received,
        points_stored = ingest.points_stored,
        duplicates_collapsed = ingest.duplicates_collapsed,
        non_finite_skipped = ingest.non_finite_skipped,
        rows_skipped,
        "ingested readings"
    );

    let analyzer = DriftAnalyzer::with_config(config.drift.clone());
    let report = analyzer.report(&store);

    match args.format {
        ReportFormat::Json => {
            let value = serde_json::to_value(ReportOutput::new(&report))
                .context("failed to serialize drift report")?;
            write_json(out, &value)
        }
        ReportFormat::Table => write_table(out, &report, args.explain),
    }
}

fn apply_overrides(config: &mut BaselineConfig, args: &ReportArgs) {
    let drift = &mut config.drift;
    if let Some(value) = args.z_threshold.filter(|value| value.is_finite() && *value > 0.0) {
        drift.z_threshold = value;
    }
    if let Some(value) = args
        .baseline_days
        .filter(|value| value.is_finite() && *value > 0.0)
    {
        drift.baseline_window_days = value;
    }
    if let Some(value) = args
        .recent_days
        .filter(|value| value.is_finite() && *value > 0.0)
    {
        drift.recent_window_days = value;
    }
    if let Some(value) = args.min_points {
        drift.min_data_points = value;
    }
    if let Some(granularity) = args.dedup {
        config.merge.granularity = granularity;
    }
}

fn accept(
    outcome: ImportOutcome,
    strict: bool,
    rows_skipped: &mut usize,
) -> Result<Vec<MetricSeries>, baseline_import::ImportError> {
    if strict {
        return outcome.into_strict();
    }
    *rows_skipped += outcome.skipped.len();
    Ok(outcome.series)
}

fn write_table(out: &mut impl Write, report: &DriftReport, explain: bool) -> Result<()> {
    writeln!(
        out,
        "metric\tdirection\tbefore\tafter\tchange\tz_score\tconfidence\tstarted"
    )
    .context("write header")?;
    for event in &report.events {
        let label = metric_label(event.metric);
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{:+.1}%\t{:.2}\t{:.2}\t{}",
            label.display_name,
            event.direction.as_str(),
            label.format_value(event.before_mean),
            label.format_value(event.after_mean),
            event.percent_change,
            event.z_score,
            event.confidence,
            event.start_date.format("%Y-%m-%d")
        )
        .context("write row")?;
    }

    if explain {
        for event in &report.events {
            let label = metric_label(event.metric).display_name;
            writeln!(out).context("write separator")?;
            writeln!(out, "{}", event.summary(label)).context("write summary")?;
            writeln!(out, "{}", event.explanation(label, report.config.z_threshold))
                .context("write explanation")?;
            write_suggestions(out, suggestions(event.metric))?;
        }
    }

    writeln!(out).context("write separator")?;
    writeln!(
        out,
        "{} drift(s) across {} metric(s): {} up, {} down, {} with data warnings",
        report.summary.drifts_detected,
        report.summary.metrics_analyzed,
        report.summary.upward,
        report.summary.downward,
        report.summary.with_data_warnings
    )
    .context("write summary")?;
    for skipped in &report.skipped {
        writeln!(
            out,
            "no drift: {} ({})",
            metric_label(skipped.metric).display_name,
            skipped.reason.as_str()
        )
        .context("write skipped metric")?;
    }
    Ok(())
}

fn write_suggestions(out: &mut impl Write, bundle: SuggestionBundle) -> Result<()> {
    writeln!(out, "Questions to consider:").context("write suggestions")?;
    for question in bundle.questions {
        writeln!(out, "- {question}").context("write suggestions")?;
    }
    writeln!(out, "Follow-ups to discuss:").context("write suggestions")?;
    for follow_up in bundle.follow_ups {
        writeln!(out, "- {follow_up}").context("write suggestions")?;
    }
    Ok(())
}

fn write_json(out: &mut impl Write, value: &serde_json::Value) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value).context("failed to serialize JSON output")?;
    writeln!(out).context("failed to write trailing newline")?;
    Ok(())
}
