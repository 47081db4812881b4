use std::fs;
use std::io::Write;

use anyhow::{Context, Result};
use baseline_core::MetricType;
use baseline_import::{DemoOptions, sample_csv};
use chrono::Utc;

use crate::cli::DemoArgs;

pub fn run_demo_command(args: DemoArgs, out: &mut impl Write) -> Result<()> {
    let end = args.end.unwrap_or_else(|| Utc::now().date_naive());
    let options = DemoOptions {
        days: args.days,
        shift_days: args.shift_days,
        seed: args.seed,
    };

    if let Some(parent) = args
        .output
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    let csv = sample_csv(end, options).context("failed to render demo CSV")?;
    fs::write(&args.output, csv)
        .with_context(|| format!("failed to write demo CSV {}", args.output.display()))?;

    tracing::info!(
        path = %args.output.display(),
        days = options.days,
        shift_days = options.shift_days,
        seed = options.seed,
        "wrote demo readings"
    );
    writeln!(
        out,
        "wrote {} daily readings for {} metrics ending {} to {}",
        options.days,
        MetricType::ALL.len(),
        end.format("%Y-%m-%d"),
        args.output.display()
    )
    .context("write demo summary")?;
    Ok(())
}
