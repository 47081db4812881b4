use std::ffi::OsString;
use std::path::PathBuf;

use baseline_config::DedupGranularity;
use chrono::NaiveDate;
use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lower")]
pub enum LogFormat {
    Human,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lower")]
pub enum ReportFormat {
    Table,
    Json,
}

#[derive(Debug, Clone, PartialEq, Args)]
#[command(group(
    ArgGroup::new("inputs")
        .required(true)
        .multiple(true)
        .args(["csv", "health_export", "demo"])
))]
pub struct ReportArgs {
    #[arg(long, value_name = "PATH", help = "CSV file with date,metric,value rows")]
    pub csv: Vec<PathBuf>,

    #[arg(long, value_name = "PATH", help = "Unzipped health export.xml")]
    pub health_export: Vec<PathBuf>,

    #[arg(long, help = "Include generated demo readings ending today")]
    pub demo: bool,

    #[arg(
        long,
        requires = "demo",
        default_value_t = 42,
        help = "Seed for --demo readings"
    )]
    pub demo_seed: u64,

    #[arg(
        long,
        value_enum,
        default_value_t = ReportFormat::Table,
        help = "Report output format"
    )]
    pub format: ReportFormat,

    #[arg(long, help = "Print the full explanation for each drift in table output")]
    pub explain: bool,

    #[arg(long, help = "Fail on the first malformed input row instead of skipping it")]
    pub strict: bool,

    #[arg(long, help = "Override drift.z_threshold")]
    pub z_threshold: Option<f64>,

    #[arg(long, help = "Override drift.baseline_window_days")]
    pub baseline_days: Option<f64>,

    #[arg(long, help = "Override drift.recent_window_days")]
    pub recent_days: Option<f64>,

    #[arg(long, help = "Override drift.min_data_points")]
    pub min_points: Option<usize>,

    #[arg(
        long,
        value_parser = parse_dedup,
        help = "Override merge.granularity: exact, second, or minute"
    )]
    pub dedup: Option<DedupGranularity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct DemoArgs {
    #[arg(long, value_name = "PATH", help = "Destination CSV file")]
    pub output: PathBuf,

    #[arg(long, default_value_t = 42, help = "Noise seed")]
    pub seed: u64,

    #[arg(
        long,
        value_parser = parse_date,
        help = "Last day of generated readings (YYYY-MM-DD), defaults to today"
    )]
    pub end: Option<NaiveDate>,

    #[arg(long, default_value_t = 120, help = "Number of daily readings per metric")]
    pub days: u32,

    #[arg(long, default_value_t = 6, help = "Trailing readings that carry the shift")]
    pub shift_days: u32,
}

#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Commands {
    /// Ingest readings and print the drift report
    Report(ReportArgs),
    /// Write a synthetic CSV with a trailing shift in every metric
    Demo(DemoArgs),
}

#[derive(Debug, Clone, Parser)]
#[command(author, version, about = "BaselineIQ drift reporter")]
pub struct Cli {
    #[arg(
        long,
        global = true,
        default_value = ".",
        help = "Workspace root holding .baseline/config.toml"
    )]
    pub workspace: PathBuf,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = LogFormat::Human,
        help = "Log output format"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

pub fn parse_cli() -> Cli {
    Cli::parse_from(drop_leading_separator(std::env::args_os()))
}

/// Removes a bare `--` forwarded in front of the subcommand.
fn drop_leading_separator(args: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
    let mut args = args.into_iter();
    let program = args.next();
    let mut rest = args.peekable();
    rest.next_if(|arg| arg == "--");
    program.into_iter().chain(rest).collect()
}

fn parse_dedup(value: &str) -> Result<DedupGranularity, String> {
    value.parse()
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| format!("invalid date '{value}', expected YYYY-MM-DD"))
}
