use anyhow::{Context, Result};
use baselined::cli::{Commands, parse_cli};
use baselined::demo::run_demo_command;
use baselined::logging::init_tracing;
use baselined::report::run_report_command;

fn main() -> Result<()> {
    let cli = parse_cli();
    init_tracing(cli.log_format);

    let workspace = cli.workspace.canonicalize().with_context(|| {
        format!(
            "failed to resolve workspace path {}",
            cli.workspace.display()
        )
    })?;

    let mut out = std::io::stdout();
    match cli.command {
        Commands::Report(args) => run_report_command(&workspace, args, &mut out),
        Commands::Demo(args) => run_demo_command(args, &mut out),
    }
}
