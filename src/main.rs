//! tof-search - Main Entry Point
//!
//! Runs the cached steady-state searches, or inspects their artifacts.

use clap::Parser;
use tof_search::cli::{cmd_info, cmd_inspect, cmd_run, Cli, Commands, RunArgs};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tof_search=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run(args)) => run(&args),
        Some(Commands::Inspect { artifact, top }) => cmd_inspect(&artifact, top),
        Some(Commands::Info { data }) => cmd_info(&data),
        // Default: the production run
        None => run(&RunArgs::default()),
    }
}

fn run(args: &RunArgs) -> anyhow::Result<()> {
    let report = cmd_run(args)?;
    if !report.is_success() {
        let tags: Vec<&str> = report.failed.iter().map(|f| f.tag.as_str()).collect();
        anyhow::bail!("{} variant(s) failed: {}", tags.len(), tags.join(", "));
    }
    Ok(())
}
