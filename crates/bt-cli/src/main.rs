use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use bt_cli::commands::{check, fix_unpaired, irr, states, time_budget};
use bt_cli::{Cli, Commands, Config};

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Logs go to stderr so command output stays parseable.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match &cli.command {
        Some(Commands::Check(args)) => check::run(&mut out, args)?,
        Some(Commands::States(args)) => states::run(&mut out, args)?,
        Some(Commands::FixUnpaired(args)) => fix_unpaired::run(&mut out, args)?,
        Some(Commands::Irr(args)) => {
            let config = load_config(cli.config.as_deref())?;
            irr::run(&mut out, args, &config)?;
        }
        Some(Commands::TimeBudget(args)) => time_budget::run(&mut out, args)?,
        None => {
            Cli::command().print_help()?;
            writeln!(out)?;
        }
    }

    out.flush()?;
    Ok(())
}
