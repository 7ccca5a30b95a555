use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use dwell_cli::commands::{config, simulate, watch};
use dwell_cli::{Cli, Commands, Config};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Logs go to stderr so command output stays parseable
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let app_config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?app_config, "loaded configuration");

    let mut stdout = std::io::stdout();
    match &cli.command {
        Some(Commands::Simulate { script, json }) => {
            simulate::run(&mut stdout, &app_config, script, *json)?;
        }
        Some(Commands::Watch) => {
            watch::run(&app_config)?;
        }
        Some(Commands::Config) => {
            config::run(&mut stdout, &app_config)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
