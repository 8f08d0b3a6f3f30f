use clap::Parser;
use tracing_subscriber::EnvFilter;

use dom_recorder::cli::commands::cmd_replay;
use dom_recorder::cli::config::{Cli, Commands, default_log_filter, load_config};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_filter(cli.verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Replay {
            scenario,
            max_steps,
            describe,
            save,
        } => {
            cmd_replay(&scenario, config, max_steps, describe, save.as_deref())?;
        }
    }

    Ok(())
}
