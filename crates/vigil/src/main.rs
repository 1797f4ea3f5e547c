mod cli;
mod commands;
mod error;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let settings = commands::load_settings(&cli.global)?;
    let panel = commands::build_panel(&settings)?;

    match cli.command {
        Command::Status { json } => commands::status(&panel, json).await,
        Command::ArmAway => commands::arm_away(&panel).await,
        Command::ArmStay => commands::arm_stay(&panel).await,
        Command::Disarm => commands::disarm(&panel).await,
        Command::Watch => commands::watch(panel, &settings).await,
    }
}
