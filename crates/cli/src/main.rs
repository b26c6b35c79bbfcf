mod cli;
mod commands;
mod config;
mod events;

use std::process::ExitCode;

use clap::Parser;

use crate::cli::{Cli, Command};
use crate::commands::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::debug!("command failed: {e:?}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let settings = config::load_settings(cli.config.as_deref())?;
    log::info!("using backend {}", settings.api_root());

    match cli.command {
        Command::Transcribe(args) => commands::transcribe(&settings, args).await,
        Command::Notes(cmd) => commands::notes(&settings, cmd).await,
        Command::Config => commands::show_config(&settings),
    }
}
