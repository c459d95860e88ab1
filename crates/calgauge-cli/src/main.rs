//! calgauge entry point.

use std::process::ExitCode;

use calgauge_core::{TracingConfig, init_tracing};
use clap::Parser;

use calgauge_cli::cli::{Cli, Command, ConfigAction};
use calgauge_cli::commands;
use calgauge_cli::config::Config;
use calgauge_cli::error::CliResult;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let tracing_config = if cli.debug {
        TracingConfig::debug()
    } else {
        TracingConfig::default()
    };
    if let Err(e) = init_tracing(tracing_config.with_format(cli.log_format)) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "calgauge failed");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let config = Config::load(cli.config.as_deref())?;
    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);

    match cli.command {
        None => commands::serve::run(&Default::default(), &config).await,
        Some(Command::Serve(args)) => commands::serve::run(&args, &config).await,
        Some(Command::Calendars) => commands::calendars::list(&config),
        Some(Command::Config { action }) => match action {
            ConfigAction::Dump => commands::config::dump(&config, &config_path),
            ConfigAction::Validate => commands::config::validate(&config),
            ConfigAction::Path => commands::config::path(&config_path),
        },
    }
}
