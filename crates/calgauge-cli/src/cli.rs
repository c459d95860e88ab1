//! Command-line interface definition.

use std::path::PathBuf;

use calgauge_core::TracingOutputFormat;
use clap::{Parser, Subcommand};

/// calgauge - upcoming meetings as Prometheus gauges
#[derive(Debug, Parser)]
#[command(name = "calgauge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "CALGAUGE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    /// Log format: pretty, compact or json
    #[arg(long, env = "CALGAUGE_LOG_FORMAT", default_value = "compact", global = true)]
    pub log_format: TracingOutputFormat,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the gauge service in the foreground (default)
    Serve(ServeArgs),

    /// List calendars with stored credentials
    Calendars,

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Overrides for `serve`.
#[derive(Debug, Default, Clone, clap::Args)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "CALGAUGE_HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(long, short, env = "CALGAUGE_PORT")]
    pub port: Option<u16>,

    /// Path to the token store
    #[arg(long, env = "CALGAUGE_TOKEN_STORE")]
    pub token_store: Option<PathBuf>,

    /// Path to Google Cloud Console credentials JSON file
    #[arg(long, env = "GOOGLE_CREDENTIALS_FILE")]
    pub credentials_file: Option<PathBuf>,
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump the effective configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["calgauge"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.log_format, TracingOutputFormat::Compact);
    }

    #[test]
    fn serve_overrides() {
        let cli = Cli::try_parse_from([
            "calgauge",
            "--log-format",
            "json",
            "serve",
            "--host",
            "0.0.0.0",
            "--port",
            "9100",
        ])
        .unwrap();
        assert_eq!(cli.log_format, TracingOutputFormat::Json);
        let Some(Command::Serve(args)) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(args.port, Some(9100));
    }

    #[test]
    fn rejects_unknown_log_format() {
        assert!(Cli::try_parse_from(["calgauge", "--log-format", "xml"]).is_err());
    }
}
