//! crlfetch CLI - Command-line interface
//!
//! Downloads the CRL archive, publishes its contents and reports the run.
//! Intended to be invoked by cron, a systemd timer or Task Scheduler.

mod commands;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use crlfetch::pipeline::EXIT_FATAL;

use commands::config::ConfigCommands;
use commands::run::RunArgs;

#[derive(Debug, Parser)]
#[command(name = "crlfetch", version, about = "Download and publish certificate revocation lists")]
struct Cli {
    /// Path to the config file (defaults to the user config directory)
    #[arg(long, short, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Download, extract and report once
    Run(RunArgs),

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Inspect the configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    let result = match cli.command {
        Commands::Run(args) => commands::run::run(config_path, cli.verbose, args),
        Commands::Init { force } => commands::init::run(config_path, force).map(|()| 0),
        Commands::Config { command } => commands::config::run(config_path, command).map(|()| 0),
    };

    match result {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            tracing::error!(error = %e, "crlfetch failed");
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_FATAL as u8)
        }
    }
}
