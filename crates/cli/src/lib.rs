pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "tarifario",
    about = "Tarifario operator CLI",
    long_about = "Operate the tariff engine: migrations, seed data, config inspection, \
readiness checks, and one-off calculations.",
    after_help = "Examples:\n  tarifario doctor --json\n  tarifario config\n  tarifario calculate --archivo solicitud.json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic development dataset and verify it")]
    Seed,
    #[command(about = "Run end-to-end readiness checks with per-check timing details")]
    Smoke,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, auth token readiness, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Run one calculation from a JSON request file against the configured database")]
    Calculate {
        #[arg(long, help = "Path to a JSON file with the calculation request")]
        archivo: PathBuf,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Smoke => commands::smoke::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Calculate { archivo } => commands::calculate::run(&archivo),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
