pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "venta",
    about = "Venta operator CLI",
    long_about = "Operate the Venta sales assistant: schema migrations, effective-config \
                  inspection, and readiness checks.",
    after_help = "Examples:\n  venta migrate\n  venta doctor --json\n  venta smoke"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Validate config, WhatsApp credentials, and database connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Print the effective configuration with secrets redacted")]
    Config,
    #[command(about = "Apply pending database migrations")]
    Migrate,
    #[command(about = "Run the full readiness pass with per-check timings")]
    Smoke,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Config => commands::config::run(),
        Command::Migrate => commands::migrate::run(),
        Command::Smoke => commands::smoke::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
