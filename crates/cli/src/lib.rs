pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "marketer",
    about = "AI Marketer 360 operator CLI",
    long_about = "Operate AI Marketer 360 readiness, migrations, config inspection, and subscriber entitlements.",
    after_help = "Examples:\n  marketer doctor --json\n  marketer grant 123456789 marketing_pro\n  marketer status 123456789"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, bot token readiness, DB connectivity and migrations")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Activate a catalog tariff for a user for the configured subscription window")]
    Grant {
        #[arg(help = "Chat user id")]
        user_id: String,
        #[arg(help = "Tariff code: start, marketing_pro, content_studio or agency")]
        tariff: String,
    },
    #[command(about = "Print a user's tariff, expiry and usage counters")]
    Status {
        #[arg(help = "Chat user id")]
        user_id: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Grant { user_id, tariff } => commands::grant::run(&user_id, &tariff),
        Command::Status { user_id } => commands::status::run(&user_id),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
