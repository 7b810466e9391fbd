pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "restock",
    about = "Restock procurement planner CLI",
    long_about = "Produce validated procurement plans, inspect request fingerprints, and operate \
                  migrations, config inspection, and readiness checks.",
    after_help = "Examples:\n  restock plan --caller kitchen-7 --inventory stock.csv --horizon 3\n  \
                  cat stock.csv | restock fingerprint --inventory - --horizon 3\n  \
                  restock doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Produce a procurement plan, from cache when an identical request exists")]
    Plan {
        #[arg(long, help = "Caller identity; scopes the plan cache")]
        caller: String,
        #[arg(long, help = "Inventory CSV path, or `-` for stdin")]
        inventory: String,
        #[arg(long, default_value = "", help = "Free-text planning instruction")]
        instruction: String,
        #[arg(long, help = "Planning horizon in days (1-30)")]
        horizon: u32,
    },
    #[command(about = "Compute the request fingerprint without contacting the reasoning engine")]
    Fingerprint {
        #[arg(long, help = "Inventory CSV path, or `-` for stdin")]
        inventory: String,
        #[arg(long, default_value = "", help = "Free-text planning instruction")]
        instruction: String,
        #[arg(long, help = "Planning horizon in days (1-30)")]
        horizon: u32,
    },
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, reasoning engine settings, and database readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Plan { caller, inventory, instruction, horizon } => {
            commands::plan::run(commands::plan::PlanArgs {
                caller,
                inventory,
                instruction,
                horizon_days: horizon,
            })
        }
        Command::Fingerprint { inventory, instruction, horizon } => {
            commands::fingerprint::run(&inventory, &instruction, horizon)
        }
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
