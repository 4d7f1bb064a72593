//! ATM CLI - a small multi-user bank in your terminal

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use atm_core::LogEvent;

mod commands;
mod output;

use commands::{dashboard, deposit, doctor, history, logs, register, status, transfer, withdraw};

/// ATM - deposit, withdraw and transfer from the terminal
#[derive(Parser)]
#[command(name = "atm", version, about, long_about = None)]
struct Cli {
    /// Account username (the password is read from ATM_PASSWORD or prompted)
    #[arg(long, short, global = true, env = "ATM_USERNAME")]
    username: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a new account
    Register {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show balance, account ID and recent activity
    Dashboard {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Deposit money
    Deposit {
        /// Amount, e.g. 25 or 25.50
        #[arg(allow_negative_numbers = true)]
        amount: Decimal,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Withdraw money
    Withdraw {
        /// Amount, e.g. 25 or 25.50
        #[arg(allow_negative_numbers = true)]
        amount: Decimal,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Send money to another account
    Transfer {
        /// Recipient's account ID
        recipient: String,
        /// Amount, e.g. 25 or 25.50
        #[arg(allow_negative_numbers = true)]
        amount: Decimal,
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show transaction history
    History {
        /// Write the history to a CSV file instead
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show store-wide totals
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run ledger integrity checks
    Doctor {
        /// Show verbose output
        #[arg(long, short)]
        verbose: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// View and manage the event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Register { .. } => "register",
            Commands::Dashboard { .. } => "dashboard",
            Commands::Deposit { .. } => "deposit",
            Commands::Withdraw { .. } => "withdraw",
            Commands::Transfer { .. } => "transfer",
            Commands::History { .. } => "history",
            Commands::Status { .. } => "status",
            Commands::Doctor { .. } => "doctor",
            Commands::Logs { .. } => "logs",
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let logger = commands::get_logger();
    commands::log_event(
        &logger,
        LogEvent::new("command_executed").with_command(cli.command.name()),
    );
    // Close logs.duckdb before commands open their own handle to it
    drop(logger);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let username = cli.username;
    match cli.command {
        Commands::Register { json } => register::run(username, json),
        Commands::Dashboard { json } => dashboard::run(username, json),
        Commands::Deposit { amount, json } => deposit::run(username, amount, json),
        Commands::Withdraw { amount, json } => withdraw::run(username, amount, json),
        Commands::Transfer { recipient, amount, force, json } => {
            transfer::run(username, recipient, amount, force, json)
        }
        Commands::History { csv, json } => history::run(username, csv, json),
        Commands::Status { json } => status::run(json),
        Commands::Doctor { verbose, json } => doctor::run(verbose, json),
        Commands::Logs { command } => logs::run(command),
    }
}
