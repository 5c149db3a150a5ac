//! Kakeibo CLI - keep a household ledger mirrored in a table you own

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use kakeibo_core::services::RunStatus;

mod commands;
mod output;

use commands::{insight, logs, status, sync};

/// Exit code when the run finished but some input was missing
const EXIT_PARTIAL: u8 = 2;

/// Kakeibo - mirror your web household ledger into a table
#[derive(Parser)]
#[command(name = "kakeibo", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Re-fetch recent months and merge them into the table
    Sync {
        /// Number of months to re-fetch, 1 to 120 (overrides SYNC_MONTHS)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=120))]
        months: Option<u32>,
        /// Compute the merge without writing the table
        #[arg(long)]
        dry_run: bool,
        /// Read saved pages (<DIR>/<YYYY-MM>.html) instead of logging in
        #[arg(long, value_name = "DIR")]
        replay: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compare spending per category with the month before
    Insight {
        /// Target month as YYYY-MM (defaults to last month)
        #[arg(long)]
        month: Option<String>,
        /// Print only, do not write the insight table
        #[arg(long)]
        no_upload: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Summarize the synchronized table
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// View and manage the run event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // --help and --version are not failures
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    kakeibo_core::config::load_env_file();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    match run(cli) {
        Ok(RunStatus::Success) => ExitCode::SUCCESS,
        Ok(RunStatus::Partial) => ExitCode::from(EXIT_PARTIAL),
        Ok(RunStatus::Failed) => ExitCode::FAILURE,
        Err(e) => {
            output::error(&format!("Error: {:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<RunStatus> {
    match cli.command {
        Commands::Sync {
            months,
            dry_run,
            replay,
            json,
        } => sync::run(months, dry_run, replay, json),
        Commands::Insight {
            month,
            no_upload,
            json,
        } => insight::run(month.as_deref(), no_upload, json),
        Commands::Status { json } => status::run(json),
        Commands::Logs { command } => logs::run(command),
    }
}
