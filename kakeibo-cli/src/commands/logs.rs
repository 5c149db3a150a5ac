//! `kakeibo logs` - inspect and prune the run event log

use anyhow::Result;
use chrono::{DateTime, Duration, Local, Utc};
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Confirm;
use kakeibo_core::services::logging::LogEntry;
use kakeibo_core::services::RunStatus;
use kakeibo_core::LoggingService;

use super::{get_data_dir, ENTRY_POINT};
use crate::output;

#[derive(Subcommand)]
pub enum LogsCommands {
    /// Print the latest run events
    List {
        /// How many events to print
        #[arg(short = 'n', long, default_value_t = 50)]
        limit: usize,
        /// Only events that carry an error
        #[arg(long)]
        errors: bool,
        #[arg(long)]
        json: bool,
    },
    /// Remove events older than a number of days
    Clear {
        #[arg(long, value_name = "DAYS", default_value_t = 30)]
        older_than_days: u32,
        /// Do not ask before deleting
        #[arg(short, long)]
        force: bool,
        #[arg(long)]
        json: bool,
    },
    /// Summarize the event log
    Stats {
        #[arg(long)]
        json: bool,
    },
}

pub fn run(command: LogsCommands) -> Result<RunStatus> {
    let service = LoggingService::new(
        &get_data_dir(None),
        ENTRY_POINT,
        env!("CARGO_PKG_VERSION"),
    )?;

    match command {
        LogsCommands::List {
            limit,
            errors,
            json,
        } => list(&service, limit, errors, json)?,
        LogsCommands::Clear {
            older_than_days,
            force,
            json,
        } => clear(&service, older_than_days, force, json)?,
        LogsCommands::Stats { json } => stats(&service, json)?,
    }

    Ok(RunStatus::Success)
}

fn local_time(ms: i64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(ms) {
        Some(at) => at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
        None => format!("@{}", ms),
    }
}

fn context_column(entry: &LogEntry) -> String {
    let mut parts = Vec::new();
    if let Some(command) = &entry.command {
        parts.push(command.as_str());
    }
    if let Some(window) = &entry.window {
        parts.push(window.as_str());
    }
    parts.join(" ")
}

fn list(service: &LoggingService, limit: usize, errors: bool, json: bool) -> Result<()> {
    let entries = service.get_recent(limit, errors)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        output::info("The event log is empty.");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["When", "Event", "Context", "Run", "Error"]);
    for entry in &entries {
        let run: String = entry
            .run_id
            .as_deref()
            .unwrap_or("")
            .chars()
            .take(8)
            .collect();
        let error = match &entry.error_message {
            Some(message) => message.red().to_string(),
            None => String::new(),
        };
        table.add_row(vec![
            local_time(entry.timestamp),
            entry.event.clone(),
            context_column(entry),
            run,
            error,
        ]);
    }
    println!("{}", table);
    Ok(())
}

fn clear(service: &LoggingService, days: u32, force: bool, json: bool) -> Result<()> {
    let cutoff = Utc::now() - Duration::days(i64::from(days));

    let confirmed = force
        || json
        || Confirm::new()
            .with_prompt(format!(
                "Remove run events logged before {}?",
                cutoff.with_timezone(&Local).format("%Y-%m-%d")
            ))
            .default(false)
            .interact()?;
    if !confirmed {
        output::warning("Nothing removed.");
        return Ok(());
    }

    let deleted = service.delete_before(cutoff.timestamp_millis())?;
    if json {
        println!("{}", serde_json::json!({ "deleted": deleted }));
    } else {
        output::success(&format!("Removed {} event(s)", deleted));
    }
    Ok(())
}

fn stats(service: &LoggingService, json: bool) -> Result<()> {
    let stats = service.stats()?;
    let path = service.db_path();
    let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);

    if json {
        let doc = serde_json::json!({
            "stats": stats,
            "database_path": path.display().to_string(),
            "database_size_bytes": size,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    let mut table = output::create_table();
    table.add_row(vec!["Events".to_string(), stats.total.to_string()]);
    table.add_row(vec!["With errors".to_string(), stats.errors.to_string()]);
    if let (Some(first), Some(last)) = (stats.oldest, stats.newest) {
        table.add_row(vec!["First".to_string(), local_time(first)]);
        table.add_row(vec!["Last".to_string(), local_time(last)]);
    }
    for (event, hits) in &stats.by_event {
        table.add_row(vec![format!("  {}", event), hits.to_string()]);
    }
    table.add_row(vec!["File".to_string(), format!("{} ({} bytes)", path.display(), size)]);
    println!("{}", table);
    Ok(())
}
