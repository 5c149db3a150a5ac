//! Sync command - re-fetch recent months and merge them into the table

use std::path::PathBuf;

use anyhow::Result;
use chrono::Local;
use colored::Colorize;
use kakeibo_core::adapters::replay::ReplaySource;
use kakeibo_core::ports::{LoginOutcome, RecordSource};
use kakeibo_core::services::{RunStatus, SyncReport};
use kakeibo_core::TableKind;

use super::get_context;
use crate::output;

pub fn run(months: Option<u32>, dry_run: bool, replay: Option<PathBuf>, json: bool) -> Result<RunStatus> {
    let ctx = get_context("sync")?;
    let store = ctx.open_store(TableKind::Transactions)?;

    let mut options = ctx.sync_options(dry_run);
    if let Some(months) = months {
        options.months = months;
    }

    let mut source: Box<dyn RecordSource> = match replay {
        Some(dir) => Box::new(ReplaySource::new(dir)),
        None => Box::new(ctx.ledger_source()?),
    };

    let today = Local::now().date_naive();
    let report = ctx
        .sync_service
        .run(source.as_mut(), store.as_ref(), today, &options)?;
    let status = report.status();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(status);
    }

    print_report(&report);
    Ok(status)
}

fn print_report(report: &SyncReport) {
    if report.dry_run {
        println!("{}", "DRY RUN - table not written".yellow());
        println!();
    }

    if report.login == LoginOutcome::TimedOutProceeding {
        output::warning("Login was not confirmed in time; extraction continued anyway");
    }

    let mut table = output::create_table();
    table.set_header(vec!["Month", "Rows", "Extracted", "Skipped", "Duplicates", "Result"]);
    for window in &report.windows {
        let result = match &window.error {
            Some(e) => format!("{} {}", "failed:".red(), e),
            None => "ok".green().to_string(),
        };
        table.add_row(vec![
            window.label.clone(),
            window.rows_seen.to_string(),
            window.extracted.to_string(),
            window.skipped.to_string(),
            window.duplicates.to_string(),
            result,
        ]);
    }
    println!("{}", table);
    println!();

    println!("Source: {}", report.source);
    println!("Store:  {}", report.store);
    println!("  Records fetched: {}", report.normalized.records);
    if report.normalized.undated > 0 {
        println!("  Undated (kept, sorted last): {}", report.normalized.undated);
    }
    if report.normalized.amount_fallbacks > 0 {
        println!("  Unparseable amounts (recorded as 0): {}", report.normalized.amount_fallbacks);
    }
    println!("  Existing rows: {}", report.merge.existing);
    println!("  New: {}", report.merge.inserted);
    println!("  Updated: {}", report.merge.updated);
    if report.merge.blank_ids_dropped > 0 {
        println!("  Dropped (blank id): {}", report.merge.blank_ids_dropped);
    }
    println!("  Final rows: {}", report.merge.final_rows);
    println!();

    match report.status() {
        RunStatus::Success if report.written => output::success("Sync complete"),
        RunStatus::Success => output::info("Sync complete (nothing written)"),
        RunStatus::Partial => output::warning(&format!(
            "Sync finished with {} failed month(s); re-run to fill the gaps",
            report.failed_windows()
        )),
        RunStatus::Failed => output::error(&format!(
            "Upload failed: {}",
            report.upload_error.as_deref().unwrap_or("unknown error")
        )),
    }
}
