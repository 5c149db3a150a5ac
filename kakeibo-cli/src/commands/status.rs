//! Status command - summary of the synchronized table

use anyhow::Result;
use colored::Colorize;
use kakeibo_core::services::{RunStatus, StatusService};
use kakeibo_core::TableKind;

use super::get_context;
use crate::output;

pub fn run(json: bool) -> Result<RunStatus> {
    let ctx = get_context("status")?;
    let store = ctx.open_store(TableKind::Transactions)?;
    let status = StatusService::get_status(store.as_ref())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(RunStatus::Success);
    }

    println!("{}", "Ledger Table Status".bold());
    println!();

    let mut table = output::create_table();
    table.add_row(vec!["Store".to_string(), status.store.clone()]);
    table.add_row(vec!["Records".to_string(), status.total_records.to_string()]);
    table.add_row(vec!["Income".to_string(), output::format_yen(status.inflow_total)]);
    table.add_row(vec!["Spending".to_string(), output::format_yen(status.outflow_total)]);
    if status.undated_records > 0 {
        table.add_row(vec!["Undated".to_string(), status.undated_records.to_string()]);
    }
    println!("{}", table);
    println!();

    match (&status.date_range.earliest, &status.date_range.latest) {
        (Some(earliest), Some(latest)) => println!("Date range: {} to {}", earliest, latest),
        _ => output::info("No records yet. Run 'kakeibo sync' first."),
    }

    Ok(RunStatus::Success)
}
