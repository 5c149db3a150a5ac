//! Insight command - month-over-month spending per category

use anyhow::{Context, Result};
use chrono::Local;
use colored::Colorize;
use kakeibo_core::domain::Verdict;
use kakeibo_core::services::{InsightService, LogEvent, RunStatus};
use kakeibo_core::{InsightReport, PersistedTable, TableKind, YearMonth};

use super::{get_context, log_event};
use crate::output;

/// `YYYY-MM`, or the month before today's
fn target_month(month: Option<&str>) -> Result<YearMonth> {
    match month {
        Some(text) => Ok(text.parse::<YearMonth>()?),
        None => Ok(YearMonth::of(Local::now().date_naive()).previous()),
    }
}

pub fn run(month: Option<&str>, no_upload: bool, json: bool) -> Result<RunStatus> {
    let target = target_month(month)?;
    let ctx = get_context("insight")?;

    let source = ctx.open_store(TableKind::Transactions)?;
    let snapshot = source
        .read_all()
        .with_context(|| format!("cannot read table from {}", source.name()))?;
    let table = snapshot
        .map(|s| PersistedTable::from_snapshot(&s))
        .unwrap_or_default();

    let report = InsightService::analyze(&table, target);

    let uploaded = if no_upload {
        false
    } else {
        let store = ctx.open_store(TableKind::Insight)?;
        match InsightService::publish(&report, store.as_ref()) {
            Ok(written) => written,
            Err(e) => {
                log_event(
                    ctx.logger.as_deref(),
                    LogEvent::new("insight_failed")
                        .with_command("insight")
                        .with_window(target.to_string())
                        .with_error(e.to_string()),
                );
                return Err(e).with_context(|| format!("cannot write insight to {}", store.name()));
            }
        }
    };

    log_event(
        ctx.logger.as_deref(),
        LogEvent::new("insight_completed")
            .with_command("insight")
            .with_window(target.to_string()),
    );

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "report": report,
                "uploaded": uploaded,
            }))?
        );
        return Ok(RunStatus::Success);
    }

    print_report(&report);
    if uploaded {
        output::success("Insight table updated");
    } else if !no_upload && report.is_empty() {
        output::info("Nothing to upload");
    }
    Ok(RunStatus::Success)
}

fn print_report(report: &InsightReport) {
    println!(
        "{}",
        format!("Spending {} vs {}", report.target, report.previous).bold()
    );
    println!();

    if report.is_empty() {
        output::warning("No spending recorded in either month");
        return;
    }

    let mut table = output::create_table();
    table.set_header(vec![
        "Category".to_string(),
        report.target.to_string(),
        report.previous.to_string(),
        "Difference".to_string(),
        "Change %".to_string(),
        "Verdict".to_string(),
    ]);
    for row in &report.rows {
        let verdict = match row.verdict {
            Verdict::Overspent => row.verdict.label().red().bold().to_string(),
            Verdict::Increased => row.verdict.label().yellow().to_string(),
            Verdict::Decreased => row.verdict.label().green().to_string(),
            Verdict::Unchanged => row.verdict.label().to_string(),
        };
        table.add_row(vec![
            row.category.clone(),
            output::format_yen(row.current),
            output::format_yen(row.previous),
            output::format_yen_signed(row.difference),
            row.change_rate.to_string(),
            verdict,
        ]);
    }
    println!("{}", table);
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_month() {
        assert_eq!(
            target_month(Some("2024-02")).unwrap(),
            YearMonth::new(2024, 2).unwrap()
        );
    }

    #[test]
    fn test_invalid_month_is_error() {
        assert!(target_month(Some("2024-13")).is_err());
        assert!(target_month(Some("Feb 2024")).is_err());
    }

    #[test]
    fn test_default_is_last_month() {
        let expected = YearMonth::of(Local::now().date_naive()).previous();
        assert_eq!(target_month(None).unwrap(), expected);
    }
}
