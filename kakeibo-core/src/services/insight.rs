//! Insight service - month-over-month spending comparison per category

use std::collections::BTreeMap;

use log::{info, warn};
use rust_decimal::Decimal;

use crate::domain::result::Result;
use crate::domain::{Direction, InsightReport, InsightRow, PersistedTable, Verdict, YearMonth};
use crate::ports::TableStore;

/// Minimum increase, in currency units, for a category to count as overspent
pub const OVERSPEND_AMOUNT: i64 = 5000;

/// Minimum increase, in percent, for a category to count as overspent
pub const OVERSPEND_RATE: i64 = 20;

pub struct InsightService;

impl InsightService {
    /// Compare outflow per category between `target` and the month before.
    ///
    /// Rows are ordered by difference, largest increase first. An empty
    /// report means neither month has any outflow.
    pub fn analyze(table: &PersistedTable, target: YearMonth) -> InsightReport {
        let previous = target.previous();
        info!("analyzing {} against {}", target, previous);

        // category -> (target month total, previous month total)
        let mut totals: BTreeMap<&str, (u64, u64)> = BTreeMap::new();
        for record in table.records() {
            if record.direction != Direction::Outflow {
                continue;
            }
            let Some(date) = record.date else { continue };
            let entry = if target.contains(date) {
                &mut totals.entry(record.category.as_str()).or_default().0
            } else if previous.contains(date) {
                &mut totals.entry(record.category.as_str()).or_default().1
            } else {
                continue;
            };
            *entry = entry.saturating_add(record.amount);
        }

        let mut rows: Vec<InsightRow> = totals
            .into_iter()
            .map(|(category, (current, prev))| compare(category, current, prev))
            .collect();
        rows.sort_by(|a, b| b.difference.cmp(&a.difference));

        if rows.is_empty() {
            warn!("no outflow recorded in {} or {}", target, previous);
        }

        InsightReport {
            target,
            previous,
            rows,
        }
    }

    /// Replace the insight table with the report.
    ///
    /// Returns false without touching the store when the report is empty.
    pub fn publish(report: &InsightReport, store: &dyn TableStore) -> Result<bool> {
        if report.is_empty() {
            info!("insight report is empty, skipping upload");
            return Ok(false);
        }
        store.replace_all(&report.to_snapshot())?;
        info!("insight for {} written to {}", report.target, store.name());
        Ok(true)
    }
}

fn compare(category: &str, current: u64, previous: u64) -> InsightRow {
    let difference = current as i64 - previous as i64;
    let change_rate = if previous > 0 {
        (Decimal::from(difference) * Decimal::ONE_HUNDRED / Decimal::from(previous)).round_dp(1)
    } else {
        Decimal::ZERO
    };

    let verdict = if difference > OVERSPEND_AMOUNT && change_rate > Decimal::from(OVERSPEND_RATE) {
        Verdict::Overspent
    } else if difference > 0 {
        Verdict::Increased
    } else if difference == 0 {
        Verdict::Unchanged
    } else {
        Verdict::Decreased
    };

    InsightRow {
        category: category.to_string(),
        current,
        previous,
        difference,
        change_rate,
        verdict,
    }
}
