//! Status service - summary of the persisted table

use anyhow::{Context, Result};
use serde::Serialize;

use crate::domain::{Direction, PersistedTable};
use crate::ports::TableStore;

/// Status service for table summaries
pub struct StatusService;

impl StatusService {
    /// Read the table from `store` and summarize it
    pub fn get_status(store: &dyn TableStore) -> Result<StatusSummary> {
        let snapshot = store
            .read_all()
            .with_context(|| format!("cannot read table from {}", store.name()))?;
        let table = snapshot
            .map(|s| PersistedTable::from_snapshot(&s))
            .unwrap_or_default();
        Ok(Self::summarize(store.name(), &table))
    }

    pub fn summarize(store: String, table: &PersistedTable) -> StatusSummary {
        let records = table.records();
        let dates = records.iter().filter_map(|r| r.date);

        let total_for = |direction: Direction| -> u64 {
            records
                .iter()
                .filter(|r| r.direction == direction)
                .map(|r| r.amount)
                .fold(0u64, u64::saturating_add)
        };

        StatusSummary {
            store,
            total_records: records.len(),
            inflow_total: total_for(Direction::Inflow),
            outflow_total: total_for(Direction::Outflow),
            undated_records: records.iter().filter(|r| r.date.is_none()).count(),
            date_range: DateRange {
                earliest: dates.clone().min().map(|d| d.to_string()),
                latest: dates.max().map(|d| d.to_string()),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusSummary {
    pub store: String,
    pub total_records: usize,
    pub inflow_total: u64,
    pub outflow_total: u64,
    pub undated_records: usize,
    pub date_range: DateRange,
}

#[derive(Debug, Serialize)]
pub struct DateRange {
    pub earliest: Option<String>,
    pub latest: Option<String>,
}
