//! Month-over-month spending comparison model

use rust_decimal::Decimal;
use serde::Serialize;

use super::period::YearMonth;
use super::table::TableSnapshot;

/// Classification of one category's month-over-month change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Large absolute AND relative increase
    Overspent,
    Increased,
    Unchanged,
    Decreased,
}

impl Verdict {
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Overspent => "overspent",
            Verdict::Increased => "increased",
            Verdict::Unchanged => "-",
            Verdict::Decreased => "decreased",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsightRow {
    pub category: String,
    pub current: u64,
    pub previous: u64,
    pub difference: i64,
    /// Percent change rounded to one decimal; zero when there was no spend
    /// in the previous month
    pub change_rate: Decimal,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, Serialize)]
pub struct InsightReport {
    pub target: YearMonth,
    pub previous: YearMonth,
    pub rows: Vec<InsightRow>,
}

impl InsightReport {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_snapshot(&self) -> TableSnapshot {
        let header = vec![
            "category".to_string(),
            format!("{} actual", self.target),
            format!("{} actual", self.previous),
            "difference".to_string(),
            "change_rate_pct".to_string(),
            "verdict".to_string(),
        ];
        let rows = self
            .rows
            .iter()
            .map(|r| {
                vec![
                    r.category.clone(),
                    r.current.to_string(),
                    r.previous.to_string(),
                    r.difference.to_string(),
                    r.change_rate.to_string(),
                    r.verdict.label().to_string(),
                ]
            })
            .collect();
        TableSnapshot { header, rows }
    }
}
