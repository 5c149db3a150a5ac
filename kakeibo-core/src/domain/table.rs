//! Persisted table model and its row encoding
//!
//! The store boundary only understands a header plus string rows, so the
//! table is encoded wholesale on write and decoded leniently on read: a row
//! written by an older version, edited by hand, or rendered by a spreadsheet
//! (`123.0` ids, blank cells) still decodes into a usable record.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::period::YearMonth;
use super::record::{CanonicalRecord, Direction};

/// Column order of the persisted table
pub const HEADER: [&str; 10] = [
    "id",
    "date",
    "year_month",
    "category",
    "amount",
    "direction",
    "source_account",
    "dest_account",
    "place",
    "item",
];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Raw contents of a store: a header row and data rows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TableSnapshot {
    pub fn new(header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { header, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.header.is_empty() && self.rows.is_empty()
    }
}

/// The deduplicated, ordered transaction history
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedTable {
    records: Vec<CanonicalRecord>,
}

impl PersistedTable {
    pub fn new(records: Vec<CanonicalRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<CanonicalRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Decode a store snapshot by header name
    pub fn from_snapshot(snapshot: &TableSnapshot) -> Self {
        let columns: HashMap<&str, usize> = snapshot
            .header
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim(), i))
            .collect();

        let records = snapshot
            .rows
            .iter()
            .map(|row| {
                let cell = |name: &str| -> &str {
                    columns
                        .get(name)
                        .and_then(|&i| row.get(i))
                        .map(|s| s.trim())
                        .unwrap_or("")
                };

                // The stored direction column is output only
                let dest_account = cell("dest_account").to_string();
                let direction = Direction::from_dest_account(&dest_account);

                CanonicalRecord {
                    id: normalize_id(cell("id")),
                    date: NaiveDate::parse_from_str(cell("date"), DATE_FORMAT).ok(),
                    category: cell("category").to_string(),
                    amount: parse_stored_amount(cell("amount")),
                    direction,
                    source_account: cell("source_account").to_string(),
                    dest_account,
                    place: cell("place").to_string(),
                    item: cell("item").to_string(),
                }
            })
            .collect();

        Self { records }
    }

    /// Encode into header + rows in table order
    pub fn to_snapshot(&self) -> TableSnapshot {
        let header = HEADER.iter().map(|h| h.to_string()).collect();
        let rows = self
            .records
            .iter()
            .map(|r| {
                vec![
                    r.id.clone(),
                    r.date.map(|d| d.format(DATE_FORMAT).to_string()).unwrap_or_default(),
                    r.date.map(|d| YearMonth::of(d).to_string()).unwrap_or_default(),
                    r.category.clone(),
                    r.amount.to_string(),
                    r.direction.as_str().to_string(),
                    r.source_account.clone(),
                    r.dest_account.clone(),
                    r.place.clone(),
                    r.item.clone(),
                ]
            })
            .collect();
        TableSnapshot { header, rows }
    }
}

/// Bring an identifier into its single comparable string form.
///
/// Spreadsheets hand numeric cells back as `12345.0`; both that and `12345`
/// must compare equal.
pub fn normalize_id(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some((int_part, frac)) = trimmed.split_once('.') {
        if !int_part.is_empty()
            && int_part.chars().all(|c| c.is_ascii_digit())
            && !frac.is_empty()
            && frac.chars().all(|c| c == '0')
        {
            return int_part.to_string();
        }
    }
    trimmed.to_string()
}

fn parse_stored_amount(text: &str) -> u64 {
    if let Ok(n) = text.parse::<u64>() {
        return n;
    }
    // Spreadsheet numeric rendering, e.g. "600.0"
    text.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(|f| f.abs().round() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_normalize_id() {
        assert_eq!(normalize_id(" 100 "), "100");
        assert_eq!(normalize_id("100.0"), "100");
        assert_eq!(normalize_id("100.00"), "100");
        assert_eq!(normalize_id("100.5"), "100.5");
        assert_eq!(normalize_id("abc.0"), "abc.0");
        assert_eq!(normalize_id(""), "");
    }

    #[test]
    fn test_snapshot_encodes_header_and_derived_month() {
        let table = PersistedTable::new(vec![
            CanonicalRecord::new("7", Some(date(2024, 3, 9)), 1200).with_category("食費"),
            CanonicalRecord::new("8", None, 0).with_dest_account("wallet"),
        ]);
        let snapshot = table.to_snapshot();

        assert_eq!(snapshot.header, HEADER.to_vec());
        assert_eq!(snapshot.rows[0][1], "2024-03-09");
        assert_eq!(snapshot.rows[0][2], "2024-03");
        assert_eq!(snapshot.rows[0][5], "outflow");
        assert_eq!(snapshot.rows[1][1], "");
        assert_eq!(snapshot.rows[1][2], "");
        assert_eq!(snapshot.rows[1][5], "inflow");
    }

    #[test]
    fn test_decode_is_lenient() {
        let snapshot = TableSnapshot::new(
            vec!["amount".into(), "id".into(), "date".into(), "dest_account".into()],
            vec![
                vec!["600.0".into(), "100.0".into(), "2024-01-02".into(), "wallet".into()],
                vec!["oops".into(), "101".into(), "not a date".into()],
                vec![],
            ],
        );
        let table = PersistedTable::from_snapshot(&snapshot);
        let records = table.records();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].id, "100");
        assert_eq!(records[0].amount, 600);
        assert_eq!(records[0].date, Some(date(2024, 1, 2)));
        assert_eq!(records[0].direction, Direction::Inflow);
        assert_eq!(records[1].amount, 0);
        assert_eq!(records[1].date, None);
        assert_eq!(records[1].direction, Direction::Outflow);
        assert_eq!(records[2].id, "");
    }

    #[test]
    fn test_decode_derives_direction_from_dest_account() {
        let snapshot = TableSnapshot::new(
            vec!["id".into(), "direction".into(), "dest_account".into()],
            vec![
                vec!["5".into(), "inflow".into(), "".into()],
                vec!["6".into(), "outflow".into(), "bank".into()],
            ],
        );
        let table = PersistedTable::from_snapshot(&snapshot);
        let records = table.records();

        assert_eq!(records[0].direction, Direction::Outflow);
        assert_eq!(records[1].direction, Direction::Inflow);
        assert_eq!(table.to_snapshot().rows[0][5], "outflow");
    }

    #[test]
    fn test_decode_reads_back_encoded_table() {
        let table = PersistedTable::new(vec![
            CanonicalRecord::new("100", Some(date(2024, 1, 2)), 600).with_dest_account("wallet"),
        ]);
        assert_eq!(PersistedTable::from_snapshot(&table.to_snapshot()), table);
    }
}
