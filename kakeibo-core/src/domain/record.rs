//! Transaction record models

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A row as extracted from one window's rendered page.
///
/// Every text field is optional on the page and degrades to an empty string.
/// Only `external_id` is required; rows without it never become a RawRecord.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    pub external_id: String,
    pub date_text: String,
    pub category_text: String,
    pub amount_text: String,
    pub source_account_text: String,
    pub dest_account_text: String,
    pub place_text: String,
    pub item_text: String,
    /// Year of the window the row was scraped from
    pub window_year: i32,
}

/// Whether money left or entered the user's accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Outflow,
    Inflow,
}

impl Direction {
    /// Inflow when a destination account is present, Outflow otherwise
    pub fn from_dest_account(dest_account: &str) -> Self {
        if dest_account.trim().is_empty() {
            Direction::Outflow
        } else {
            Direction::Inflow
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Outflow => "outflow",
            Direction::Inflow => "inflow",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The normalized, persisted unit of the table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// Unique key within the table
    pub id: String,
    /// None when the page's date text could not be parsed
    pub date: Option<NaiveDate>,
    pub category: String,
    /// Minor currency units, never negative
    pub amount: u64,
    pub direction: Direction,
    pub source_account: String,
    pub dest_account: String,
    pub place: String,
    pub item: String,
}

impl CanonicalRecord {
    /// Create a record with the required fields; text fields start empty
    pub fn new(id: impl Into<String>, date: Option<NaiveDate>, amount: u64) -> Self {
        Self {
            id: id.into(),
            date,
            category: String::new(),
            amount,
            direction: Direction::Outflow,
            source_account: String::new(),
            dest_account: String::new(),
            place: String::new(),
            item: String::new(),
        }
    }

    /// Set the destination account and re-derive direction from it
    pub fn with_dest_account(mut self, dest_account: impl Into<String>) -> Self {
        self.dest_account = dest_account.into();
        self.direction = Direction::from_dest_account(&self.dest_account);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }
}
