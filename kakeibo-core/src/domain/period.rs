//! Calendar month periods and scrape windows

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::result::Error;

/// A calendar month, e.g. 2024-03
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    /// Month containing the given date
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Shift backwards by `months` calendar months
    pub fn months_before(&self, months: u32) -> Self {
        let index = self.year as i64 * 12 + (self.month as i64 - 1) - months as i64;
        Self {
            year: index.div_euclid(12) as i32,
            month: index.rem_euclid(12) as u32 + 1,
        }
    }

    pub fn previous(&self) -> Self {
        self.months_before(1)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// Compact `YYYYMM` form used in ledger URLs
    pub fn compact(&self) -> String {
        format!("{:04}{:02}", self.year, self.month)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = Error;

    /// Parse `YYYY-MM`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::config(format!("invalid month '{}', expected YYYY-MM", s));
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        YearMonth::new(year, month).ok_or_else(invalid)
    }
}

/// One unit of scraping: a calendar month plus its position in the plan.
///
/// The ledger shows rows without a year, so the window is what carries the
/// year context down to row-level date parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Window {
    /// 0 = current month, 1 = previous month, ...
    pub index: u32,
    pub period: YearMonth,
}

impl Window {
    pub fn year(&self) -> i32 {
        self.period.year
    }

    pub fn label(&self) -> String {
        self.period.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_months_before_crosses_year() {
        let jan = YearMonth::new(2024, 1).unwrap();
        assert_eq!(jan.previous(), YearMonth::new(2023, 12).unwrap());
        assert_eq!(jan.months_before(13), YearMonth::new(2022, 12).unwrap());
        assert_eq!(jan.months_before(0), jan);
    }

    #[test]
    fn test_parse_year_month() {
        let ym: YearMonth = "2024-11".parse().unwrap();
        assert_eq!(ym, YearMonth::new(2024, 11).unwrap());
        assert_eq!(ym.to_string(), "2024-11");
        assert_eq!(ym.compact(), "202411");
    }

    #[test]
    fn test_parse_year_month_rejects_garbage() {
        assert!("2024-13".parse::<YearMonth>().is_err());
        assert!("2024/11".parse::<YearMonth>().is_err());
        assert!("24-11".parse::<YearMonth>().is_err());
        assert!("".parse::<YearMonth>().is_err());
    }

    #[test]
    fn test_contains() {
        let ym = YearMonth::new(2024, 2).unwrap();
        assert!(ym.contains(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()));
        assert!(!ym.contains(NaiveDate::from_ymd_opt(2023, 2, 1).unwrap()));
    }
}
