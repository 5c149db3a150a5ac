//! Record normalization - raw page text to typed canonical fields

use std::sync::OnceLock;

use chrono::NaiveDate;
use log::{debug, warn};
use regex::Regex;

use crate::domain::{CanonicalRecord, Direction, RawRecord};

/// Characters removed from amount text before integer parsing
const AMOUNT_NOISE: [char; 6] = ['¥', '￥', ',', '，', '円', '+'];

fn parenthetical_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[（(][^）)]*[）)]").expect("invalid parenthetical regex"))
}

/// Output of normalizing one run's raw records
#[derive(Debug, Default)]
pub struct NormalizeOutcome {
    /// Same length and order as the input
    pub records: Vec<CanonicalRecord>,
    /// Records kept with a null date
    pub undated: usize,
    /// Records whose amount text did not parse and became 0
    pub amount_fallbacks: usize,
}

/// Normalize a batch. No record is ever dropped here.
pub fn normalize_all(raw: Vec<RawRecord>) -> NormalizeOutcome {
    let mut outcome = NormalizeOutcome::default();
    outcome.records.reserve(raw.len());

    for record in raw {
        let date = parse_date(&record.date_text, record.window_year);
        if date.is_none() {
            debug!(
                "record {}: unparseable date {:?}, keeping undated",
                record.external_id, record.date_text
            );
            outcome.undated += 1;
        }

        let amount = match parse_amount(&record.amount_text) {
            Some(amount) => amount,
            None => {
                debug!(
                    "record {}: unparseable amount {:?}, using 0",
                    record.external_id, record.amount_text
                );
                outcome.amount_fallbacks += 1;
                0
            }
        };

        outcome.records.push(CanonicalRecord {
            direction: Direction::from_dest_account(&record.dest_account_text),
            category: clean_category(&record.category_text),
            id: record.external_id,
            date,
            amount,
            source_account: record.source_account_text,
            dest_account: record.dest_account_text,
            place: record.place_text,
            item: record.item_text,
        });
    }

    if outcome.undated > 0 {
        warn!("{} record(s) kept without a parseable date", outcome.undated);
    }
    outcome
}

/// Combine day-level date text with the window's year.
///
/// Holiday or weekday annotations in parentheses are dropped first, so
/// "01月02日（祝）" and "01月02日(火)" both read as January 2nd.
pub fn parse_date(text: &str, year: i32) -> Option<NaiveDate> {
    let stripped = parenthetical_re().replace_all(text, "");
    let stripped = stripped.trim();
    if stripped.is_empty() {
        return None;
    }

    if stripped.contains('年') {
        return NaiveDate::parse_from_str(stripped, "%Y年%m月%d日").ok();
    }

    let with_year = format!("{}年{}", year, stripped);
    if let Ok(date) = NaiveDate::parse_from_str(&with_year, "%Y年%m月%d日") {
        return Some(date);
    }
    let with_year = format!("{}/{}", year, stripped);
    if let Ok(date) = NaiveDate::parse_from_str(&with_year, "%Y/%m/%d") {
        return Some(date);
    }
    let with_year = format!("{}-{}", year, stripped);
    NaiveDate::parse_from_str(&with_year, "%Y-%m-%d").ok()
}

/// Drop the icon label the ledger puts ahead of the localized name.
///
/// Everything before the first non-ASCII character goes; text without any
/// non-ASCII character is kept whole.
pub fn clean_category(text: &str) -> String {
    match text.char_indices().find(|(_, c)| !c.is_ascii()) {
        Some((i, _)) => text[i..].trim().to_string(),
        None => text.trim().to_string(),
    }
}

/// Parse an amount as minor currency units, ignoring sign.
pub fn parse_amount(text: &str) -> Option<u64> {
    let cleaned: String = text
        .chars()
        .filter(|c| !AMOUNT_NOISE.contains(c) && !c.is_whitespace())
        .map(|c| if c == '−' || c == '－' { '-' } else { c })
        .collect();
    cleaned.parse::<i64>().ok().map(i64::unsigned_abs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn raw(id: &str) -> RawRecord {
        RawRecord {
            external_id: id.to_string(),
            window_year: 2024,
            ..RawRecord::default()
        }
    }

    #[test]
    fn test_parse_date_variants() {
        assert_eq!(parse_date("01月02日", 2024), Some(date(2024, 1, 2)));
        assert_eq!(parse_date("01月02日（祝）", 2024), Some(date(2024, 1, 2)));
        assert_eq!(parse_date(" 3月5日(火) ", 2023), Some(date(2023, 3, 5)));
        assert_eq!(parse_date("02/29", 2024), Some(date(2024, 2, 29)));
        assert_eq!(parse_date("2022年12月31日", 2024), Some(date(2022, 12, 31)));
    }

    #[test]
    fn test_parse_date_failures_are_none() {
        assert_eq!(parse_date("", 2024), None);
        assert_eq!(parse_date("(祝)", 2024), None);
        assert_eq!(parse_date("02/29", 2023), None);
        assert_eq!(parse_date("昨日", 2024), None);
    }

    #[test]
    fn test_clean_category() {
        assert_eq!(clean_category("icon-food 食費"), "食費");
        assert_eq!(clean_category("abc日用品 雑貨"), "日用品 雑貨");
        assert_eq!(clean_category("食費"), "食費");
        assert_eq!(clean_category(" transfer "), "transfer");
        assert_eq!(clean_category(""), "");
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("¥1,200"), Some(1200));
        assert_eq!(parse_amount("￥ 35,000"), Some(35000));
        assert_eq!(parse_amount("-500"), Some(500));
        assert_eq!(parse_amount("500円"), Some(500));
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("¥--"), None);
    }

    #[test]
    fn test_unparseable_amount_is_zero_and_kept() {
        let outcome = normalize_all(vec![RawRecord {
            amount_text: "n/a".to_string(),
            date_text: "01月05日".to_string(),
            ..raw("1")
        }]);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].amount, 0);
        assert_eq!(outcome.amount_fallbacks, 1);
    }

    #[test]
    fn test_direction_and_order_preserved() {
        let outcome = normalize_all(vec![
            RawRecord {
                dest_account_text: "wallet".to_string(),
                ..raw("a")
            },
            raw("b"),
        ]);
        let ids: Vec<_> = outcome.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(outcome.records[0].direction, Direction::Inflow);
        assert_eq!(outcome.records[1].direction, Direction::Outflow);
        assert_eq!(outcome.undated, 2);
    }
}
