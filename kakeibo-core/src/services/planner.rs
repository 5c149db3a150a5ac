//! Window planning - which months to re-fetch on this run

use chrono::NaiveDate;

use crate::domain::{Window, YearMonth};

/// Plan `count` monthly windows ending at the month containing `today`.
///
/// Windows come back newest first: window `i` is the calendar month `i`
/// months before `today`, tagged with that month's own year so rows scraped
/// from a January page in a run made in February still resolve correctly.
pub fn plan_windows(count: u32, today: NaiveDate) -> Vec<Window> {
    let current = YearMonth::of(today);
    (0..count)
        .map(|index| Window {
            index,
            period: current.months_before(index),
        })
        .collect()
}
