//! Record extraction - rendered history page to raw field records

use std::collections::HashSet;
use std::sync::OnceLock;

use log::{debug, warn};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::config::RowSelectors;
use crate::domain::result::{Error, Result};
use crate::domain::{RawRecord, Window};

/// Attributes that may hold a navigation target carrying the record id
const NAV_ATTRIBUTES: [&str; 3] = ["data-url", "href", "onclick"];

fn ws_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("invalid whitespace regex"))
}

fn compile(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|_| Error::config(format!("invalid CSS selector: {}", selector)))
}

/// Result of extracting one window
#[derive(Debug, Default)]
pub struct ExtractOutcome {
    /// Unique by external id, in first-seen page order
    pub records: Vec<RawRecord>,
    pub rows_seen: usize,
    /// Rows dropped because no id could be recovered
    pub rows_skipped: usize,
    /// Later rows repeating an id already seen in this pass
    pub duplicates: usize,
}

struct FieldSelectors {
    date: Selector,
    category: Selector,
    amount: Selector,
    source_account: Selector,
    dest_account: Selector,
    place: Selector,
    item: Selector,
}

/// Turns one window's rendered content into raw records
pub struct RecordExtractor {
    row: Selector,
    link: Selector,
    fields: FieldSelectors,
    id_pattern: Regex,
}

impl RecordExtractor {
    pub fn new(selectors: &RowSelectors) -> Result<Self> {
        let id_pattern = Regex::new(&selectors.id_pattern)
            .map_err(|e| Error::config(format!("invalid id pattern: {}", e)))?;
        if id_pattern.captures_len() < 2 {
            return Err(Error::config("id pattern needs one capture group"));
        }

        Ok(Self {
            row: compile(&selectors.row)?,
            link: compile(&selectors.link)?,
            fields: FieldSelectors {
                date: compile(&selectors.date)?,
                category: compile(&selectors.category)?,
                amount: compile(&selectors.amount)?,
                source_account: compile(&selectors.source_account)?,
                dest_account: compile(&selectors.dest_account)?,
                place: compile(&selectors.place)?,
                item: compile(&selectors.item)?,
            },
            id_pattern,
        })
    }

    /// Extract every usable row of a window.
    ///
    /// Fields are optional and degrade to empty strings. A row without a
    /// resolvable id is skipped; the first row carrying a given id wins.
    pub fn extract(&self, content: &str, window: &Window) -> ExtractOutcome {
        let document = Html::parse_document(content);
        let mut outcome = ExtractOutcome::default();
        let mut seen = HashSet::new();

        for row in document.select(&self.row) {
            outcome.rows_seen += 1;
            match self.extract_row(row, window) {
                Ok(record) => {
                    if seen.insert(record.external_id.clone()) {
                        outcome.records.push(record);
                    } else {
                        debug!(
                            "{}: dropping repeated id {} within one pass",
                            window.label(),
                            record.external_id
                        );
                        outcome.duplicates += 1;
                    }
                }
                Err(e) => {
                    warn!("{}: skipping row {}: {}", window.label(), outcome.rows_seen, e);
                    outcome.rows_skipped += 1;
                }
            }
        }

        debug!(
            "{}: {} rows, {} records, {} skipped, {} duplicates",
            window.label(),
            outcome.rows_seen,
            outcome.records.len(),
            outcome.rows_skipped,
            outcome.duplicates
        );
        outcome
    }

    fn extract_row(&self, row: ElementRef<'_>, window: &Window) -> Result<RawRecord> {
        let external_id = self
            .find_id(row)
            .ok_or_else(|| Error::parse("no record id in row navigation attributes"))?;

        let field = |selector: &Selector| -> String {
            row.select(selector)
                .next()
                .map(element_text)
                .unwrap_or_default()
        };

        Ok(RawRecord {
            external_id,
            date_text: field(&self.fields.date),
            category_text: field(&self.fields.category),
            amount_text: field(&self.fields.amount),
            source_account_text: field(&self.fields.source_account),
            dest_account_text: field(&self.fields.dest_account),
            place_text: field(&self.fields.place),
            item_text: field(&self.fields.item),
            window_year: window.year(),
        })
    }

    fn find_id(&self, row: ElementRef<'_>) -> Option<String> {
        std::iter::once(row)
            .chain(row.select(&self.link))
            .flat_map(|el| NAV_ATTRIBUTES.iter().filter_map(move |a| el.value().attr(a)))
            .find_map(|value| {
                self.id_pattern
                    .captures(value)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string())
                    .filter(|id| !id.is_empty())
            })
    }
}

/// Visible text of an element with whitespace runs collapsed.
///
/// Icon labels rendered as image alt text are kept, so a category cell reads
/// like "icon-food 食費".
fn element_text(el: ElementRef<'_>) -> String {
    let img = Selector::parse("img[alt]").ok();
    let mut text = String::new();
    if let Some(img) = img {
        for alt in el.select(&img).filter_map(|i| i.value().attr("alt")) {
            text.push_str(alt);
            text.push(' ');
        }
    }
    text.extend(el.text());
    ws_re().replace_all(text.trim(), " ").trim().to_string()
}
