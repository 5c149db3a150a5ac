//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - HTTP client + HTML parser for the Browser port
//! - Live ledger pages and saved pages for the RecordSource port
//! - DuckDB, CSV files, Google Sheets and memory for the TableStore port

pub mod csv_store;
pub mod duckdb;
pub mod http_browser;
pub mod ledger_web;
pub mod memory;
pub mod replay;
pub mod sheets;

use std::path::Path;

use log::debug;

use crate::config::{StoreBackend, StoreSettings};
use crate::domain::result::Result;
use crate::ports::TableStore;

use self::csv_store::CsvTableStore;
use self::duckdb::DuckDbTableStore;
use self::sheets::{load_access_token, SheetsTableStore};

/// Which of the two persisted tables to open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// The synchronized transaction history
    Transactions,
    /// The month-over-month insight report
    Insight,
}

impl TableKind {
    fn table_name(&self) -> &'static str {
        match self {
            TableKind::Transactions => "transactions",
            TableKind::Insight => "insight",
        }
    }
}

/// Open the configured backend for one table
pub fn open_table_store(settings: &StoreSettings, kind: TableKind) -> Result<Box<dyn TableStore>> {
    debug!("opening {:?} store for {:?}", settings.backend, kind);
    let store: Box<dyn TableStore> = match settings.backend {
        StoreBackend::DuckDb => Box::new(DuckDbTableStore::open(
            Path::new(&settings.store_id),
            kind.table_name(),
        )?),
        StoreBackend::Csv => {
            let path = Path::new(&settings.store_id);
            match kind {
                TableKind::Transactions => Box::new(CsvTableStore::new(path)),
                TableKind::Insight => Box::new(CsvTableStore::sibling(path, kind.table_name())),
            }
        }
        StoreBackend::Sheets => {
            let token = load_access_token(&settings.credential_file)?;
            let sheet = match kind {
                TableKind::Transactions => &settings.sheet_name,
                TableKind::Insight => &settings.insight_sheet_name,
            };
            Box::new(SheetsTableStore::new(
                &settings.sheets_api_base,
                &settings.store_id,
                sheet,
                token,
            )?)
        }
    };
    Ok(store)
}
