//! Kakeibo Core - mirrors a web household ledger into a table store
//!
//! This crate implements the synchronization pipeline following hexagonal
//! architecture:
//!
//! - **domain**: records, periods, the persisted table and its encoding
//! - **ports**: traits for the browser, record sources and table stores
//! - **services**: planner, extractor, normalizer, merge, login, sync, reports
//! - **adapters**: HTTP browser, ledger/replay sources, DuckDB/CSV/Sheets stores

pub mod adapters;
pub mod config;
pub mod domain;
mod log_migrations;
pub mod ports;
pub mod services;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::warn;

use adapters::http_browser::HttpBrowser;
use adapters::ledger_web::LedgerWebSource;
pub use adapters::TableKind;
use config::Config;
use ports::TableStore;
use services::{RecordExtractor, SyncOptions, SyncService};

pub use domain::result::Error;
pub use domain::{
    CanonicalRecord, Direction, InsightReport, PersistedTable, RawRecord, TableSnapshot, Window,
    YearMonth,
};
pub use services::logging::LoggingService;

const MIN_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Result alias for the library's own error type
pub type CoreResult<T> = domain::result::Result<T>;

/// Main context for kakeibo operations
///
/// Holds the validated configuration, the event log and the sync service.
/// Stores and sources are opened on demand since most commands need only
/// one of them.
pub struct KakeiboContext {
    pub config: Config,
    pub data_dir: PathBuf,
    pub logger: Option<Arc<LoggingService>>,
    pub sync_service: SyncService,
}

impl KakeiboContext {
    /// Build a context; the event log is optional and its failure only warns
    pub fn new(config: Config, data_dir: &Path, entry_point: &str) -> Result<Self> {
        let logger = match LoggingService::new(data_dir, entry_point, env!("CARGO_PKG_VERSION")) {
            Ok(service) => Some(Arc::new(service)),
            Err(e) => {
                warn!("event log unavailable at {}: {}", data_dir.display(), e);
                None
            }
        };

        let extractor =
            RecordExtractor::new(&config.site.rows).context("invalid row selectors")?;
        let mut sync_service = SyncService::new(extractor);
        if let Some(logger) = &logger {
            sync_service = sync_service.with_logger(Arc::clone(logger));
        }

        Ok(Self {
            config,
            data_dir: data_dir.to_path_buf(),
            logger,
            sync_service,
        })
    }

    pub fn open_store(&self, kind: TableKind) -> Result<Box<dyn TableStore>> {
        adapters::open_table_store(&self.config.store, kind)
            .with_context(|| format!("cannot open {:?} store", kind))
    }

    /// Live ledger source over the HTTP browser
    pub fn ledger_source(&self) -> Result<LedgerWebSource<HttpBrowser>> {
        let request_timeout = self.config.sync.wait_timeout.max(MIN_REQUEST_TIMEOUT);
        let browser = HttpBrowser::new(request_timeout).context("cannot create HTTP client")?;
        Ok(LedgerWebSource::new(browser, &self.config))
    }

    pub fn sync_options(&self, dry_run: bool) -> SyncOptions {
        SyncOptions {
            months: self.config.sync.months,
            window_delay: self.config.sync.window_delay,
            dry_run,
        }
    }
}
