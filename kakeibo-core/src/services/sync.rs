//! Sync service - plan, fetch, extract, normalize, merge, write

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use log::{error, info, warn};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{PersistedTable, RawRecord};
use crate::ports::{LoginOutcome, RecordSource, TableStore};
use crate::services::extractor::RecordExtractor;
use crate::services::logging::{record, LogEvent, LoggingService};
use crate::services::merge::{merge, MergeStats};
use crate::services::normalizer::normalize_all;
use crate::services::planner::plan_windows;

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub months: u32,
    /// Pause between consecutive window fetches
    pub window_delay: Duration,
    /// Compute everything but leave the store untouched
    pub dry_run: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            months: 3,
            window_delay: Duration::from_secs(3),
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WindowReport {
    pub label: String,
    pub rows_seen: usize,
    pub extracted: usize,
    pub skipped: usize,
    pub duplicates: usize,
    /// Set when the fetch failed and the window was treated as empty
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NormalizeStats {
    pub records: usize,
    pub undated: usize,
    pub amount_fallbacks: usize,
}

/// How a run ended, mapped onto the process exit code by the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    /// The table was written but some input was missing
    Partial,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub run_id: String,
    pub source: String,
    pub store: String,
    pub login: LoginOutcome,
    pub windows: Vec<WindowReport>,
    pub normalized: NormalizeStats,
    pub merge: MergeStats,
    pub dry_run: bool,
    pub written: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_error: Option<String>,
}

impl SyncReport {
    pub fn failed_windows(&self) -> usize {
        self.windows.iter().filter(|w| w.error.is_some()).count()
    }

    pub fn status(&self) -> RunStatus {
        if self.upload_error.is_some() {
            RunStatus::Failed
        } else if self.failed_windows() > 0 || self.login == LoginOutcome::TimedOutProceeding {
            RunStatus::Partial
        } else {
            RunStatus::Success
        }
    }
}

/// Sync service for mirroring the ledger into the table store
pub struct SyncService {
    extractor: RecordExtractor,
    logger: Option<Arc<LoggingService>>,
}

impl SyncService {
    pub fn new(extractor: RecordExtractor) -> Self {
        Self {
            extractor,
            logger: None,
        }
    }

    pub fn with_logger(mut self, logger: Arc<LoggingService>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Run one synchronization.
    ///
    /// Returns `Err` only for fatal conditions: the login form could not be
    /// driven, or the existing table could not be read. In both cases the
    /// store is left untouched. A failed upload is reported, not returned.
    pub fn run(
        &self,
        source: &mut dyn RecordSource,
        store: &dyn TableStore,
        today: NaiveDate,
        options: &SyncOptions,
    ) -> Result<SyncReport> {
        let run_id = Uuid::new_v4().to_string();
        self.event(LogEvent::new("sync_started"), &run_id);
        info!(
            "sync {} started: source={}, store={}, months={}",
            run_id,
            source.name(),
            store.name(),
            options.months
        );

        let windows = plan_windows(options.months, today);

        let login = source.authenticate();
        if let LoginOutcome::Failed(reason) = &login {
            self.event(LogEvent::new("sync_failed").with_error(reason.as_str()), &run_id);
            bail!("login failed: {}", reason);
        }

        let mut window_reports = Vec::with_capacity(windows.len());
        let mut raw: Vec<RawRecord> = Vec::new();
        for (i, window) in windows.iter().enumerate() {
            if i > 0 && !options.window_delay.is_zero() {
                thread::sleep(options.window_delay);
            }

            let label = window.label();
            match source.fetch_window(window) {
                Ok(content) => {
                    let outcome = self.extractor.extract(&content, window);
                    info!("{}: {} record(s)", label, outcome.records.len());
                    window_reports.push(WindowReport {
                        label,
                        rows_seen: outcome.rows_seen,
                        extracted: outcome.records.len(),
                        skipped: outcome.rows_skipped,
                        duplicates: outcome.duplicates,
                        error: None,
                    });
                    raw.extend(outcome.records);
                }
                Err(e) => {
                    warn!("{}: fetch failed, treating window as empty: {}", label, e);
                    self.event(
                        LogEvent::new("window_failed")
                            .with_window(label.as_str())
                            .with_error(e.to_string()),
                        &run_id,
                    );
                    window_reports.push(WindowReport {
                        label,
                        rows_seen: 0,
                        extracted: 0,
                        skipped: 0,
                        duplicates: 0,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let normalized = normalize_all(raw);
        let normalize_stats = NormalizeStats {
            records: normalized.records.len(),
            undated: normalized.undated,
            amount_fallbacks: normalized.amount_fallbacks,
        };

        let existing = match store.read_all() {
            Ok(snapshot) => snapshot
                .map(|s| PersistedTable::from_snapshot(&s))
                .unwrap_or_default(),
            Err(e) => {
                self.event(LogEvent::new("sync_failed").with_error(e.to_string()), &run_id);
                return Err(e).with_context(|| format!("cannot read table from {}", store.name()));
            }
        };

        let merged = merge(&existing, normalized.records);
        info!(
            "merged: {} existing, {} inserted, {} updated, {} rows total",
            merged.stats.existing, merged.stats.inserted, merged.stats.updated, merged.stats.final_rows
        );

        let mut written = false;
        let mut upload_error = None;
        if options.dry_run {
            info!("dry run: {} left untouched", store.name());
        } else {
            match store.replace_all(&merged.table.to_snapshot()) {
                Ok(()) => written = true,
                Err(e) => {
                    error!("failed to write table to {}: {}", store.name(), e);
                    self.event(LogEvent::new("upload_failed").with_error(e.to_string()), &run_id);
                    upload_error = Some(e.to_string());
                }
            }
        }

        let report = SyncReport {
            run_id: run_id.clone(),
            source: source.name().to_string(),
            store: store.name(),
            login,
            windows: window_reports,
            normalized: normalize_stats,
            merge: merged.stats,
            dry_run: options.dry_run,
            written,
            upload_error,
        };

        self.event(LogEvent::new("sync_completed"), &run_id);
        info!("sync {} finished: {:?}", run_id, report.status());
        Ok(report)
    }

    fn event(&self, event: LogEvent, run_id: &str) {
        record(self.logger.as_deref(), event.with_command("sync").with_run_id(run_id));
    }
}
