//! Event logging service - run events persisted to DuckDB
//!
//! Records what a run did (started, which window failed, how it ended) in
//! `logs.duckdb` under the data directory. Transaction content, amounts and
//! credentials are never logged; only event names, window labels, run ids
//! and error text.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use duckdb::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::log_migrations;

pub const LOG_DB_FILE: &str = "logs.duckdb";

const SELECT_ENTRY: &str = "SELECT id, logged_at, entry_point, app_version, platform, event, \
     command, window_label, run_id, error_message, error_details FROM sys_logs";

/// A run event to be recorded
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogEvent {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// `YYYY-MM` label of the window the event concerns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
}

impl LogEvent {
    pub fn new(event: impl Into<String>) -> Self {
        LogEvent {
            event: event.into(),
            ..Default::default()
        }
    }

    pub fn with_command(self, command: impl Into<String>) -> Self {
        LogEvent {
            command: Some(command.into()),
            ..self
        }
    }

    pub fn with_window(self, label: impl Into<String>) -> Self {
        LogEvent {
            window: Some(label.into()),
            ..self
        }
    }

    pub fn with_run_id(self, run_id: impl Into<String>) -> Self {
        LogEvent {
            run_id: Some(run_id.into()),
            ..self
        }
    }

    pub fn with_error(self, message: impl Into<String>) -> Self {
        LogEvent {
            error_message: Some(message.into()),
            ..self
        }
    }

    pub fn with_error_details(self, details: impl Into<String>) -> Self {
        LogEvent {
            error_details: Some(details.into()),
            ..self
        }
    }
}

/// A stored event with the stamp added when it was written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: i64,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub entry_point: String,
    pub app_version: String,
    pub platform: String,
    pub event: String,
    pub command: Option<String>,
    pub window: Option<String>,
    pub run_id: Option<String>,
    pub error_message: Option<String>,
    pub error_details: Option<String>,
}

impl LogEntry {
    fn from_row(row: &Row<'_>) -> duckdb::Result<Self> {
        Ok(LogEntry {
            id: row.get("id")?,
            timestamp: row.get("logged_at")?,
            entry_point: row.get("entry_point")?,
            app_version: row.get("app_version")?,
            platform: row.get("platform")?,
            event: row.get("event")?,
            command: row.get("command")?,
            window: row.get("window_label")?,
            run_id: row.get("run_id")?,
            error_message: row.get("error_message")?,
            error_details: row.get("error_details")?,
        })
    }
}

/// Aggregate view for `kakeibo logs stats`
#[derive(Debug, Clone, Serialize)]
pub struct LogStats {
    pub total: u64,
    pub errors: u64,
    pub oldest: Option<i64>,
    pub newest: Option<i64>,
    /// (event, count), most frequent first
    pub by_event: Vec<(String, u64)>,
}

/// Append-only store of run events, shared behind a mutex
pub struct LoggingService {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    entry_point: String,
    app_version: String,
}

impl LoggingService {
    /// Open or create the event log in `data_dir` and bring its schema up to date
    pub fn new(
        data_dir: &Path,
        entry_point: impl Into<String>,
        app_version: impl Into<String>,
    ) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("cannot create {}", data_dir.display()))?;
        let db_path = data_dir.join(LOG_DB_FILE);
        let conn = Connection::open(&db_path)?;
        log_migrations::apply(&conn).context("event log schema")?;

        Ok(LoggingService {
            conn: Mutex::new(conn),
            db_path,
            entry_point: entry_point.into(),
            app_version: app_version.into(),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("event log connection poisoned by an earlier panic"))
    }

    /// Append an event stamped with entry point, version, OS and the current time
    pub fn log(&self, event: LogEvent) -> Result<()> {
        let LogEvent {
            event,
            command,
            window,
            run_id,
            error_message,
            error_details,
        } = event;

        self.conn()?.execute(
            "INSERT INTO sys_logs (logged_at, entry_point, app_version, platform, event, \
             command, window_label, run_id, error_message, error_details) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                Utc::now().timestamp_millis(),
                self.entry_point,
                self.app_version,
                std::env::consts::OS,
                event,
                command,
                window,
                run_id,
                error_message,
                error_details,
            ],
        )?;
        Ok(())
    }

    pub fn log_command(&self, command: &str) -> Result<()> {
        self.log(LogEvent::new("command_executed").with_command(command))
    }

    /// Newest first. With `errors_only`, only entries that carry an error message.
    pub fn get_recent(&self, limit: usize, errors_only: bool) -> Result<Vec<LogEntry>> {
        let sql = format!(
            "{} {} ORDER BY logged_at DESC, id DESC LIMIT ?",
            SELECT_ENTRY,
            if errors_only { "WHERE error_message IS NOT NULL" } else { "" }
        );
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit as i64], LogEntry::from_row)?;
        rows.collect::<duckdb::Result<Vec<_>>>().map_err(Into::into)
    }

    pub fn stats(&self) -> Result<LogStats> {
        let conn = self.conn()?;

        let mut stats = conn.query_row(
            "SELECT COUNT(*), COUNT(error_message), MIN(logged_at), MAX(logged_at) FROM sys_logs",
            [],
            |row| {
                Ok(LogStats {
                    total: row.get(0)?,
                    errors: row.get(1)?,
                    oldest: row.get(2)?,
                    newest: row.get(3)?,
                    by_event: Vec::new(),
                })
            },
        )?;

        let mut stmt = conn.prepare(
            "SELECT event, COUNT(*) AS hits FROM sys_logs GROUP BY event ORDER BY hits DESC, event",
        )?;
        stats.by_event = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<duckdb::Result<Vec<_>>>()?;

        Ok(stats)
    }

    pub fn count(&self) -> Result<u64> {
        let total = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM sys_logs", [], |row| row.get(0))?;
        Ok(total)
    }

    /// Drop entries logged before `cutoff_ms`, returning how many were removed
    pub fn delete_before(&self, cutoff_ms: i64) -> Result<u64> {
        let removed = self
            .conn()?
            .execute("DELETE FROM sys_logs WHERE logged_at < ?", params![cutoff_ms])?;
        Ok(removed as u64)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

/// Log through an optional service, downgrading failures to a warning.
///
/// Event logging must never fail the run it describes.
pub fn record(logger: Option<&LoggingService>, event: LogEvent) {
    let Some(logger) = logger else { return };
    if let Err(e) = logger.log(event) {
        log::warn!("failed to record run event: {:#}", e);
    }
}
