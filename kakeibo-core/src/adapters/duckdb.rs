//! DuckDB table store
//!
//! The persisted table lives in one DuckDB table with every column stored as
//! `VARCHAR`, plus a hidden `_row` ordinal that preserves row order. A
//! replace drops and recreates the table inside one transaction, so readers
//! see either the old table or the new one.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::thread;
use std::time::Duration;

use duckdb::types::Value;
use duckdb::{params_from_iter, Connection};
use log::warn;
use regex::Regex;

use crate::domain::result::{Error, Result};
use crate::domain::TableSnapshot;
use crate::ports::TableStore;

/// Maximum number of attempts when the database file is locked
const MAX_RETRIES: u32 = 5;

/// First retry delay; doubles each attempt (50, 100, 200, 400ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

const ORDINAL_COLUMN: &str = "_row";

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("invalid identifier regex"))
}

/// Whether an open error is a transient file lock worth retrying
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("could not set lock")
        || lower.contains("file is already open")
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub struct DuckDbTableStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    table: String,
}

impl DuckDbTableStore {
    /// Open (or create) the database file, retrying while it is locked
    pub fn open(db_path: &Path, table: &str) -> Result<Self> {
        if !identifier_re().is_match(table) {
            return Err(Error::config(format!("invalid table name '{}'", table)));
        }
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut attempt = 0;
        let conn = loop {
            match Self::try_open_connection(db_path) {
                Ok(conn) => break conn,
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay = Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        warn!(
                            "database busy, retrying in {}ms (attempt {}/{}): {}",
                            delay.as_millis(),
                            attempt + 1,
                            MAX_RETRIES,
                            err_msg
                        );
                        thread::sleep(delay);
                        attempt += 1;
                        continue;
                    }
                    return Err(e);
                }
            }
        };

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: db_path.to_path_buf(),
            table: table.to_string(),
        })
    }

    fn try_open_connection(db_path: &Path) -> Result<Connection> {
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Connection::open_with_flags(db_path, config)?)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::store(format!("Lock poisoned: {}", e)))
    }

    fn columns(&self, conn: &Connection) -> Result<Vec<String>> {
        let mut stmt = conn.prepare(
            "SELECT column_name FROM information_schema.columns \
             WHERE table_name = ? AND column_name <> ? ORDER BY ordinal_position",
        )?;
        let columns = stmt
            .query_map([self.table.as_str(), ORDINAL_COLUMN], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    fn drop_table(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {}", quote_ident(&self.table)))?;
        Ok(())
    }

    fn create_and_fill(&self, conn: &Connection, header: &[String], rows: &[Vec<String>]) -> Result<()> {
        if header.is_empty() {
            return Ok(());
        }
        let table = quote_ident(&self.table);
        let columns: Vec<String> = header
            .iter()
            .map(|h| format!("{} VARCHAR", quote_ident(h)))
            .collect();
        conn.execute_batch(&format!(
            "CREATE TABLE {} ({} BIGINT, {})",
            table,
            quote_ident(ORDINAL_COLUMN),
            columns.join(", ")
        ))?;

        let placeholders = vec!["?"; header.len() + 1].join(", ");
        let mut stmt = conn.prepare(&format!("INSERT INTO {} VALUES ({})", table, placeholders))?;
        for (i, row) in rows.iter().enumerate() {
            let values = std::iter::once(Value::BigInt(i as i64)).chain(
                (0..header.len()).map(|c| Value::Text(row.get(c).cloned().unwrap_or_default())),
            );
            stmt.execute(params_from_iter(values))?;
        }
        Ok(())
    }
}

impl TableStore for DuckDbTableStore {
    fn name(&self) -> String {
        format!("{}#{}", self.db_path.display(), self.table)
    }

    fn read_all(&self) -> Result<Option<TableSnapshot>> {
        let conn = self.lock()?;
        let header = self.columns(&conn)?;
        if header.is_empty() {
            return Ok(None);
        }

        let select = header.iter().map(|h| quote_ident(h)).collect::<Vec<_>>().join(", ");
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} ORDER BY {}",
            select,
            quote_ident(&self.table),
            quote_ident(ORDINAL_COLUMN)
        ))?;
        let width = header.len();
        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|i| row.get::<_, Option<String>>(i).map(Option::unwrap_or_default))
                    .collect::<std::result::Result<Vec<String>, _>>()
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Some(TableSnapshot::new(header, rows)))
    }

    fn clear(&self) -> Result<()> {
        let conn = self.lock()?;
        self.drop_table(&conn)
    }

    fn write_all(&self, header: &[String], rows: &[Vec<String>]) -> Result<()> {
        let conn = self.lock()?;
        self.create_and_fill(&conn, header, rows)
    }

    fn replace_all(&self, snapshot: &TableSnapshot) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        self.drop_table(&tx)?;
        self.create_and_fill(&tx, &snapshot.header, &snapshot.rows)?;
        tx.commit()?;
        Ok(())
    }
}
