//! Schema of the event log, embedded with include_str!
//!
//! Each step runs at most once per database; the applied names live in
//! `sys_migrations`, which `apply` creates itself before anything else.

use duckdb::{params, Connection};

const STEPS: &[(&str, &str)] = &[("001_initial_schema", include_str!("001_initial_schema.sql"))];

const BOOKKEEPING: &str = "CREATE TABLE IF NOT EXISTS sys_migrations (
    migration_name VARCHAR PRIMARY KEY,
    applied_at TIMESTAMP DEFAULT current_timestamp
)";

/// Bring the event-log schema up to date, returning how many steps ran
pub fn apply(conn: &Connection) -> duckdb::Result<usize> {
    conn.execute_batch(BOOKKEEPING)?;

    let mut ran = 0;
    for (name, sql) in STEPS {
        let done: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sys_migrations WHERE migration_name = ?",
            params![name],
            |row| row.get(0),
        )?;
        if done > 0 {
            continue;
        }
        conn.execute_batch(sql)?;
        conn.execute(
            "INSERT INTO sys_migrations (migration_name) VALUES (?)",
            params![name],
        )?;
        ran += 1;
    }
    Ok(ran)
}
