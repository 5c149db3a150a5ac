//! In-memory table store for dry runs and tests

use std::sync::Mutex;

use crate::domain::result::{Error, Result};
use crate::domain::TableSnapshot;
use crate::ports::TableStore;

#[derive(Default)]
pub struct MemoryTableStore {
    table: Mutex<Option<TableSnapshot>>,
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: TableSnapshot) -> Self {
        Self {
            table: Mutex::new(Some(snapshot)),
        }
    }

    /// Current contents, None if nothing was ever written
    pub fn snapshot(&self) -> Option<TableSnapshot> {
        self.table.lock().ok().and_then(|t| t.clone())
    }
}

impl TableStore for MemoryTableStore {
    fn name(&self) -> String {
        "memory".to_string()
    }

    fn read_all(&self) -> Result<Option<TableSnapshot>> {
        let table = self
            .table
            .lock()
            .map_err(|e| Error::store(format!("Lock poisoned: {}", e)))?;
        Ok(table.clone())
    }

    fn clear(&self) -> Result<()> {
        let mut table = self
            .table
            .lock()
            .map_err(|e| Error::store(format!("Lock poisoned: {}", e)))?;
        *table = None;
        Ok(())
    }

    fn write_all(&self, header: &[String], rows: &[Vec<String>]) -> Result<()> {
        let mut table = self
            .table
            .lock()
            .map_err(|e| Error::store(format!("Lock poisoned: {}", e)))?;
        *table = Some(TableSnapshot::new(header.to_vec(), rows.to_vec()));
        Ok(())
    }
}
